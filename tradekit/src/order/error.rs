use thiserror::Error;

/// Errors raised by order construction and repository lookups.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
    #[error("order quantity cannot be zero")]
    ZeroQuantity,

    #[error("limit/stop orders require a price")]
    MissingPrice,

    #[error("order {0} not found for {1}/{2}")]
    NotFound(String, String, String),

    #[error("cannot transition order from {0:?} to {1:?}")]
    InvalidTransition(super::OrderStatus, super::OrderStatus),

    #[error("negative price is not allowed for a limit order")]
    NegativePrice,

    #[error("order not allowed: {0}")]
    NotAllowed(&'static str),
}
