use thiserror::Error;

/// Errors raised by per-exchange balance bookkeeping (component C8).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    #[error("insufficient balance for asset {0}")]
    InsufficientBalance(String),

    #[error("insufficient available margin")]
    InsufficientMargin,

    #[error("order kind {0:?} is not supported on this exchange")]
    OrderKindNotSupported(crate::order::OrderKind),

    #[error("asset {0} not found")]
    AssetNotFound(String),

    #[error("order {0} not found")]
    OrderNotFound(String),

    #[error("credentials for this exchange were already set")]
    CredentialsAlreadySet,
}
