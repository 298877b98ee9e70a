use thiserror::Error;

/// Errors raised by [`super::Position`] mutators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PositionError {
    #[error("cannot open a position that is not CLOSE")]
    AlreadyOpen,

    #[error("cannot mutate a position that is CLOSE")]
    NotOpen,

    #[error("reduce quantity exceeds the open position's size")]
    ReduceExceedsSize,

    #[error("liquidation price is only defined for isolated futures positions")]
    NoLiquidationPrice,

    #[error("futures-only field accessed on a spot position")]
    NotFutures,

    #[error("failed to build position due to missing attribute: {0}")]
    BuilderIncomplete(&'static str),
}
