use thiserror::Error;

/// Errors generated by the market-data state machines (order book, trade,
/// candle aggregation).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("candle timestamp must be non-zero and divisible by 60000")]
    InvalidCandleTimestamp,

    #[error("candle invariant violated: {0}")]
    InvalidCandle(String),

    #[error("division by zero aggregating trade bucket")]
    DivideByZero,

    /// Raised by `add_multiple_1m` when the incoming batch's oldest row
    /// predates the oldest row already stored, leaving no overlap to splice.
    #[error("no candles found for {0}/{1}")]
    CandlesNotFound(String, String),

    #[error("unknown timeframe requested for {0}/{1}: {2}")]
    TimeframeNotConfigured(String, String, String),
}
