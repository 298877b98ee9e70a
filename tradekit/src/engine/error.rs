use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no account registered for exchange `{0}`")]
    AccountNotFound(String),

    #[error("no position registered for market `{0}`")]
    PositionNotFound(String),

    #[error("data: {0}")]
    Data(#[from] crate::data::DataError),

    #[error("exchange: {0}")]
    Exchange(#[from] crate::exchange::ExchangeError),

    #[error("position: {0}")]
    Position(#[from] crate::position::PositionError),
}
