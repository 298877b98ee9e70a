use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatisticError {
    #[error("ratio is undefined with fewer than two returns")]
    InsufficientSamples,
}
