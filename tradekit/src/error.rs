use thiserror::Error;

use crate::{
    data::DataError, engine::EngineError, exchange::ExchangeError, order::OrderError,
    position::PositionError,
};

/// Top-level error aggregating every layer's error enum.
///
/// Each layer (`data`, `order`, `position`, `exchange`, `config`) keeps its
/// own error type so a caller pattern-matching on a specific failure mode
/// doesn't need to reach through an umbrella variant; `TradekitError` exists
/// for call sites (the session event loop, integration tests) that want one
/// `Result` to propagate with `?`.
#[derive(Error, Debug)]
pub enum TradekitError {
    #[error("data: {0}")]
    Data(#[from] DataError),

    #[error("order: {0}")]
    Order(#[from] OrderError),

    #[error("position: {0}")]
    Position(#[from] PositionError),

    #[error("exchange: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("engine: {0}")]
    Engine(#[from] EngineError),

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build struct due to incomplete attributes: {0}")]
    BuilderIncomplete(&'static str),

    #[error("lifecycle: session terminated")]
    Termination,

    #[error("not supported: {0}")]
    NotSupported(&'static str),
}

/// Configuration-layer errors (spec.md §7 "Configuration" kind group).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid config value at key `{0}`: {1}")]
    InvalidConfig(String, String),

    #[error("invalid timeframe string: {0}")]
    InvalidTimeframe(String),

    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("invalid exchange api keys for exchange `{0}`")]
    InvalidExchangeApiKeys(String),

    #[error("route not found for (exchange={0}, symbol={1}, timeframe={2})")]
    RouteNotFound(String, String, String),

    #[error("invalid routes: {0}")]
    InvalidRoutes(String),

    #[error("symbol not found: {0}")]
    SymbolNotFound(String),
}
