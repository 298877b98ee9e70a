use serde::{Deserialize, Serialize};

/// Unique identifier for an exchange (eg/ "binance", "bybit").
pub type ExchangeId = smol_str::SmolStr;

/// Unique identifier for a symbol (eg/ "BTC-USDT").
pub type SymbolId = smol_str::SmolStr;

/// Unique combination of an [`ExchangeId`] & a [`SymbolId`]. Every [`crate::data`],
/// [`crate::order`] and [`crate::position`] repository is keyed by [`Market`].
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct Market {
    pub exchange: ExchangeId,
    pub symbol: SymbolId,
}

impl Market {
    pub fn new(exchange: impl Into<ExchangeId>, symbol: impl Into<SymbolId>) -> Self {
        Self {
            exchange: exchange.into(),
            symbol: symbol.into(),
        }
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.exchange, self.symbol)
    }
}

/// A `(exchange, symbol, timeframe)` triple a strategy subscribes to.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct Route {
    pub exchange: ExchangeId,
    pub symbol: SymbolId,
    pub timeframe: crate::timeframe::Timeframe,
}
