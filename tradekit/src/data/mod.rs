//! Market-data state: order books (C3), trades (C4) and candles (C5),
//! each keyed by [`crate::market::Market`] and held in its own repository.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::market::Market;
use crate::timeframe::Timeframe;

pub mod candle;
pub mod error;
pub mod orderbook;
pub mod trade;

pub use candle::{Candle, CandleAppendOutcome, CandleState};
pub use error::DataError;
pub use orderbook::OrderBookState;
pub use trade::{RawTrade, TradeBucket, TradeSide};

/// Close price & exchange timestamp of the most recent market event for a
/// [`Market`]. Propagated into [`crate::position::Position`] mark-to-market
/// updates.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct MarketMeta {
    pub close: f64,
    pub time: DateTime<Utc>,
}

impl Default for MarketMeta {
    fn default() -> Self {
        Self { close: 100.0, time: Utc::now() }
    }
}

/// Owns one [`CandleState`] per [`Market`]. The session holds exactly one
/// of these (component C11's candle repository).
#[derive(Default)]
pub struct CandleRepository {
    states: HashMap<Market, CandleState>,
}

impl CandleRepository {
    pub fn get_or_insert(&mut self, market: &Market, higher_timeframes: &[Timeframe], window_minutes: u64) -> &mut CandleState {
        self.states
            .entry(market.clone())
            .or_insert_with(|| CandleState::new(higher_timeframes, window_minutes))
    }

    pub fn get(&self, market: &Market) -> Option<&CandleState> {
        self.states.get(market)
    }
}

/// Owns one [`OrderBookState`] per [`Market`].
#[derive(Default)]
pub struct OrderBookRepository {
    states: HashMap<Market, OrderBookState>,
}

impl OrderBookRepository {
    pub fn get_or_insert(&mut self, market: &Market) -> &mut OrderBookState {
        self.states.entry(market.clone()).or_default()
    }

    pub fn get(&self, market: &Market) -> Option<&OrderBookState> {
        self.states.get(market)
    }
}

/// Owns one [`TradeState`](trade::TradeState) per [`Market`].
#[derive(Default)]
pub struct TradeRepository {
    states: HashMap<Market, trade::TradeState>,
}

impl TradeRepository {
    pub fn get_or_insert(&mut self, market: &Market) -> &mut trade::TradeState {
        self.states.entry(market.clone()).or_default()
    }

    pub fn get(&self, market: &Market) -> Option<&trade::TradeState> {
        self.states.get(market)
    }
}
