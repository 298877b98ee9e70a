//! Order-book snapshot + the turnover computation that walks its levels
//! against a trade amount (spec.md glossary "Turnover"). Shares the
//! `(price, qty)` level representation with `tradekit`'s order-book state
//! (component C3) rather than inventing a parallel one.

use serde::Deserialize;
use tradekit::data::orderbook::Level;

use crate::error::{ArbitrageError, Result};

/// Two price ladders for one symbol: asks ascending, bids descending —
/// same convention as `tradekit::data::orderbook`.
#[derive(Clone, Debug, Default)]
pub struct OrderBookSnapshot {
    pub asks: Vec<Level>,
    pub bids: Vec<Level>,
}

#[derive(Deserialize)]
struct WireOrderBook {
    #[serde(default)]
    bids: Vec<[String; 2]>,
    #[serde(default)]
    asks: Vec<[String; 2]>,
}

impl OrderBookSnapshot {
    /// Parses the venue's `{bids:[[price,qty],...],asks:[[price,qty],...]}`
    /// shape (spec.md §6), where price/qty arrive as strings.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let wire: WireOrderBook = serde_json::from_value(value.clone())
            .map_err(|e| ArbitrageError::InvalidShape(e.to_string()))?;

        let parse_level = |level: &[String; 2]| -> Result<Level> {
            let price: f64 = level[0]
                .parse()
                .map_err(|_| ArbitrageError::InvalidShape(format!("bad price: {}", level[0])))?;
            let qty: f64 = level[1]
                .parse()
                .map_err(|_| ArbitrageError::InvalidShape(format!("bad qty: {}", level[1])))?;
            Ok((price, qty))
        };

        let bids = wire.bids.iter().map(parse_level).collect::<Result<Vec<_>>>()?;
        let asks = wire.asks.iter().map(parse_level).collect::<Result<Vec<_>>>()?;
        Ok(Self { asks, bids })
    }

    pub fn is_empty(&self) -> bool {
        self.asks.is_empty() && self.bids.is_empty()
    }

    /// Walks the ladders against `amount` units of the base asset:
    /// - `receive`: proceeds from selling `amount` into the bids (price ×
    ///   qty consumed level by level, best price first).
    /// - `pay`: base units spent buying `amount` worth (quote) from the
    ///   asks, i.e. how much base is needed to absorb `amount` of quote
    ///   notional walking the asks from the top.
    ///
    /// Partial fills at the venue's deepest available level are not
    /// flagged; a caller walking past the ladder's depth gets whatever
    /// was accumulated (mirrors the venue behavior this was grounded on).
    pub fn best_turnover(&self, amount: f64) -> (f64, f64) {
        let mut sell_remaining = amount;
        let mut receive = 0.0;
        for &(price, qty) in &self.bids {
            if sell_remaining <= qty {
                receive += sell_remaining * price;
                sell_remaining = 0.0;
                break;
            } else {
                receive += qty * price;
                sell_remaining -= qty;
            }
        }

        let mut buy_remaining = amount;
        let mut pay = 0.0;
        for &(price, qty) in &self.asks {
            let notional = price * qty;
            if buy_remaining <= notional {
                pay += if price > 0.0 { buy_remaining / price } else { f64::NAN };
                buy_remaining = 0.0;
                break;
            } else {
                pay += qty;
                buy_remaining -= notional;
            }
        }

        (receive, pay)
    }
}
