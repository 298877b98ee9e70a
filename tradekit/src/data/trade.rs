//! Trade state (component C4): a scratch buffer of raw trades collapsed
//! into one-second OHLCV-like buckets, one state per `(exchange, symbol)`.

use crate::collection::DynamicArray;
use crate::data::error::DataError;

const BUCKET_SPAN_MS: i64 = 1_000;

/// Which side of the book a raw trade printed against.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TradeSide {
    Sell,
    Buy,
}

impl TradeSide {
    fn as_f64(self) -> f64 {
        match self {
            TradeSide::Sell => 0.0,
            TradeSide::Buy => 1.0,
        }
    }
}

/// A single incoming trade print.
#[derive(Copy, Clone, Debug)]
pub struct RawTrade {
    pub timestamp_ms: i64,
    pub price: f64,
    pub qty: f64,
    pub side: TradeSide,
}

/// A completed `(timestamp_ms_of_bucket_start, avg_price, buy_qty, sell_qty,
/// buy_count, sell_count)` summary of at most one real-time second of
/// trades.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TradeBucket {
    pub timestamp_ms: i64,
    pub avg_price: f64,
    pub buy_qty: f64,
    pub sell_qty: f64,
    pub buy_count: u64,
    pub sell_count: u64,
}

impl TradeBucket {
    fn to_row(self) -> Vec<f64> {
        vec![
            self.timestamp_ms as f64,
            self.avg_price,
            self.buy_qty,
            self.sell_qty,
            self.buy_count as f64,
            self.sell_count as f64,
        ]
    }
}

/// Per-`(exchange, symbol)` trade state.
pub struct TradeState {
    scratch: Vec<RawTrade>,
    buckets: DynamicArray,
}

impl TradeState {
    pub fn new() -> Self {
        Self {
            scratch: Vec::new(),
            buckets: DynamicArray::with_auto_drop(6, 120),
        }
    }

    /// Feed one raw trade. If it lands at least [`BUCKET_SPAN_MS`] after the
    /// scratch buffer's first row, the scratch is collapsed into a bucket
    /// and flushed before the new trade starts the next scratch window.
    pub fn on_trade(&mut self, trade: RawTrade) -> Result<(), DataError> {
        let mut collapse_result = Ok(());
        if let Some(first) = self.scratch.first() {
            if trade.timestamp_ms - first.timestamp_ms >= BUCKET_SPAN_MS {
                collapse_result = self.collapse();
            }
        }
        self.scratch.push(trade);
        collapse_result
    }

    fn collapse(&mut self) -> Result<(), DataError> {
        if self.scratch.is_empty() {
            return Ok(());
        }
        let total_qty: f64 = self.scratch.iter().map(|t| t.qty).sum();
        if total_qty == 0.0 {
            self.scratch.clear();
            return Err(DataError::DivideByZero);
        }

        let weighted_price: f64 = self.scratch.iter().map(|t| t.price * t.qty).sum();
        let buy_qty: f64 = self
            .scratch
            .iter()
            .filter(|t| t.side == TradeSide::Buy)
            .map(|t| t.qty)
            .sum();
        let sell_qty: f64 = self
            .scratch
            .iter()
            .filter(|t| t.side == TradeSide::Sell)
            .map(|t| t.qty)
            .sum();
        let buy_count = self.scratch.iter().filter(|t| t.side == TradeSide::Buy).count() as u64;
        let sell_count = self.scratch.iter().filter(|t| t.side == TradeSide::Sell).count() as u64;

        let bucket = TradeBucket {
            timestamp_ms: self.scratch[0].timestamp_ms,
            avg_price: weighted_price / total_qty,
            buy_qty,
            sell_qty,
            buy_count,
            sell_count,
        };

        self.buckets.append(bucket.to_row()).expect("bucket row arity");
        self.scratch.clear();
        Ok(())
    }

    /// Force the current scratch window to close, even if it hasn't
    /// reached a full second. Used when the session ends mid-bucket.
    pub fn flush(&mut self) -> Result<(), DataError> {
        self.collapse()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn last_bucket(&self) -> Option<TradeBucket> {
        self.buckets.last().map(|row| TradeBucket {
            timestamp_ms: row[0] as i64,
            avg_price: row[1],
            buy_qty: row[2],
            sell_qty: row[3],
            buy_count: row[4] as u64,
            sell_count: row[5] as u64,
        })
    }
}

impl Default for TradeState {
    fn default() -> Self {
        Self::new()
    }
}
