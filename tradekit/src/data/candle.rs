//! Candle state (component C5): a 1-minute ring per `(exchange, symbol)`
//! plus a higher-timeframe ring per configured timeframe, generated by
//! reducing suffixes of the 1-minute ring.

use chrono::{DateTime, Utc};

use crate::collection::DynamicArray;
use crate::data::error::DataError;
use crate::data::MarketMeta;
use crate::timeframe::Timeframe;

const MINUTE_MS: i64 = 60_000;

/// Window, relative to `now`, within which an appended candle still counts
/// as "not older than now" for the purpose of refreshing a position's mark
/// price (step 3 of the append algorithm): the forming bar plus one bar of
/// grace for ingestion latency.
const MARKET_UPDATE_STALENESS_MS: i64 = 2 * MINUTE_MS;

/// Fixed `(timestamp_ms, open, close, high, low, volume)` OHLCV record.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Candle {
    pub timestamp_ms: i64,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp_ms: i64, open: f64, close: f64, high: f64, low: f64, volume: f64) -> Result<Self, DataError> {
        let candle = Self { timestamp_ms, open, close, high, low, volume };
        candle.validate()?;
        Ok(candle)
    }

    fn validate(&self) -> Result<(), DataError> {
        if self.timestamp_ms == 0 || self.timestamp_ms % MINUTE_MS != 0 {
            return Err(DataError::InvalidCandleTimestamp);
        }
        if self.volume < 0.0 {
            return Err(DataError::InvalidCandle("volume must be >= 0".into()));
        }
        let body_low = self.open.min(self.close);
        let body_high = self.open.max(self.close);
        if !(self.low <= body_low && body_high <= self.high) {
            return Err(DataError::InvalidCandle(
                "low <= min(open,close) <= max(open,close) <= high violated".into(),
            ));
        }
        Ok(())
    }

    fn to_row(self) -> Vec<f64> {
        vec![self.timestamp_ms as f64, self.open, self.close, self.high, self.low, self.volume]
    }

    fn from_row(row: &[f64]) -> Self {
        Self {
            timestamp_ms: row[0] as i64,
            open: row[1],
            close: row[2],
            high: row[3],
            low: row[4],
            volume: row[5],
        }
    }
}

/// One higher-timeframe ring, sized to hold the configured retention window
/// plus one slot for the currently forming candle.
struct TimeframeRing {
    timeframe: Timeframe,
    rows: DynamicArray,
}

impl TimeframeRing {
    fn new(timeframe: Timeframe, window_minutes: u64) -> Self {
        let capacity = (window_minutes / timeframe.to_minutes()).max(1) as usize + 1;
        Self { timeframe, rows: DynamicArray::with_auto_drop(6, capacity.max(2) * 2) }
    }
}

/// Outcome of [`CandleState::add_candle`].
pub struct CandleAppendOutcome {
    pub appended: bool,
    pub market_update: Option<MarketMeta>,
}

/// Per-`(exchange, symbol)` candle state: the 1-minute ring plus one ring
/// per configured higher timeframe.
pub struct CandleState {
    one_minute: DynamicArray,
    higher: Vec<TimeframeRing>,
    initialized: bool,
}

impl CandleState {
    pub fn new(higher_timeframes: &[Timeframe], window_minutes: u64) -> Self {
        Self {
            one_minute: DynamicArray::with_auto_drop(6, 2_880),
            higher: higher_timeframes
                .iter()
                .filter(|tf| **tf != Timeframe::Minute1)
                .map(|tf| TimeframeRing::new(*tf, window_minutes))
                .collect(),
            initialized: false,
        }
    }

    pub fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn ring_for(&self, tf: Timeframe) -> Option<&DynamicArray> {
        if tf == Timeframe::Minute1 {
            Some(&self.one_minute)
        } else {
            self.higher.iter().find(|r| r.timeframe == tf).map(|r| &r.rows)
        }
    }

    fn ring_for_mut(&mut self, tf: Timeframe) -> Option<&mut DynamicArray> {
        if tf == Timeframe::Minute1 {
            Some(&mut self.one_minute)
        } else {
            self.higher.iter_mut().find(|r| r.timeframe == tf).map(|r| &mut r.rows)
        }
    }

    /// The most recent, possibly-still-forming, candle for `tf`.
    pub fn current(&self, tf: Timeframe) -> Option<Candle> {
        self.ring_for(tf).and_then(DynamicArray::last).map(Candle::from_row)
    }

    /// Drop the forming candle for `tf`, leaving the ring sealed at the
    /// last fully-closed bar.
    pub fn forget(&mut self, tf: Timeframe) -> Result<(), DataError> {
        let ring = self
            .ring_for_mut(tf)
            .ok_or_else(|| DataError::TimeframeNotConfigured(String::new(), String::new(), tf.to_string()))?;
        if !ring.is_empty() {
            ring.delete(-1).expect("ring non-empty");
        }
        Ok(())
    }

    /// Insert, overwrite, or drop an incoming candle per the append/overwrite
    /// ordering rules, then optionally drive higher-timeframe generation.
    ///
    /// `with_skip` gates live-mode ingestion: if the pair isn't yet marked
    /// initialized (see [`Self::mark_initialized`]), the candle is ignored
    /// outright rather than stored. Backtest/paper callers pass `false` so
    /// the gate never applies. When the append succeeds and the pair was
    /// already initialized beforehand, the returned
    /// [`CandleAppendOutcome::market_update`] carries the snapshot a caller
    /// should apply to the matching position's mark price, provided the
    /// candle isn't older than `now`.
    pub fn add_candle(&mut self, tf: Timeframe, candle: Candle, with_generation: bool, with_skip: bool, now: DateTime<Utc>) -> Result<CandleAppendOutcome, DataError> {
        candle.validate()?;

        let was_initialized = self.initialized;
        if with_skip && !was_initialized {
            return Ok(CandleAppendOutcome { appended: false, market_update: None });
        }

        let ring = self.ring_for_mut(tf).ok_or_else(|| {
            DataError::TimeframeNotConfigured(String::new(), String::new(), tf.to_string())
        })?;

        let appended = match ring.last() {
            None => {
                ring.append(candle.to_row()).expect("row arity");
                true
            }
            Some(last) => {
                let last_ts = last[0] as i64;
                if candle.timestamp_ms > last_ts {
                    ring.append(candle.to_row()).expect("row arity");
                    true
                } else if candle.timestamp_ms == last_ts {
                    *ring.get_mut(-1).expect("non-empty") = candle.to_row();
                    true
                } else {
                    let scan_start = ring.len().saturating_sub(20) as i64;
                    let mut overwritten = false;
                    for i in scan_start..ring.len() as i64 {
                        if ring.get(i).expect("in range")[0] as i64 == candle.timestamp_ms {
                            *ring.get_mut(i).expect("in range") = candle.to_row();
                            overwritten = true;
                            break;
                        }
                    }
                    overwritten
                }
            }
        };

        if appended && !self.initialized {
            self.initialized = true;
        }

        let market_update = if appended && was_initialized && (now.timestamp_millis() - candle.timestamp_ms) <= MARKET_UPDATE_STALENESS_MS {
            Some(MarketMeta { close: candle.close, time: now })
        } else {
            None
        };

        if appended && with_generation && tf == Timeframe::Minute1 {
            self.generate_higher_timeframes()?;
        }

        Ok(CandleAppendOutcome { appended, market_update })
    }

    /// For each configured timeframe above 1m, reduce the unconsumed suffix
    /// of the 1-minute ring into a forming (or newly-closed) higher bar.
    fn generate_higher_timeframes(&mut self) -> Result<(), DataError> {
        let tf_minutes: Vec<(Timeframe, u64)> = self.higher.iter().map(|r| (r.timeframe, r.timeframe.to_minutes())).collect();

        for (tf, minutes) in tf_minutes {
            let last_ts = self.current(tf).map(|c| c.timestamp_ms);
            let bucket_start = |ts: i64| ts - (ts % (minutes as i64 * MINUTE_MS));

            let one_min_len = self.one_minute.len();
            let suffix_start = match last_ts {
                None => 0,
                Some(last_ts) => {
                    // Count how many 1m rows belong to the same (still-forming)
                    // bucket as `last_ts`, and re-derive from that point on.
                    let target_bucket = bucket_start(last_ts);
                    let mut idx = one_min_len;
                    for i in (0..one_min_len).rev() {
                        let ts = self.one_minute.get(i as i64).expect("in range")[0] as i64;
                        if bucket_start(ts) < target_bucket {
                            idx = i + 1;
                            break;
                        }
                        if i == 0 {
                            idx = 0;
                        }
                    }
                    idx
                }
            };

            if suffix_start >= one_min_len {
                continue;
            }

            let suffix = self.one_minute.rows(suffix_start as i64, one_min_len as i64).expect("valid range");
            if suffix.is_empty() {
                continue;
            }

            let first = &suffix[0];
            let reduced = Candle {
                timestamp_ms: bucket_start(first[0] as i64),
                open: first[1],
                close: suffix.last().unwrap()[2],
                high: suffix.iter().fold(f64::MIN, |acc, r| acc.max(r[3])),
                low: suffix.iter().fold(f64::MAX, |acc, r| acc.min(r[4])),
                volume: suffix.iter().map(|r| r[5]).sum(),
            };

            let ring = self.ring_for_mut(tf).expect("configured");
            match ring.last() {
                Some(last) if last[0] as i64 == reduced.timestamp_ms => {
                    *ring.get_mut(-1).expect("non-empty") = reduced.to_row();
                }
                _ => ring.append(reduced.to_row()).expect("row arity"),
            }
        }
        Ok(())
    }

    /// Live-only: derive the next tick of the forming 1m candle from a
    /// single trade print, injecting empty continuation candles if the
    /// forming candle is stale.
    pub fn add_candle_from_trade(&mut self, price: f64, volume: f64, now_ms: i64) -> Result<(), DataError> {
        let current_bucket = now_ms - (now_ms % MINUTE_MS);

        match self.one_minute.last() {
            None => {
                let fresh = Candle::new(current_bucket, price, price, price, price, volume)?;
                self.one_minute.append(fresh.to_row()).expect("row arity");
            }
            Some(last_row) => {
                let last = Candle::from_row(last_row);
                if last.timestamp_ms < current_bucket {
                    let mut ts = last.timestamp_ms + MINUTE_MS;
                    while ts < current_bucket {
                        let filler =
                            Candle::new(ts, last.close, last.close, last.close, last.close, 0.0)?;
                        self.one_minute.append(filler.to_row()).expect("row arity");
                        ts += MINUTE_MS;
                    }
                    let fresh = Candle::new(current_bucket, price, price, price, price, volume)?;
                    self.one_minute.append(fresh.to_row()).expect("row arity");
                } else {
                    let patched = Candle {
                        timestamp_ms: last.timestamp_ms,
                        open: last.open,
                        close: price,
                        high: last.high.max(price),
                        low: last.low.min(price),
                        volume: last.volume + volume,
                    };
                    *self.one_minute.get_mut(-1).expect("non-empty") = patched.to_row();
                }
            }
        }
        self.generate_higher_timeframes()
    }

    /// Backtest/optimize-only bulk loader: strictly-newer rows are appended
    /// wholesale; otherwise the overlapping tail is spliced by timestamp.
    pub fn add_multiple_1m(&mut self, candles: &[Candle]) -> Result<(), DataError> {
        if candles.is_empty() {
            return Ok(());
        }
        for c in candles {
            c.validate()?;
        }

        match self.one_minute.last() {
            None => {
                for c in candles {
                    self.one_minute.append(c.to_row()).expect("row arity");
                }
            }
            Some(last_row) => {
                let oldest_stored_ts = self.one_minute.get(0).expect("non-empty")[0] as i64;
                let last_ts = last_row[0] as i64;

                if candles[0].timestamp_ms < oldest_stored_ts {
                    return Err(DataError::CandlesNotFound(String::new(), String::new()));
                }

                if candles[0].timestamp_ms > last_ts {
                    for c in candles {
                        self.one_minute.append(c.to_row()).expect("row arity");
                    }
                } else {
                    for c in candles {
                        if c.timestamp_ms > last_ts {
                            self.one_minute.append(c.to_row()).expect("row arity");
                            continue;
                        }
                        let offset = ((last_ts - c.timestamp_ms) / MINUTE_MS) as i64;
                        let idx = self.one_minute.len() as i64 - 1 - offset;
                        if idx >= 0 {
                            *self.one_minute.get_mut(idx).expect("in range") = c.to_row();
                        }
                    }
                }
            }
        }
        self.generate_higher_timeframes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(ts: i64, o: f64, c: f64, h: f64, l: f64, v: f64) -> Candle {
        Candle::new(ts, o, c, h, l, v).unwrap()
    }

    fn at(ts_ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(ts_ms).unwrap()
    }

    #[test]
    fn rejects_zero_timestamp() {
        assert!(Candle::new(0, 1.0, 1.0, 1.0, 1.0, 1.0).is_err());
    }

    #[test]
    fn rejects_timestamp_not_minute_aligned() {
        assert!(Candle::new(1, 1.0, 1.0, 1.0, 1.0, 1.0).is_err());
    }

    #[test]
    fn rejects_body_outside_high_low() {
        assert!(Candle::new(60_000, 10.0, 11.0, 10.5, 9.0, 1.0).is_err());
    }

    #[test]
    fn append_overwrite_and_scan_rules() {
        let mut state = CandleState::new(&[], 60);
        assert!(state.add_candle(Timeframe::Minute1, candle(60_000, 1.0, 1.0, 1.0, 1.0, 1.0), false, false, at(60_000)).unwrap().appended);
        assert!(state.add_candle(Timeframe::Minute1, candle(120_000, 2.0, 2.0, 2.0, 2.0, 1.0), false, false, at(120_000)).unwrap().appended);
        // Overwrite the last row (same timestamp).
        assert!(state.add_candle(Timeframe::Minute1, candle(120_000, 2.0, 3.0, 3.0, 2.0, 2.0), false, false, at(120_000)).unwrap().appended);
        assert_eq!(state.current(Timeframe::Minute1).unwrap().close, 3.0);

        // Out-of-order but within the last 20 rows: overwrite in place.
        assert!(state.add_candle(Timeframe::Minute1, candle(60_000, 1.0, 9.0, 9.0, 1.0, 1.0), false, false, at(120_000)).unwrap().appended);
        assert_ne!(state.current(Timeframe::Minute1).unwrap().close, 9.0);
    }

    #[test]
    fn live_mode_ignores_candles_until_marked_initialized() {
        let mut state = CandleState::new(&[], 60);
        let outcome = state.add_candle(Timeframe::Minute1, candle(60_000, 1.0, 1.0, 1.0, 1.0, 1.0), false, true, at(60_000)).unwrap();
        assert!(!outcome.appended);
        assert!(state.current(Timeframe::Minute1).is_none());

        state.mark_initialized();
        let outcome = state.add_candle(Timeframe::Minute1, candle(60_000, 1.0, 1.0, 1.0, 1.0, 1.0), false, true, at(60_000)).unwrap();
        assert!(outcome.appended);
    }

    #[test]
    fn market_update_is_returned_only_once_pair_was_already_initialized() {
        let mut state = CandleState::new(&[], 60);
        let first = state.add_candle(Timeframe::Minute1, candle(60_000, 1.0, 1.0, 1.0, 1.0, 1.0), false, false, at(60_000)).unwrap();
        assert!(first.market_update.is_none());

        let second = state.add_candle(Timeframe::Minute1, candle(120_000, 1.0, 2.0, 2.0, 1.0, 1.0), false, false, at(120_000)).unwrap();
        let meta = second.market_update.expect("pair was already initialized");
        assert_eq!(meta.close, 2.0);
    }

    #[test]
    fn higher_timeframe_is_generated_from_1m_suffix() {
        let mut state = CandleState::new(&[Timeframe::Minute3], 180);
        for (i, (o, c, h, l, v)) in [
            (1.0, 2.0, 2.5, 0.5, 10.0),
            (2.0, 3.0, 3.5, 1.5, 10.0),
            (3.0, 1.0, 3.5, 0.5, 10.0),
        ]
        .into_iter()
        .enumerate()
        {
            let ts = (i as i64 + 1) * MINUTE_MS;
            state.add_candle(Timeframe::Minute1, candle(ts, o, c, h, l, v), true, false, at(ts)).unwrap();
        }

        let three_min = state.current(Timeframe::Minute3).unwrap();
        assert_eq!(three_min.open, 1.0);
        assert_eq!(three_min.close, 1.0);
        assert_eq!(three_min.high, 3.5);
        assert_eq!(three_min.low, 0.5);
        assert_eq!(three_min.volume, 30.0);
    }

    #[test]
    fn add_multiple_1m_rejects_batch_older_than_stored() {
        let mut state = CandleState::new(&[], 60);
        state.add_candle(Timeframe::Minute1, candle(120_000, 1.0, 1.0, 1.0, 1.0, 1.0), false, false, at(120_000)).unwrap();
        let batch = vec![candle(60_000, 1.0, 1.0, 1.0, 1.0, 1.0)];
        assert!(matches!(state.add_multiple_1m(&batch), Err(DataError::CandlesNotFound(_, _))));
    }

    #[test]
    fn forget_drops_the_forming_candle() {
        let mut state = CandleState::new(&[], 60);
        state.add_candle(Timeframe::Minute1, candle(60_000, 1.0, 1.0, 1.0, 1.0, 1.0), false, false, at(60_000)).unwrap();
        state.add_candle(Timeframe::Minute1, candle(120_000, 2.0, 2.0, 2.0, 2.0, 1.0), false, false, at(120_000)).unwrap();
        state.forget(Timeframe::Minute1).unwrap();
        assert_eq!(state.current(Timeframe::Minute1).unwrap().timestamp_ms, 60_000);
    }
}
