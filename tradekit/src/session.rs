//! Session/app state (component C11): the process-wide record every other
//! component reads its clock and bookkeeping counters from.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::exchange::ExchangeError;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum RunMode {
    Backtest,
    Paper,
    Live,
}

#[derive(Clone, Debug)]
struct Credentials {
    exchange_api_key_id: Option<String>,
    notifications_key_id: Option<String>,
}

/// Process-wide session state: the logical/wall clock, lifetime bounds,
/// and running counters every component consults instead of keeping its
/// own notion of "now".
pub struct Session {
    pub session_id: Uuid,
    pub mode: RunMode,
    /// Wall clock in live/paper; the logical clock driven by the most
    /// recent candle timestamp in backtest.
    now_ms: i64,
    pub starting_time: DateTime<Utc>,
    pub ending_time: Option<DateTime<Utc>>,
    daily_balance: Vec<(DateTime<Utc>, Decimal)>,
    pub open_pl: Decimal,
    pub open_trades: u64,
    pub liquidations: u64,
    credentials: Credentials,
}

impl Session {
    pub fn new(mode: RunMode, starting_time: DateTime<Utc>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            mode,
            now_ms: starting_time.timestamp_millis(),
            starting_time,
            ending_time: None,
            daily_balance: Vec::new(),
            open_pl: Decimal::ZERO,
            open_trades: 0,
            liquidations: 0,
            credentials: Credentials { exchange_api_key_id: None, notifications_key_id: None },
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.now_ms
    }

    /// Advances the clock. In backtest this is called with the new
    /// candle's timestamp; in live/paper with the wall clock.
    pub fn advance_clock(&mut self, now_ms: i64) {
        self.now_ms = now_ms;
    }

    pub fn record_daily_balance(&mut self, at: DateTime<Utc>, balance: Decimal) {
        self.daily_balance.push((at, balance));
    }

    pub fn daily_balance_history(&self) -> &[(DateTime<Utc>, Decimal)] {
        &self.daily_balance
    }

    pub fn record_liquidation(&mut self) {
        self.liquidations += 1;
    }

    pub fn set_exchange_api_key_id(&mut self, key_id: String) -> Result<(), ExchangeError> {
        if self.credentials.exchange_api_key_id.is_some() {
            return Err(ExchangeError::CredentialsAlreadySet);
        }
        self.credentials.exchange_api_key_id = Some(key_id);
        Ok(())
    }

    pub fn set_notifications_key_id(&mut self, key_id: String) -> Result<(), ExchangeError> {
        if self.credentials.notifications_key_id.is_some() {
            return Err(ExchangeError::CredentialsAlreadySet);
        }
        self.credentials.notifications_key_id = Some(key_id);
        Ok(())
    }

    pub fn end(&mut self, at: DateTime<Utc>) {
        self.ending_time = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(0, 0).unwrap()
    }

    #[test]
    fn credentials_are_write_once() {
        let mut session = Session::new(RunMode::Backtest, epoch());
        session.set_exchange_api_key_id("key-1".into()).unwrap();
        let result = session.set_exchange_api_key_id("key-2".into());
        assert_eq!(result, Err(ExchangeError::CredentialsAlreadySet));
    }

    #[test]
    fn advance_clock_updates_now_ms() {
        let mut session = Session::new(RunMode::Backtest, epoch());
        session.advance_clock(120_000);
        assert_eq!(session.now_ms(), 120_000);
    }
}
