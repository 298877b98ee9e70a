//! Engine (ties components C5-C11 together): the owner of a session's
//! repositories and accounts, driving candle ingestion through the
//! simulation driver and finalizing [`ClosedTrade`] records.
//!
//! Backtest/paper callers drive this directly from a candle iterator; live
//! mode replaces [`simulate_tick`] with real exchange adapters while
//! reusing everything else unchanged (spec.md §2's data-flow note).

pub mod error;

pub use error::EngineError;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::data::orderbook::Level;
use crate::data::trade::RawTrade;
use crate::data::{Candle, CandleRepository, OrderBookRepository, TradeRepository};
use crate::event::{emit, ClosedTradeSink, LogToggles, SessionEvent, SessionEventKind, SessionEventSink};
use crate::exchange::Sandbox;
use crate::market::{ExchangeId, Market};
use crate::order::{OrderRepository, OrderStatus, Side};
use crate::position::{ClosedTrade, Position, PositionTransition};
use crate::session::{RunMode, Session};
use crate::simulation::{simulate_tick, FillOutcome};
use crate::timeframe::Timeframe;

/// Snapshot of a [`Position`] taken immediately before a tick's fills are
/// applied, so a [`Close`](PositionTransition::Close)/
/// [`Flip`](PositionTransition::Flip) transition can still report the
/// pre-close entry price and size once the live [`Position`] has already
/// zeroed/reopened them.
struct PreFillSnapshot {
    entry_price: Decimal,
    qty: Decimal,
    leverage: Decimal,
    opened_at: DateTime<Utc>,
}

/// The owner of session repositories, per-exchange accounts, and
/// per-market positions. One [`Engine`] per running session.
pub struct Engine {
    pub session: Session,
    pub candles: CandleRepository,
    pub orderbooks: OrderBookRepository,
    pub trades: TradeRepository,
    pub orders: OrderRepository,
    accounts: HashMap<ExchangeId, Sandbox>,
    positions: HashMap<Market, Position>,
    strategy_names: HashMap<Market, String>,
    toggles: LogToggles,
    event_sink: Box<dyn SessionEventSink>,
    trade_sink: Box<dyn ClosedTradeSink>,
}

impl Engine {
    pub fn new(
        mode: RunMode,
        starting_time: DateTime<Utc>,
        toggles: LogToggles,
        event_sink: Box<dyn SessionEventSink>,
        trade_sink: Box<dyn ClosedTradeSink>,
    ) -> Self {
        Self {
            session: Session::new(mode, starting_time),
            candles: CandleRepository::default(),
            orderbooks: OrderBookRepository::default(),
            trades: TradeRepository::default(),
            orders: OrderRepository::default(),
            accounts: HashMap::new(),
            positions: HashMap::new(),
            strategy_names: HashMap::new(),
            toggles,
            event_sink,
            trade_sink,
        }
    }

    pub fn register_account(&mut self, exchange: impl Into<ExchangeId>, account: Sandbox) {
        self.accounts.insert(exchange.into(), account);
    }

    pub fn register_position(&mut self, market: Market, position: Position, strategy_name: impl Into<String>) {
        self.strategy_names.insert(market.clone(), strategy_name.into());
        self.positions.insert(market, position);
    }

    pub fn position(&self, market: &Market) -> Option<&Position> {
        self.positions.get(market)
    }

    pub fn account(&self, exchange: &str) -> Option<&Sandbox> {
        self.accounts.get(exchange)
    }

    /// Live-only: flags `market`'s candle pair as initialized once a caller's
    /// historical backfill has completed, letting subsequent live ticks
    /// through the `with_skip` gate in [`Self::on_new_candle`].
    pub fn mark_candles_initialized(&mut self, market: &Market, higher_timeframes: &[Timeframe], window_minutes: u64) {
        self.candles.get_or_insert(market, higher_timeframes, window_minutes).mark_initialized();
    }

    /// Ingests one raw order-book update for `market`: trims both sides
    /// onto the price grid and appends a formatted snapshot if due.
    pub fn on_orderbook_update(&mut self, market: &Market, raw_asks: &[Level], raw_bids: &[Level], now_ms: i64) {
        self.orderbooks.get_or_insert(market).update_raw(raw_asks, raw_bids, now_ms);
    }

    /// Ingests one raw trade print for `market`, collapsing the scratch
    /// buffer into a one-second bucket once a full span has elapsed.
    pub fn on_trade(&mut self, market: &Market, trade: RawTrade) -> Result<(), EngineError> {
        self.trades.get_or_insert(market).on_trade(trade)?;
        Ok(())
    }

    /// Ingests one new 1-minute candle for `market`: appends it to the
    /// candle repository (generating configured higher timeframes), then
    /// matches active orders against the candle's range via
    /// [`simulate_tick`], applying fills to the position and finalizing a
    /// [`ClosedTrade`] for any resulting Close/Flip.
    pub fn on_new_candle(
        &mut self,
        market: &Market,
        higher_timeframes: &[Timeframe],
        window_minutes: u64,
        candle: Candle,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> Result<Vec<FillOutcome>, EngineError> {
        if self.session.mode == RunMode::Backtest {
            self.session.advance_clock(candle.timestamp_ms);
        }

        let state = self.candles.get_or_insert(market, higher_timeframes, window_minutes);
        let previous_close = state.current(Timeframe::Minute1).map(|c| Decimal::try_from(c.close).unwrap_or_default()).unwrap_or(Decimal::try_from(candle.close).unwrap_or_default());

        let with_skip = self.session.mode == RunMode::Live;
        let result = state.add_candle(Timeframe::Minute1, candle, true, with_skip, now)?;
        if !result.appended {
            return Ok(Vec::new());
        }
        if let Some(meta) = result.market_update {
            if let Some(position) = self.positions.get_mut(market) {
                position.update_from_market(meta);
            }
        }
        emit(
            self.event_sink.as_mut(),
            &self.toggles,
            SessionEvent::new(SessionEventKind::TradingCandles, market.clone(), now, format!("close={}", candle.close)),
        );
        for tf in higher_timeframes.iter().filter(|tf| **tf != Timeframe::Minute1) {
            if let Some(higher) = self.candles.get(market).and_then(|s| s.current(*tf)) {
                emit(
                    self.event_sink.as_mut(),
                    &self.toggles,
                    SessionEvent::new(SessionEventKind::ShorterPeriodCandles, market.clone(), now, format!("{}:close={}", tf, higher.close)),
                );
            }
        }

        let sandbox = self.accounts.get_mut(market.exchange.as_str()).ok_or_else(|| EngineError::AccountNotFound(market.exchange.to_string()))?;
        let position = self.positions.get_mut(market).ok_or_else(|| EngineError::PositionNotFound(market.to_string()))?;

        let snapshot = PreFillSnapshot {
            entry_price: position.entry_price.unwrap_or_default(),
            qty: position.qty,
            leverage: position.leverage,
            opened_at: position.opened_at.unwrap_or(now),
        };

        let outcomes = simulate_tick(sandbox, &mut self.orders, market, position, previous_close, &candle, now)?;

        for outcome in &outcomes {
            self.emit_transition_event(market, outcome, now);
            if matches!(outcome.transition, PositionTransition::Close | PositionTransition::Flip) {
                self.finalize_closed_trade(market, &snapshot, outcome, timeframe, now);
            }
        }

        Ok(outcomes)
    }

    fn emit_transition_event(&mut self, market: &Market, outcome: &FillOutcome, now: DateTime<Utc>) {
        let kind = SessionEventKind::from(outcome.transition);
        emit(
            self.event_sink.as_mut(),
            &self.toggles,
            SessionEvent::new(kind, market.clone(), now, format!("order={} fill_price={}", outcome.order_id, outcome.fill_price)),
        );
    }

    fn finalize_closed_trade(&mut self, market: &Market, snapshot: &PreFillSnapshot, outcome: &FillOutcome, timeframe: Timeframe, now: DateTime<Utc>) {
        let was_long = snapshot.qty.is_sign_positive();
        let realized_pnl = if was_long {
            (outcome.fill_price - snapshot.entry_price) * snapshot.qty.abs()
        } else {
            (snapshot.entry_price - outcome.fill_price) * snapshot.qty.abs()
        };

        let entry_side = if was_long { Side::Buy } else { Side::Sell };
        let exit_side = entry_side.opposite();

        let executed: Vec<_> = self.orders.get(market).iter().filter(|o| o.status == OrderStatus::Executed).cloned().collect();
        let entry_orders = executed.iter().filter(|o| o.side == entry_side).cloned().collect();
        let exit_orders = executed.iter().filter(|o| o.side == exit_side).cloned().collect();

        let strategy_name = self.strategy_names.get(market).cloned().unwrap_or_default();
        let trade = ClosedTrade::new(
            market.exchange.clone(),
            market.symbol.clone(),
            if was_long { crate::position::PositionType::Long } else { crate::position::PositionType::Short },
            timeframe,
            strategy_name,
            entry_orders,
            exit_orders,
            realized_pnl,
            snapshot.leverage,
            snapshot.opened_at,
            now,
        );
        self.trade_sink.record(trade);
        self.orders.reset_trade(market);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{Account, SpotAccount};
    use crate::order::{Order, OrderKind};
    use crate::position::AccountKind;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(0, 0).unwrap()
    }

    fn sandbox() -> Sandbox {
        let mut assets = HashMap::new();
        assets.insert(smol_str::SmolStr::new("USDT"), Decimal::from(100_000));
        assets.insert(smol_str::SmolStr::new("BTC"), Decimal::from(100));
        Sandbox::new(Account::Spot(SpotAccount::new(Decimal::ZERO, assets)))
    }

    #[test]
    fn ingesting_candle_without_registered_account_fails() {
        let mut engine = Engine::new(RunMode::Backtest, now(), LogToggles::default(), Box::new(crate::event::NullSink), Box::new(crate::event::NullSink));
        let market = Market::new("binance", "BTC-USDT");
        let candle = Candle::new(60_000, 95.0, 100.0, 101.0, 94.0, 10.0).unwrap();
        let result = engine.on_new_candle(&market, &[Timeframe::Minute1], 120, candle, Timeframe::Minute1, now());
        assert!(matches!(result, Err(EngineError::AccountNotFound(_))));
    }

    #[test]
    fn filled_order_closes_position_and_finalizes_a_trade() {
        struct Recording(Vec<ClosedTrade>);
        impl ClosedTradeSink for Recording {
            fn record(&mut self, trade: ClosedTrade) {
                self.0.push(trade);
            }
        }

        let mut engine = Engine::new(RunMode::Backtest, now(), LogToggles::default(), Box::new(crate::event::NullSink), Box::new(Recording(Vec::new())));
        let market = Market::new("binance", "BTC-USDT");
        engine.register_account("binance", sandbox());
        let position = Position::flat("binance", "BTC-USDT", AccountKind::Spot, Decimal::ZERO, Decimal::new(1, 3), Decimal::ZERO);
        engine.register_position(market.clone(), position, "demo");

        let entry = Order::new("binance", "BTC-USDT", Uuid::new_v4(), OrderKind::Limit, Decimal::ONE, Some(Decimal::from(100)), false, now()).unwrap();
        engine.orders.add(&market, entry, false);
        let candle = Candle::new(60_000, 95.0, 100.0, 101.0, 94.0, 10.0).unwrap();
        let outcomes = engine.on_new_candle(&market, &[Timeframe::Minute1], 120, candle, Timeframe::Minute1, now()).unwrap();
        assert_eq!(outcomes[0].transition, PositionTransition::Open);

        let exit = Order::new("binance", "BTC-USDT", Uuid::new_v4(), OrderKind::Limit, -Decimal::ONE, Some(Decimal::from(110)), true, now()).unwrap();
        engine.orders.add(&market, exit, false);
        let candle2 = Candle::new(120_000, 100.0, 111.0, 112.0, 99.0, 10.0).unwrap();
        let outcomes = engine.on_new_candle(&market, &[Timeframe::Minute1], 120, candle2, Timeframe::Minute1, now()).unwrap();
        assert_eq!(outcomes[0].transition, PositionTransition::Close);
    }

    #[test]
    fn orderbook_and_trade_updates_are_reachable_through_the_session() {
        use crate::data::trade::TradeSide;

        let mut engine = Engine::new(RunMode::Backtest, now(), LogToggles::default(), Box::new(crate::event::NullSink), Box::new(crate::event::NullSink));
        let market = Market::new("binance", "BTC-USDT");

        engine.on_orderbook_update(&market, &[(101.0, 1.0)], &[(99.0, 1.0)], 0);
        assert_eq!(engine.orderbooks.get(&market).and_then(|b| b.best_ask()), Some((101.0, 1.0)));

        engine
            .on_trade(&market, crate::data::trade::RawTrade { timestamp_ms: 0, price: 100.0, qty: 1.0, side: TradeSide::Buy })
            .unwrap();
        engine
            .on_trade(&market, crate::data::trade::RawTrade { timestamp_ms: 1_000, price: 101.0, qty: 1.0, side: TradeSide::Sell })
            .unwrap();
        assert_eq!(engine.trades.get(&market).map(|t| t.bucket_count()), Some(1));
    }

    #[test]
    fn live_mode_ignores_candles_until_initialization_is_flagged() {
        let mut engine = Engine::new(RunMode::Live, now(), LogToggles::default(), Box::new(crate::event::NullSink), Box::new(crate::event::NullSink));
        let market = Market::new("binance", "BTC-USDT");
        engine.register_account("binance", sandbox());
        let position = Position::flat("binance", "BTC-USDT", AccountKind::Spot, Decimal::ZERO, Decimal::new(1, 3), Decimal::ZERO);
        engine.register_position(market.clone(), position, "demo");

        let candle = Candle::new(60_000, 95.0, 100.0, 101.0, 94.0, 10.0).unwrap();
        let outcomes = engine.on_new_candle(&market, &[Timeframe::Minute1], 120, candle, Timeframe::Minute1, now()).unwrap();
        assert!(outcomes.is_empty());
        assert!(engine.candles.get(&market).and_then(|c| c.current(Timeframe::Minute1)).is_none());

        engine.mark_candles_initialized(&market, &[Timeframe::Minute1], 120);
        engine.on_new_candle(&market, &[Timeframe::Minute1], 120, candle, Timeframe::Minute1, now()).unwrap();
        assert!(engine.candles.get(&market).and_then(|c| c.current(Timeframe::Minute1)).is_some());
    }
}
