//! Session events (component ambient stack, §6): the engine's own
//! observability surface. [`SessionEvent`] names every state mutation
//! spec.md §6's `env.logging.*` toggles gate; [`SessionEventSink`] and
//! [`ClosedTradeSink`] are the narrow trait seams a caller backs with a
//! database or pub/sub transport — `tradekit` itself ships neither.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::market::Market;
use crate::position::{ClosedTrade, PositionTransition};

/// One of the event kinds spec.md §6's `env.logging.*` keys gate. Variant
/// names match the config keys exactly so a toggle lookup is a direct
/// match, not a string table.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum SessionEventKind {
    OrderSubmission,
    OrderCancellation,
    OrderExecution,
    PositionOpened,
    PositionIncreased,
    PositionReduced,
    PositionClosed,
    ShorterPeriodCandles,
    TradingCandles,
    BalanceUpdate,
    ExchangeWsReconnection,
}

impl SessionEventKind {
    /// Executions and liquidations log at `info`; everything else at
    /// `debug` (SPEC_FULL §2).
    fn is_info_level(self) -> bool {
        matches!(self, SessionEventKind::OrderExecution | SessionEventKind::PositionClosed)
    }
}

impl fmt::Display for SessionEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionEventKind::OrderSubmission => "order_submission",
            SessionEventKind::OrderCancellation => "order_cancellation",
            SessionEventKind::OrderExecution => "order_execution",
            SessionEventKind::PositionOpened => "position_opened",
            SessionEventKind::PositionIncreased => "position_increased",
            SessionEventKind::PositionReduced => "position_reduced",
            SessionEventKind::PositionClosed => "position_closed",
            SessionEventKind::ShorterPeriodCandles => "shorter_period_candles",
            SessionEventKind::TradingCandles => "trading_candles",
            SessionEventKind::BalanceUpdate => "balance_update",
            SessionEventKind::ExchangeWsReconnection => "exchange_ws_reconnection",
        };
        f.write_str(s)
    }
}

impl From<PositionTransition> for SessionEventKind {
    fn from(transition: PositionTransition) -> Self {
        match transition {
            PositionTransition::Open => SessionEventKind::PositionOpened,
            PositionTransition::Increase => SessionEventKind::PositionIncreased,
            PositionTransition::Reduce => SessionEventKind::PositionReduced,
            PositionTransition::Close | PositionTransition::Flip => SessionEventKind::PositionClosed,
        }
    }
}

/// A session event payload. Mirrors the shape a pub/sub transport would
/// forward on `<APP_PORT>:channel:1` (spec.md §6), but carries no transport
/// concerns itself — serializing and publishing is the sink's job.
#[derive(Clone, Debug, Serialize)]
pub struct SessionEvent {
    #[serde(skip)]
    pub kind: SessionEventKind,
    pub market: Market,
    pub at: DateTime<Utc>,
    pub detail: String,
}

impl SessionEvent {
    pub fn new(kind: SessionEventKind, market: Market, at: DateTime<Utc>, detail: impl Into<String>) -> Self {
        Self { kind, market, at, detail: detail.into() }
    }

    /// Emits the matching `tracing` event at the kind's level, named after
    /// [`SessionEventKind::Display`] so a subscriber can filter on target.
    pub fn log(&self) {
        if self.kind.is_info_level() {
            info!(target: "tradekit::event", kind = %self.kind, market = %self.market, detail = %self.detail);
        } else {
            debug!(target: "tradekit::event", kind = %self.kind, market = %self.market, detail = %self.detail);
        }
    }
}

/// Per-config `env.logging.*` toggle set, queried once per event instead of
/// re-parsing the config inline at every call site.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogToggles {
    pub order_submission: bool,
    pub order_cancellation: bool,
    pub order_execution: bool,
    pub position_opened: bool,
    pub position_increased: bool,
    pub position_reduced: bool,
    pub position_closed: bool,
    pub shorter_period_candles: bool,
    pub trading_candles: bool,
    pub balance_update: bool,
    pub exchange_ws_reconnection: bool,
}

impl LogToggles {
    pub fn allows(&self, kind: SessionEventKind) -> bool {
        match kind {
            SessionEventKind::OrderSubmission => self.order_submission,
            SessionEventKind::OrderCancellation => self.order_cancellation,
            SessionEventKind::OrderExecution => self.order_execution,
            SessionEventKind::PositionOpened => self.position_opened,
            SessionEventKind::PositionIncreased => self.position_increased,
            SessionEventKind::PositionReduced => self.position_reduced,
            SessionEventKind::PositionClosed => self.position_closed,
            SessionEventKind::ShorterPeriodCandles => self.shorter_period_candles,
            SessionEventKind::TradingCandles => self.trading_candles,
            SessionEventKind::BalanceUpdate => self.balance_update,
            SessionEventKind::ExchangeWsReconnection => self.exchange_ws_reconnection,
        }
    }
}

/// External sink for [`SessionEvent`]s, backed by whatever transport the
/// caller wires up (pub/sub, a dashboard websocket, a log aggregator).
/// `tradekit` never implements this itself.
pub trait SessionEventSink: Send {
    fn publish(&mut self, event: SessionEvent);
}

/// External sink for finalized [`ClosedTrade`] records, backed by whatever
/// persistence the caller wires up (a database table, a flat file). Kept
/// separate from [`SessionEventSink`] since closed trades outlive a single
/// session and are typically durable while events are ephemeral.
pub trait ClosedTradeSink: Send {
    fn record(&mut self, trade: ClosedTrade);
}

/// No-op sink: drops every event/trade. Used when a caller has no external
/// transport wired up, or in tests.
#[derive(Default)]
pub struct NullSink;

impl SessionEventSink for NullSink {
    fn publish(&mut self, _event: SessionEvent) {}
}

impl ClosedTradeSink for NullSink {
    fn record(&mut self, _trade: ClosedTrade) {}
}

/// Publishes `event` to `sink` only if `toggles` enables its kind, always
/// emitting the local `tracing` event regardless of the toggle.
pub fn emit(sink: &mut dyn SessionEventSink, toggles: &LogToggles, event: SessionEvent) {
    event.log();
    if toggles.allows(event.kind) {
        sink.publish(event);
    }
}
