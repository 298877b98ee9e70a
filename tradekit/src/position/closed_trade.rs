//! Closed-trade record (spec.md §3 "Closed trade"): the aggregated summary
//! of a position's full lifetime, finalized by the simulation driver
//! whenever [`super::PositionTransition::Close`] or
//! [`super::PositionTransition::Flip`] occurs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::market::{ExchangeId, SymbolId};
use crate::order::Order;
use crate::position::model::PositionType;
use crate::timeframe::Timeframe;

/// Owns copies of the orders that opened and closed a position, plus the
/// derived figures a performance report reads (`realized_pnl`, `roi`).
/// Closed trades never reference the live [`super::Position`]/order-store
/// rows they were built from — by the time one exists the position may
/// already have reopened for the next cycle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub exchange_name: ExchangeId,
    pub symbol: SymbolId,
    pub position_type: PositionType,
    pub timeframe: Timeframe,
    pub strategy_name: String,
    pub entry_orders: Vec<Order>,
    pub exit_orders: Vec<Order>,
    pub realized_pnl: Decimal,
    pub leverage: Decimal,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
}

impl ClosedTrade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        exchange_name: impl Into<ExchangeId>,
        symbol: impl Into<SymbolId>,
        position_type: PositionType,
        timeframe: Timeframe,
        strategy_name: impl Into<String>,
        entry_orders: Vec<Order>,
        exit_orders: Vec<Order>,
        realized_pnl: Decimal,
        leverage: Decimal,
        opened_at: DateTime<Utc>,
        closed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            exchange_name: exchange_name.into(),
            symbol: symbol.into(),
            position_type,
            timeframe,
            strategy_name: strategy_name.into(),
            entry_orders,
            exit_orders,
            realized_pnl,
            leverage,
            opened_at,
            closed_at,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.closed_at - self.opened_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderKind;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(0, 0).unwrap()
    }

    fn order() -> Order {
        Order::new("binance", "BTC-USDT", Uuid::new_v4(), OrderKind::Market, Decimal::ONE, Some(Decimal::from(100)), false, now()).unwrap()
    }

    #[test]
    fn duration_is_closed_at_minus_opened_at() {
        let trade = ClosedTrade::new(
            "binance",
            "BTC-USDT",
            PositionType::Long,
            Timeframe::Hour1,
            "demo",
            vec![order()],
            vec![order()],
            Decimal::from(10),
            Decimal::ONE,
            now(),
            now() + chrono::Duration::hours(2),
        );
        assert_eq!(trade.duration(), chrono::Duration::hours(2));
    }
}
