//! Order model (component C6 data half): the [`Order`] record and its
//! lifecycle state machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::market::{ExchangeId, SymbolId};
use crate::order::error::OrderError;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn from_signed_qty(qty: Decimal) -> Self {
        if qty.is_sign_negative() {
            Side::Sell
        } else {
            Side::Buy
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
    Limit,
    Stop,
}

/// Lifecycle status. QUEUED→ACTIVE→(PARTIALLY_FILLED)*→EXECUTED|CANCELED|
/// REJECTED. Terminal states are absorbing; [`OrderStatus::is_terminal`]
/// gates every transition attempt.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum OrderStatus {
    Queued,
    Active,
    PartiallyFilled,
    Executed,
    Canceled,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Executed | OrderStatus::Canceled | OrderStatus::Rejected)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub exchange_id: Option<String>,
    pub trade_id: Option<Uuid>,
    pub session_id: Uuid,
    pub symbol: SymbolId,
    pub exchange_name: ExchangeId,
    pub side: Side,
    pub kind: OrderKind,
    pub reduce_only: bool,
    /// Signed: positive = buy, negative = sell. Mirrors `side`.
    pub qty: Decimal,
    pub filled_qty: Decimal,
    pub price: Option<Decimal>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        exchange_name: impl Into<ExchangeId>,
        symbol: impl Into<SymbolId>,
        session_id: Uuid,
        kind: OrderKind,
        qty: Decimal,
        price: Option<Decimal>,
        reduce_only: bool,
        created_at: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if qty.is_zero() {
            return Err(OrderError::ZeroQuantity);
        }
        if kind != OrderKind::Market && price.is_none() {
            return Err(OrderError::MissingPrice);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            exchange_id: None,
            trade_id: None,
            session_id,
            symbol: symbol.into(),
            exchange_name: exchange_name.into(),
            side: Side::from_signed_qty(qty),
            kind,
            reduce_only,
            qty,
            filled_qty: Decimal::ZERO,
            price,
            status: OrderStatus::Queued,
            created_at,
            executed_at: None,
            canceled_at: None,
        })
    }

    pub fn activate(&mut self) -> Result<(), OrderError> {
        self.transition(OrderStatus::Active)
    }

    pub fn fill(&mut self, fill_qty: Decimal, at: DateTime<Utc>) -> Result<(), OrderError> {
        self.filled_qty += fill_qty;
        if self.filled_qty.abs() >= self.qty.abs() {
            self.transition(OrderStatus::Executed)?;
            self.executed_at = Some(at);
        } else {
            self.transition(OrderStatus::PartiallyFilled)?;
        }
        Ok(())
    }

    pub fn cancel(&mut self, at: DateTime<Utc>) -> Result<(), OrderError> {
        self.transition(OrderStatus::Canceled)?;
        self.canceled_at = Some(at);
        Ok(())
    }

    pub fn reject(&mut self) -> Result<(), OrderError> {
        self.transition(OrderStatus::Rejected)
    }

    fn transition(&mut self, to: OrderStatus) -> Result<(), OrderError> {
        if self.status.is_terminal() {
            return Err(OrderError::InvalidTransition(self.status, to));
        }
        self.status = to;
        Ok(())
    }

    pub fn remaining_qty(&self) -> Decimal {
        self.qty.abs() - self.filled_qty.abs()
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, OrderStatus::Active | OrderStatus::PartiallyFilled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(0, 0).unwrap()
    }

    #[test]
    fn market_order_without_price_is_allowed() {
        let order = Order::new("binance", "BTC-USDT", Uuid::new_v4(), OrderKind::Market, Decimal::ONE, None, false, now());
        assert!(order.is_ok());
    }

    #[test]
    fn limit_order_without_price_is_rejected() {
        let order = Order::new("binance", "BTC-USDT", Uuid::new_v4(), OrderKind::Limit, Decimal::ONE, None, false, now());
        assert_eq!(order.unwrap_err(), OrderError::MissingPrice);
    }

    #[test]
    fn zero_qty_is_rejected() {
        let order = Order::new("binance", "BTC-USDT", Uuid::new_v4(), OrderKind::Market, Decimal::ZERO, None, false, now());
        assert_eq!(order.unwrap_err(), OrderError::ZeroQuantity);
    }

    #[test]
    fn terminal_states_are_absorbing() {
        let mut order = Order::new("binance", "BTC-USDT", Uuid::new_v4(), OrderKind::Market, Decimal::ONE, None, false, now()).unwrap();
        order.activate().unwrap();
        order.fill(Decimal::ONE, now()).unwrap();
        assert_eq!(order.status, OrderStatus::Executed);
        assert!(order.cancel(now()).is_err());
    }

    #[test]
    fn partial_fill_then_full_fill_reaches_executed() {
        let mut order = Order::new("binance", "BTC-USDT", Uuid::new_v4(), OrderKind::Market, Decimal::from(2), None, false, now()).unwrap();
        order.activate().unwrap();
        order.fill(Decimal::ONE, now()).unwrap();
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        order.fill(Decimal::ONE, now()).unwrap();
        assert_eq!(order.status, OrderStatus::Executed);
    }
}
