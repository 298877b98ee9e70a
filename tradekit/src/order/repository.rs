//! Order repository (component C6): per-`(exchange, symbol)` `all` and
//! `active` lists, plus a market-order execution queue for the sandbox.

use std::collections::HashMap;

use uuid::Uuid;

use crate::market::Market;
use crate::order::error::OrderError;
use crate::order::model::{Order, OrderStatus, Side};
use crate::position::PositionType;

#[derive(Default)]
struct MarketOrders {
    all: Vec<Order>,
    active: Vec<Uuid>,
    to_execute: Vec<Uuid>,
}

/// Owns every [`Order`] in the session, bucketed by [`Market`].
#[derive(Default)]
pub struct OrderRepository {
    by_market: HashMap<Market, MarketOrders>,
}

impl OrderRepository {
    fn bucket(&mut self, market: &Market) -> &mut MarketOrders {
        self.by_market.entry(market.clone()).or_default()
    }

    /// Insert a freshly-created order into both `all` and `active`. Market
    /// orders submitted by the sandbox are also pushed onto the
    /// `to_execute` queue.
    pub fn add(&mut self, market: &Market, order: Order, enqueue_for_execution: bool) {
        let id = order.id;
        let bucket = self.bucket(market);
        bucket.all.push(order);
        bucket.active.push(id);
        if enqueue_for_execution {
            bucket.to_execute.push(id);
        }
    }

    pub fn remove(&mut self, market: &Market, id: Uuid) {
        if let Some(bucket) = self.by_market.get_mut(market) {
            bucket.active.retain(|&oid| oid != id);
            bucket.to_execute.retain(|&oid| oid != id);
        }
    }

    pub fn get(&self, market: &Market) -> &[Order] {
        self.by_market.get(market).map(|b| b.all.as_slice()).unwrap_or(&[])
    }

    pub fn get_mut(&mut self, market: &Market) -> Option<&mut [Order]> {
        self.by_market.get_mut(market).map(|b| b.all.as_mut_slice())
    }

    pub fn active(&self, market: &Market) -> Vec<&Order> {
        match self.by_market.get(market) {
            None => Vec::new(),
            Some(bucket) => bucket
                .active
                .iter()
                .filter_map(|id| bucket.all.iter().find(|o| o.id == *id))
                .collect(),
        }
    }

    pub fn all_for_exchange(&self, exchange: &str) -> Vec<&Order> {
        self.by_market
            .iter()
            .filter(|(m, _)| m.exchange == exchange)
            .flat_map(|(_, b)| b.all.iter())
            .collect()
    }

    pub fn count_active_all(&self) -> usize {
        self.by_market.values().map(|b| b.active.len()).sum()
    }

    pub fn count_active(&self, market: &Market) -> usize {
        self.by_market.get(market).map(|b| b.active.len()).unwrap_or(0)
    }

    /// Look up by id. Falls back to a substring match against the client id
    /// on the `id` field's string form, scanning newest-first, when
    /// `use_exchange_id` is false or the exact `exchange_id` match misses.
    pub fn by_id(&self, market: &Market, id: &str, use_exchange_id: bool) -> Result<&Order, OrderError> {
        let bucket = self
            .by_market
            .get(market)
            .ok_or_else(|| OrderError::NotFound(id.to_string(), market.exchange.to_string(), market.symbol.to_string()))?;

        if use_exchange_id {
            if let Some(order) = bucket.all.iter().find(|o| o.exchange_id.as_deref() == Some(id)) {
                return Ok(order);
            }
        }
        if let Some(order) = bucket.all.iter().find(|o| o.id.to_string() == id) {
            return Ok(order);
        }
        bucket
            .all
            .iter()
            .rev()
            .find(|o| o.id.to_string().contains(id))
            .ok_or_else(|| OrderError::NotFound(id.to_string(), market.exchange.to_string(), market.symbol.to_string()))
    }

    /// Active orders whose side matches the open position's type (would
    /// add to the position).
    pub fn entry_orders(&self, market: &Market, position_type: PositionType) -> Vec<&Order> {
        let matching_side = match position_type {
            PositionType::Long => Side::Buy,
            PositionType::Short => Side::Sell,
            PositionType::Close => return Vec::new(),
        };
        self.active(market).into_iter().filter(|o| o.side == matching_side).collect()
    }

    /// Active orders whose side opposes the open position's type (would
    /// reduce or flip it).
    pub fn exit_orders(&self, market: &Market, position_type: PositionType) -> Vec<&Order> {
        let opposing_side = match position_type {
            PositionType::Long => Side::Sell,
            PositionType::Short => Side::Buy,
            PositionType::Close => return Vec::new(),
        };
        self.active(market).into_iter().filter(|o| o.side == opposing_side).collect()
    }

    /// Drain and return the ids of queued market orders ready for immediate
    /// execution on this tick.
    pub fn drain_pending_market_orders(&mut self, market: &Market) -> Vec<Uuid> {
        self.by_market.get_mut(market).map(|b| std::mem::take(&mut b.to_execute)).unwrap_or_default()
    }

    pub fn set_status(&mut self, market: &Market, id: Uuid, status: OrderStatus) {
        if let Some(bucket) = self.by_market.get_mut(market) {
            if let Some(order) = bucket.all.iter_mut().find(|o| o.id == id) {
                order.status = status;
            }
            if status.is_terminal() {
                bucket.active.retain(|&oid| oid != id);
            }
        }
    }

    /// Wipe this market's order store after a closed trade, preserving
    /// nothing — the closed-trade log already holds copies of the relevant
    /// orders.
    pub fn reset_trade(&mut self, market: &Market) {
        self.by_market.remove(market);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;

    use super::*;
    use crate::order::model::OrderKind;

    fn market() -> Market {
        Market::new("binance", "BTC-USDT")
    }

    fn order(qty: Decimal) -> Order {
        Order::new(
            "binance",
            "BTC-USDT",
            Uuid::new_v4(),
            OrderKind::Market,
            qty,
            None,
            false,
            DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn add_inserts_into_all_and_active() {
        let mut repo = OrderRepository::default();
        let market = market();
        repo.add(&market, order(Decimal::ONE), false);
        assert_eq!(repo.get(&market).len(), 1);
        assert_eq!(repo.active(&market).len(), 1);
    }

    #[test]
    fn setting_terminal_status_removes_from_active_only() {
        let mut repo = OrderRepository::default();
        let market = market();
        let o = order(Decimal::ONE);
        let id = o.id;
        repo.add(&market, o, false);
        repo.set_status(&market, id, OrderStatus::Executed);
        assert_eq!(repo.get(&market).len(), 1);
        assert_eq!(repo.active(&market).len(), 0);
    }

    #[test]
    fn by_id_falls_back_to_substring_match() {
        let mut repo = OrderRepository::default();
        let market = market();
        let o = order(Decimal::ONE);
        let id_str = o.id.to_string();
        repo.add(&market, o, false);
        let prefix = &id_str[..8];
        assert!(repo.by_id(&market, prefix, false).is_ok());
    }

    #[test]
    fn entry_and_exit_orders_split_by_position_type() {
        let mut repo = OrderRepository::default();
        let market = market();
        repo.add(&market, order(Decimal::ONE), false);
        repo.add(&market, order(-Decimal::ONE), false);

        assert_eq!(repo.entry_orders(&market, PositionType::Long).len(), 1);
        assert_eq!(repo.exit_orders(&market, PositionType::Long).len(), 1);
    }
}
