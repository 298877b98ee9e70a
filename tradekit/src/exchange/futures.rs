//! Futures exchange bookkeeping (component C8): wallet balance is the only
//! stored ledger entry; available margin is always derived from it plus
//! open positions and open orders.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::exchange::error::ExchangeError;
use crate::market::SymbolId;
use crate::order::{Order, Side};
use crate::position::{LeverageMode, Position};

#[derive(Clone, Default)]
struct Snapshot {
    wallet_balance: Decimal,
    open_orders: HashMap<SymbolId, (Vec<(Decimal, Decimal)>, Vec<(Decimal, Decimal)>)>,
}

/// Per-exchange futures account.
pub struct FuturesAccount {
    fee_rate: Decimal,
    wallet_balance: Decimal,
    starting_balance: Decimal,
    pub leverage: Decimal,
    pub leverage_mode: LeverageMode,
    /// Per-symbol `(buy_orders, sell_orders)` matrices of `(qty, price)`,
    /// used only for the margin calculation — reduce-only orders are never
    /// pushed here.
    open_orders: HashMap<SymbolId, (Vec<(Decimal, Decimal)>, Vec<(Decimal, Decimal)>)>,
}

impl FuturesAccount {
    pub fn new(fee_rate: Decimal, wallet_balance: Decimal, leverage: Decimal, leverage_mode: LeverageMode) -> Self {
        Self {
            fee_rate,
            wallet_balance,
            starting_balance: wallet_balance,
            leverage,
            leverage_mode,
            open_orders: HashMap::new(),
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot { wallet_balance: self.wallet_balance, open_orders: self.open_orders.clone() }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.wallet_balance = snapshot.wallet_balance;
        self.open_orders = snapshot.open_orders;
    }

    pub fn wallet_balance(&self) -> Decimal {
        self.wallet_balance
    }

    pub fn started_balance(&self) -> Decimal {
        self.starting_balance
    }

    /// `wallet_balance - sum(total_cost - pnl) over open positions -
    /// sum(max(buy_notional, sell_notional))/leverage over open orders`.
    pub fn available_margin(&self, positions: &[&Position]) -> Decimal {
        let positions_term: Decimal = positions.iter().map(|p| p.total_cost() - p.pnl()).sum();

        let orders_term: Decimal = self
            .open_orders
            .values()
            .map(|(buys, sells)| {
                let buy_notional: Decimal = buys.iter().map(|(q, p)| q.abs() * p).sum();
                let sell_notional: Decimal = sells.iter().map(|(q, p)| q.abs() * p).sum();
                buy_notional.max(sell_notional) / self.leverage
            })
            .sum();

        self.wallet_balance - positions_term - orders_term
    }

    fn transactionally<F>(&mut self, f: F) -> Result<(), ExchangeError>
    where
        F: FnOnce(&mut Self) -> Result<(), ExchangeError>,
    {
        let snapshot = self.snapshot();
        match f(self) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.restore(snapshot);
                Err(err)
            }
        }
    }

    pub fn on_order_submission(&mut self, order: &Order, positions: &[&Position]) -> Result<(), ExchangeError> {
        self.transactionally(|this| {
            let price = order.price.unwrap_or_default();
            let effective_size = (order.qty * price).abs() / this.leverage;
            if effective_size > this.available_margin(positions) {
                return Err(ExchangeError::InsufficientMargin);
            }

            if !order.reduce_only {
                let entry = this.open_orders.entry(order.symbol.clone()).or_default();
                match order.side {
                    Side::Buy => entry.0.push((order.qty, price)),
                    Side::Sell => entry.1.push((order.qty, price)),
                }
            }
            Ok(())
        })
    }

    pub fn on_order_execution(&mut self, order: &Order, realized_pnl: Option<Decimal>) -> Result<(), ExchangeError> {
        self.transactionally(|this| {
            let price = order.price.unwrap_or_default();
            let fee = order.qty.abs() * price * this.fee_rate;
            this.wallet_balance -= fee;
            if let Some(pnl) = realized_pnl {
                this.wallet_balance += pnl;
            }

            if !order.reduce_only {
                if let Some(entry) = this.open_orders.get_mut(&order.symbol) {
                    let side_vec = match order.side {
                        Side::Buy => &mut entry.0,
                        Side::Sell => &mut entry.1,
                    };
                    if let Some(pos) = side_vec.iter().position(|(q, p)| *q == order.qty && *p == price) {
                        side_vec.remove(pos);
                    }
                }
            }
            Ok(())
        })
    }

    pub fn on_order_cancellation(&mut self, order: &Order) -> Result<(), ExchangeError> {
        self.transactionally(|this| {
            let price = order.price.unwrap_or_default();
            if let Some(entry) = this.open_orders.get_mut(&order.symbol) {
                let side_vec = match order.side {
                    Side::Buy => &mut entry.0,
                    Side::Sell => &mut entry.1,
                };
                if let Some(pos) = side_vec.iter().position(|(q, p)| *q == order.qty && *p == price) {
                    side_vec.remove(pos);
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderKind;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(0, 0).unwrap()
    }

    fn account() -> FuturesAccount {
        FuturesAccount::new(Decimal::new(4, 4), Decimal::from(1_000), Decimal::from(10), LeverageMode::Isolated)
    }

    #[test]
    fn available_margin_with_no_positions_or_orders_is_wallet_balance() {
        let acc = account();
        assert_eq!(acc.available_margin(&[]), Decimal::from(1_000));
    }

    #[test]
    fn submission_rejected_when_effective_size_exceeds_margin() {
        let mut acc = account();
        let order = Order::new("binance", "BTC-USDT", Uuid::new_v4(), OrderKind::Market, Decimal::from(200), Some(Decimal::from(1_000)), false, now()).unwrap();
        // effective_size = 200*1000/10 = 20000 > 1000 available.
        assert_eq!(acc.on_order_submission(&order, &[]), Err(ExchangeError::InsufficientMargin));
    }

    #[test]
    fn non_reduce_only_submission_tracked_in_open_order_matrix() {
        let mut acc = account();
        let order = Order::new("binance", "BTC-USDT", Uuid::new_v4(), OrderKind::Limit, Decimal::ONE, Some(Decimal::from(100)), false, now()).unwrap();
        acc.on_order_submission(&order, &[]).unwrap();
        assert_eq!(acc.open_orders.get(&order.symbol).unwrap().0.len(), 1);
    }

    #[test]
    fn execution_removes_matching_row_from_matrix() {
        let mut acc = account();
        let order = Order::new("binance", "BTC-USDT", Uuid::new_v4(), OrderKind::Limit, Decimal::ONE, Some(Decimal::from(100)), false, now()).unwrap();
        acc.on_order_submission(&order, &[]).unwrap();
        acc.on_order_execution(&order, None).unwrap();
        assert_eq!(acc.open_orders.get(&order.symbol).unwrap().0.len(), 0);
    }
}
