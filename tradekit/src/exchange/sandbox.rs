//! Sandbox exchange (component C8): a minimal paper-mode adapter over
//! [`SpotAccount`]/[`FuturesAccount`] that creates [`Order`] records
//! instead of talking to a real venue.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::exchange::error::ExchangeError;
use crate::exchange::futures::FuturesAccount;
use crate::exchange::spot::SpotAccount;
use crate::market::Market;
use crate::order::{Order, OrderKind, OrderRepository};
use crate::position::Position;

pub enum Account {
    Spot(SpotAccount),
    Futures(FuturesAccount),
}

pub struct Sandbox {
    pub account: Account,
}

impl Sandbox {
    pub fn new(account: Account) -> Self {
        Self { account }
    }

    pub fn wallet_balance(&self, asset: &str) -> Decimal {
        match &self.account {
            Account::Spot(a) => a.wallet_balance(asset),
            Account::Futures(a) => a.wallet_balance(),
        }
    }

    pub fn started_balance(&self, asset: &str) -> Decimal {
        match &self.account {
            Account::Spot(a) => a.started_balance(asset),
            Account::Futures(a) => a.started_balance(),
        }
    }

    pub fn available_margin(&self, positions: &[&Position]) -> Option<Decimal> {
        match &self.account {
            Account::Spot(_) => None,
            Account::Futures(a) => Some(a.available_margin(positions)),
        }
    }

    fn submit(
        &mut self,
        repo: &mut OrderRepository,
        market: &Market,
        session_id: Uuid,
        kind: OrderKind,
        qty: Decimal,
        price: Option<Decimal>,
        reduce_only: bool,
        now: DateTime<Utc>,
        positions: &[&Position],
    ) -> Result<Uuid, ExchangeError> {
        let mut order = Order::new(market.exchange.clone(), market.symbol.clone(), session_id, kind, qty, price, reduce_only, now)
            .map_err(|_| ExchangeError::OrderNotFound(String::new()))?;

        match &mut self.account {
            Account::Spot(a) => a.on_order_submission(&order)?,
            Account::Futures(a) => a.on_order_submission(&order, positions)?,
        }

        order.activate().ok();
        let id = order.id;
        let enqueue_for_execution = kind == OrderKind::Market;
        repo.add(market, order, enqueue_for_execution);
        Ok(id)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn market(
        &mut self,
        repo: &mut OrderRepository,
        market: &Market,
        session_id: Uuid,
        qty: Decimal,
        current_price: Decimal,
        reduce_only: bool,
        now: DateTime<Utc>,
        positions: &[&Position],
    ) -> Result<Uuid, ExchangeError> {
        self.submit(repo, market, session_id, OrderKind::Market, qty, Some(current_price), reduce_only, now, positions)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn limit(
        &mut self,
        repo: &mut OrderRepository,
        market: &Market,
        session_id: Uuid,
        qty: Decimal,
        price: Decimal,
        reduce_only: bool,
        now: DateTime<Utc>,
        positions: &[&Position],
    ) -> Result<Uuid, ExchangeError> {
        self.submit(repo, market, session_id, OrderKind::Limit, qty, Some(price), reduce_only, now, positions)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn stop(
        &mut self,
        repo: &mut OrderRepository,
        market: &Market,
        session_id: Uuid,
        qty: Decimal,
        price: Decimal,
        reduce_only: bool,
        now: DateTime<Utc>,
        positions: &[&Position],
    ) -> Result<Uuid, ExchangeError> {
        self.submit(repo, market, session_id, OrderKind::Stop, qty, Some(price), reduce_only, now, positions)
    }

    pub fn cancel(&mut self, repo: &mut OrderRepository, market: &Market, id: Uuid, now: DateTime<Utc>) -> Result<(), ExchangeError> {
        let order = repo
            .get_mut(market)
            .and_then(|orders| orders.iter_mut().find(|o| o.id == id))
            .ok_or_else(|| ExchangeError::OrderNotFound(id.to_string()))?;

        match &mut self.account {
            Account::Spot(a) => a.on_order_cancellation(order)?,
            Account::Futures(a) => a.on_order_cancellation(order)?,
        }
        order.cancel(now).ok();
        repo.remove(market, id);
        Ok(())
    }

    /// Cancels every non-terminal order for `market`, then wipes the
    /// per-symbol store (skipped under unit test so assertions can still
    /// inspect the orders afterwards).
    pub fn cancel_all(&mut self, repo: &mut OrderRepository, market: &Market, now: DateTime<Utc>, is_unit_test: bool) -> Result<(), ExchangeError> {
        let ids: Vec<Uuid> = repo.active(market).into_iter().map(|o| o.id).collect();
        for id in ids {
            self.cancel(repo, market, id, now)?;
        }
        if !is_unit_test {
            repo.reset_trade(market);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sandbox() -> Sandbox {
        let mut assets = HashMap::new();
        assets.insert(smol_str::SmolStr::new("USDT"), Decimal::from(10_000));
        assets.insert(smol_str::SmolStr::new("BTC"), Decimal::from(10));
        Sandbox::new(Account::Spot(SpotAccount::new(Decimal::ZERO, assets)))
    }

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(0, 0).unwrap()
    }

    #[test]
    fn market_order_is_enqueued_for_execution() {
        let mut sandbox = sandbox();
        let mut repo = OrderRepository::default();
        let market = Market::new("binance", "BTC-USDT");
        let session = Uuid::new_v4();
        sandbox
            .market(&mut repo, &market, session, Decimal::ONE, Decimal::from(100), false, now(), &[])
            .unwrap();
        assert_eq!(repo.drain_pending_market_orders(&market).len(), 1);
    }

    #[test]
    fn cancel_all_clears_active_orders() {
        let mut sandbox = sandbox();
        let mut repo = OrderRepository::default();
        let market = Market::new("binance", "BTC-USDT");
        let session = Uuid::new_v4();
        sandbox.limit(&mut repo, &market, session, Decimal::ONE, Decimal::from(100), false, now(), &[]).unwrap();
        sandbox.cancel_all(&mut repo, &market, now(), true).unwrap();
        assert_eq!(repo.count_active(&market), 0);
    }
}
