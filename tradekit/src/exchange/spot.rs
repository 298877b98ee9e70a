//! Spot exchange bookkeeping (component C8): per-asset balances plus
//! per-symbol outstanding-sell-order sums used for admission checks.

use std::collections::HashMap;

use rust_decimal::Decimal;
use smol_str::SmolStr;

use crate::exchange::error::ExchangeError;
use crate::market::SymbolId;
use crate::order::{Order, OrderKind, Side};

#[derive(Clone, Default)]
struct Snapshot {
    assets: HashMap<SmolStr, Decimal>,
    stop_sell_sum: HashMap<SymbolId, Decimal>,
    limit_sell_sum: HashMap<SymbolId, Decimal>,
}

/// Per-exchange spot account: simple per-asset balances, with the two
/// per-symbol outstanding-sell sums the admission check needs.
pub struct SpotAccount {
    fee_rate: Decimal,
    assets: HashMap<SmolStr, Decimal>,
    starting_assets: HashMap<SmolStr, Decimal>,
    stop_sell_sum: HashMap<SymbolId, Decimal>,
    limit_sell_sum: HashMap<SymbolId, Decimal>,
}

impl SpotAccount {
    pub fn new(fee_rate: Decimal, assets: HashMap<SmolStr, Decimal>) -> Self {
        Self {
            fee_rate,
            starting_assets: assets.clone(),
            assets,
            stop_sell_sum: HashMap::new(),
            limit_sell_sum: HashMap::new(),
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            assets: self.assets.clone(),
            stop_sell_sum: self.stop_sell_sum.clone(),
            limit_sell_sum: self.limit_sell_sum.clone(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.assets = snapshot.assets;
        self.stop_sell_sum = snapshot.stop_sell_sum;
        self.limit_sell_sum = snapshot.limit_sell_sum;
    }

    pub fn wallet_balance(&self, asset: &str) -> Decimal {
        self.assets.get(asset).copied().unwrap_or_default()
    }

    pub fn started_balance(&self, asset: &str) -> Decimal {
        self.starting_assets.get(asset).copied().unwrap_or_default()
    }

    fn base_asset(symbol: &SymbolId) -> SmolStr {
        SmolStr::new(symbol.split('-').next().unwrap_or(symbol.as_str()))
    }

    fn quote_asset(symbol: &SymbolId) -> SmolStr {
        SmolStr::new(symbol.split('-').nth(1).unwrap_or(symbol.as_str()))
    }

    /// Runs `f`, rolling every mutated balance/sum back if it returns an
    /// error. All three bookkeeping entry points go through this so a
    /// rejected order never leaves partial state behind.
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

    pub fn on_order_submission(&mut self, order: &Order) -> Result<(), ExchangeError> {
        self.transactionally(|this| {
            let base = Self::base_asset(&order.symbol);
            let quote = Self::quote_asset(&order.symbol);

            match order.side {
                Side::Sell => {
                    let load = match order.kind {
                        OrderKind::Market => order.qty.abs() + this.limit_sell_sum.get(&order.symbol).copied().unwrap_or_default(),
                        OrderKind::Limit => {
                            let sum = this.limit_sell_sum.entry(order.symbol.clone()).or_default();
                            *sum += order.qty.abs();
                            *sum
                        }
                        OrderKind::Stop => {
                            let sum = this.stop_sell_sum.entry(order.symbol.clone()).or_default();
                            *sum += order.qty.abs();
                            *sum
                        }
                    };
                    let balance = this.assets.get(&base).copied().unwrap_or_default();
                    if load > balance {
                        return Err(ExchangeError::InsufficientBalance(base.to_string()));
                    }
                }
                Side::Buy => {
                    let price = order.price.unwrap_or_default();
                    let cost = order.qty.abs() * price;
                    let entry = this.assets.entry(quote).or_default();
                    if *entry - cost < Decimal::ZERO {
                        return Err(ExchangeError::InsufficientBalance("quote".into()));
                    }
                    *entry -= cost;
                }
            }
            Ok(())
        })
    }

    pub fn on_order_execution(&mut self, order: &Order) -> Result<(), ExchangeError> {
        self.transactionally(|this| {
            let base = Self::base_asset(&order.symbol);
            let quote = Self::quote_asset(&order.symbol);
            let price = order.price.unwrap_or_default();

            match order.side {
                Side::Sell => {
                    *this.assets.entry(quote).or_default() += order.qty.abs() * price * (Decimal::ONE - this.fee_rate);
                    *this.assets.entry(base).or_default() -= order.qty.abs();
                }
                Side::Buy => {
                    *this.assets.entry(base).or_default() += order.qty.abs() * (Decimal::ONE - this.fee_rate);
                }
            }
            Ok(())
        })
    }

    pub fn on_order_cancellation(&mut self, order: &Order) -> Result<(), ExchangeError> {
        self.transactionally(|this| {
            match order.side {
                Side::Buy => {
                    let quote = Self::quote_asset(&order.symbol);
                    let price = order.price.unwrap_or_default();
                    *this.assets.entry(quote).or_default() += order.qty.abs() * price;
                }
                Side::Sell => {
                    let sum = match order.kind {
                        OrderKind::Stop => this.stop_sell_sum.get_mut(&order.symbol),
                        OrderKind::Limit => this.limit_sell_sum.get_mut(&order.symbol),
                        OrderKind::Market => None,
                    };
                    if let Some(sum) = sum {
                        *sum -= order.qty.abs();
                    }
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(0, 0).unwrap()
    }

    fn account() -> SpotAccount {
        let mut assets = HashMap::new();
        assets.insert(SmolStr::new("BTC"), Decimal::ONE);
        assets.insert(SmolStr::new("USDT"), Decimal::from(10_000));
        SpotAccount::new(Decimal::new(1, 3), assets)
    }

    #[test]
    fn buy_submission_debits_quote_balance() {
        let mut acc = account();
        let order = Order::new("binance", "BTC-USDT", Uuid::new_v4(), OrderKind::Market, Decimal::ONE, Some(Decimal::from(100)), false, now()).unwrap();
        acc.on_order_submission(&order).unwrap();
        assert_eq!(acc.wallet_balance("USDT"), Decimal::from(9_900));
    }

    #[test]
    fn sell_submission_rejected_when_load_exceeds_base_balance() {
        let mut acc = account();
        let order = Order::new("binance", "BTC-USDT", Uuid::new_v4(), OrderKind::Market, -Decimal::from(2), Some(Decimal::from(100)), false, now()).unwrap();
        assert!(acc.on_order_submission(&order).is_err());
        // Rolled back: balance untouched.
        assert_eq!(acc.wallet_balance("BTC"), Decimal::ONE);
    }

    #[test]
    fn buy_execution_credits_base_net_of_fee() {
        let mut acc = account();
        let order = Order::new("binance", "BTC-USDT", Uuid::new_v4(), OrderKind::Market, Decimal::ONE, Some(Decimal::from(100)), false, now()).unwrap();
        acc.on_order_submission(&order).unwrap();
        acc.on_order_execution(&order).unwrap();
        assert_eq!(acc.wallet_balance("BTC"), Decimal::ONE + Decimal::ONE * (Decimal::ONE - Decimal::new(1, 3)));
    }

    #[test]
    fn buy_cancellation_refunds_full_reserved_quote() {
        let mut acc = account();
        let order = Order::new("binance", "BTC-USDT", Uuid::new_v4(), OrderKind::Limit, Decimal::ONE, Some(Decimal::from(100)), false, now()).unwrap();
        acc.on_order_submission(&order).unwrap();
        acc.on_order_cancellation(&order).unwrap();
        assert_eq!(acc.wallet_balance("USDT"), Decimal::from(10_000));
    }
}
