//! Simulation driver (component C10): drives order matching against the
//! candle feed in backtest/paper mode.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::data::Candle;
use crate::exchange::Sandbox;
use crate::market::Market;
use crate::order::{Order, OrderRepository, OrderStatus};
use crate::position::{Position, PositionTransition};

/// One filled order, surfaced so the caller can finalize a closed trade
/// when the resulting transition is [`PositionTransition::Close`].
pub struct FillOutcome {
    pub order_id: Uuid,
    pub fill_price: rust_decimal::Decimal,
    pub transition: PositionTransition,
}

/// Drains pending market orders for `market`, then matches every active
/// order against the interval bounded by `previous_close` and
/// `new_candle.close`. LIMIT/STOP fill at their own price; MARKET fills at
/// the candle's close. No partial fills — that only happens in live mode
/// via stream updates.
pub fn simulate_tick(
    sandbox: &mut Sandbox,
    repo: &mut OrderRepository,
    market: &Market,
    position: &mut Position,
    previous_close: rust_decimal::Decimal,
    new_candle: &Candle,
    now: DateTime<Utc>,
) -> Result<Vec<FillOutcome>, crate::exchange::ExchangeError> {
    let new_close = rust_decimal::Decimal::try_from(new_candle.close).unwrap_or_default();
    let (low, high) = if previous_close <= new_close { (previous_close, new_close) } else { (new_close, previous_close) };

    let mut outcomes = Vec::new();

    for id in repo.drain_pending_market_orders(market) {
        let Some(orders) = repo.get_mut(market) else { continue };
        let Some(order) = orders.iter_mut().find(|o| o.id == id) else { continue };
        if order.status.is_terminal() {
            continue;
        }
        let fill_price = fill(sandbox, order, position, new_close)?;
        let transition = position.on_executed_order(order, now).map_err(|_| crate::exchange::ExchangeError::OrderNotFound(id.to_string()))?;
        outcomes.push(FillOutcome { order_id: id, fill_price, transition });
    }

    let active_ids: Vec<Uuid> = repo.active(market).into_iter().map(|o| o.id).collect();

    for id in active_ids {
        let Some(orders) = repo.get_mut(market) else { continue };
        let Some(order) = orders.iter_mut().find(|o| o.id == id) else { continue };
        if order.status.is_terminal() {
            continue;
        }
        let Some(order_price) = order.price else { continue };

        if order_price >= low && order_price <= high {
            let fill_price = fill(sandbox, order, position, new_close)?;
            let transition = position.on_executed_order(order, now).map_err(|_| crate::exchange::ExchangeError::OrderNotFound(id.to_string()))?;
            outcomes.push(FillOutcome { order_id: id, fill_price, transition });
        }
    }

    Ok(outcomes)
}

/// Runs the account-side half of an execution: charges the fee, credits any
/// realized PnL for futures (previewed from the not-yet-mutated `position`),
/// and marks `order` Executed.
fn fill(sandbox: &mut Sandbox, order: &mut Order, position: &Position, market_close: rust_decimal::Decimal) -> Result<rust_decimal::Decimal, crate::exchange::ExchangeError> {
    let fill_price = match order.kind {
        crate::order::OrderKind::Market => market_close,
        _ => order.price.unwrap_or(market_close),
    };

    match &mut sandbox.account {
        crate::exchange::Account::Spot(a) => a.on_order_execution(order)?,
        crate::exchange::Account::Futures(a) => {
            let pnl = position.realized_pnl_at(order.side, order.qty, fill_price);
            a.on_order_execution(order, (!pnl.is_zero()).then_some(pnl))?;
        }
    }

    let remaining = order.remaining_qty();
    let created_at = order.created_at;
    order.fill(remaining, created_at).ok();
    order.status = OrderStatus::Executed;
    Ok(fill_price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Candle;
    use crate::exchange::{Account, SpotAccount};
    use crate::order::OrderKind;
    use crate::position::AccountKind;
    use rust_decimal::Decimal;
    use std::collections::HashMap;

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
    fn limit_order_within_candle_range_fills() {
        let mut sandbox = sandbox();
        let mut repo = OrderRepository::default();
        let market = Market::new("binance", "BTC-USDT");
        let mut position = Position::flat("binance", "BTC-USDT", AccountKind::Spot, Decimal::ZERO, Decimal::new(1, 3), Decimal::ZERO);

        let order = Order::new("binance", "BTC-USDT", Uuid::new_v4(), OrderKind::Limit, Decimal::ONE, Some(Decimal::from(100)), false, now()).unwrap();
        repo.add(&market, order, false);

        let candle = Candle::new(60_000, 95.0, 105.0, 106.0, 94.0, 10.0).unwrap();
        let outcomes = simulate_tick(&mut sandbox, &mut repo, &market, &mut position, Decimal::from(90), &candle, now()).unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].transition, PositionTransition::Open);
    }

    #[test]
    fn order_outside_candle_range_does_not_fill() {
        let mut sandbox = sandbox();
        let mut repo = OrderRepository::default();
        let market = Market::new("binance", "BTC-USDT");
        let mut position = Position::flat("binance", "BTC-USDT", AccountKind::Spot, Decimal::ZERO, Decimal::new(1, 3), Decimal::ZERO);

        let order = Order::new("binance", "BTC-USDT", Uuid::new_v4(), OrderKind::Limit, Decimal::ONE, Some(Decimal::from(500)), false, now()).unwrap();
        repo.add(&market, order, false);

        let candle = Candle::new(60_000, 95.0, 105.0, 106.0, 94.0, 10.0).unwrap();
        let outcomes = simulate_tick(&mut sandbox, &mut repo, &market, &mut position, Decimal::from(90), &candle, now()).unwrap();
        assert!(outcomes.is_empty());
    }

    #[test]
    fn market_order_drives_the_position_transition() {
        let mut sandbox = sandbox();
        let mut repo = OrderRepository::default();
        let market = Market::new("binance", "BTC-USDT");
        let mut position = Position::flat("binance", "BTC-USDT", AccountKind::Spot, Decimal::ZERO, Decimal::new(1, 3), Decimal::ZERO);

        let order = Order::new("binance", "BTC-USDT", Uuid::new_v4(), OrderKind::Market, Decimal::ONE, Some(Decimal::from(100)), false, now()).unwrap();
        repo.add(&market, order, true);

        let candle = Candle::new(60_000, 95.0, 105.0, 106.0, 94.0, 10.0).unwrap();
        let outcomes = simulate_tick(&mut sandbox, &mut repo, &market, &mut position, Decimal::from(90), &candle, now()).unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].transition, PositionTransition::Open);
        assert!(position.is_open());
    }

    #[test]
    fn futures_close_credits_realized_pnl_to_wallet_balance() {
        use crate::exchange::FuturesAccount;
        use crate::position::LeverageMode;

        let mut sandbox = Sandbox::new(Account::Futures(FuturesAccount::new(
            Decimal::new(4, 4),
            Decimal::from(1_000),
            Decimal::from(10),
            LeverageMode::Isolated,
        )));
        let mut repo = OrderRepository::default();
        let market = Market::new("binance", "BTC-USDT");
        let mut position = Position::flat("binance", "BTC-USDT", AccountKind::Futures, Decimal::ZERO, Decimal::new(1, 3), Decimal::ZERO);
        position.leverage = Decimal::from(10);
        position.leverage_mode = Some(LeverageMode::Isolated);

        let open_order = Order::new("binance", "BTC-USDT", Uuid::new_v4(), OrderKind::Market, Decimal::ONE, Some(Decimal::from(100)), false, now()).unwrap();
        repo.add(&market, open_order, true);
        let open_candle = Candle::new(60_000, 95.0, 100.0, 101.0, 94.0, 10.0).unwrap();
        simulate_tick(&mut sandbox, &mut repo, &market, &mut position, Decimal::from(90), &open_candle, now()).unwrap();
        assert_eq!(sandbox.wallet_balance(""), Decimal::new(99_996, 2));

        let close_order = Order::new("binance", "BTC-USDT", Uuid::new_v4(), OrderKind::Market, -Decimal::ONE, Some(Decimal::from(110)), true, now()).unwrap();
        repo.add(&market, close_order, true);
        let close_candle = Candle::new(120_000, 100.0, 110.0, 111.0, 99.0, 10.0).unwrap();
        simulate_tick(&mut sandbox, &mut repo, &market, &mut position, Decimal::from(100), &close_candle, now()).unwrap();

        // 1000 - 0.04 (open fee) - 0.044 (close fee) + 10 (realized pnl) = 1009.916
        assert_eq!(sandbox.wallet_balance(""), Decimal::new(1_009_916, 3));
    }
}
