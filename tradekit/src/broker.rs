//! Broker façade (component C9): the surface strategies call to place
//! orders. Stateless per call — every method takes the [`Position`] it
//! acts on explicitly rather than looking it up itself.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::exchange::Sandbox;
use crate::market::Market;
use crate::order::{OrderError, OrderRepository};
use crate::position::{Position, PositionType};

/// Within this relative distance of the current price, a reduce is routed
/// as a market order rather than a resting limit/stop.
const MARKET_PROXIMITY: Decimal = Decimal::from_parts(1, 0, 0, false, 4); // 0.0001 == 0.01%

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum StartProfitSide {
    Buy,
    Sell,
}

pub struct Broker;

impl Broker {
    #[allow(clippy::too_many_arguments)]
    pub fn sell_at_market(
        sandbox: &mut Sandbox,
        repo: &mut OrderRepository,
        market: &Market,
        session_id: Uuid,
        qty: Decimal,
        position: &Position,
        now: DateTime<Utc>,
        positions: &[&Position],
    ) -> Result<Uuid, OrderError> {
        let current_price = position.current_price.unwrap_or_default();
        sandbox
            .market(repo, market, session_id, -qty.abs(), current_price, false, now, positions)
            .map_err(|_| OrderError::NotAllowed("exchange rejected market sell"))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn buy_at_market(
        sandbox: &mut Sandbox,
        repo: &mut OrderRepository,
        market: &Market,
        session_id: Uuid,
        qty: Decimal,
        position: &Position,
        now: DateTime<Utc>,
        positions: &[&Position],
    ) -> Result<Uuid, OrderError> {
        let current_price = position.current_price.unwrap_or_default();
        sandbox
            .market(repo, market, session_id, qty.abs(), current_price, false, now, positions)
            .map_err(|_| OrderError::NotAllowed("exchange rejected market buy"))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn sell_at(
        sandbox: &mut Sandbox,
        repo: &mut OrderRepository,
        market: &Market,
        session_id: Uuid,
        qty: Decimal,
        price: Decimal,
        now: DateTime<Utc>,
        positions: &[&Position],
    ) -> Result<Uuid, OrderError> {
        if price.is_sign_negative() {
            return Err(OrderError::NegativePrice);
        }
        sandbox
            .limit(repo, market, session_id, -qty.abs(), price, false, now, positions)
            .map_err(|_| OrderError::NotAllowed("exchange rejected limit sell"))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn buy_at(
        sandbox: &mut Sandbox,
        repo: &mut OrderRepository,
        market: &Market,
        session_id: Uuid,
        qty: Decimal,
        price: Decimal,
        now: DateTime<Utc>,
        positions: &[&Position],
    ) -> Result<Uuid, OrderError> {
        if price.is_sign_negative() {
            return Err(OrderError::NegativePrice);
        }
        sandbox
            .limit(repo, market, session_id, qty.abs(), price, false, now, positions)
            .map_err(|_| OrderError::NotAllowed("exchange rejected limit buy"))
    }

    /// Classifies a reduce by distance of `price` from `current_price`:
    /// within [`MARKET_PROXIMITY`] routes MARKET reduce-only; on the
    /// profit side of `position`'s type routes LIMIT reduce-only; on the
    /// stop side routes STOP reduce-only; anywhere else is not allowed.
    #[allow(clippy::too_many_arguments)]
    pub fn reduce_position_at(
        sandbox: &mut Sandbox,
        repo: &mut OrderRepository,
        market: &Market,
        session_id: Uuid,
        qty: Decimal,
        price: Decimal,
        current_price: Decimal,
        position: &Position,
        now: DateTime<Utc>,
        positions: &[&Position],
    ) -> Result<Uuid, OrderError> {
        let qty_signed = -qty.abs() * position.qty.signum();
        let distance = if current_price.is_zero() {
            Decimal::ZERO
        } else {
            ((price - current_price) / current_price).abs()
        };

        if distance <= MARKET_PROXIMITY {
            return sandbox
                .market(repo, market, session_id, qty_signed, current_price, true, now, positions)
                .map_err(|_| OrderError::NotAllowed("exchange rejected reduce-only market order"));
        }

        let is_profit_side = match position.position_type() {
            PositionType::Long => price > current_price,
            PositionType::Short => price < current_price,
            PositionType::Close => return Err(OrderError::NotAllowed("position is not open")),
        };

        if is_profit_side {
            sandbox
                .limit(repo, market, session_id, qty_signed, price, true, now, positions)
                .map_err(|_| OrderError::NotAllowed("exchange rejected reduce-only limit order"))
        } else {
            sandbox
                .stop(repo, market, session_id, qty_signed, price, true, now, positions)
                .map_err(|_| OrderError::NotAllowed("exchange rejected reduce-only stop order"))
        }
    }

    /// Places a take-profit-style non-reduce-only STOP order: requires
    /// `price` above `current_price` for `Buy`, below for `Sell`.
    #[allow(clippy::too_many_arguments)]
    pub fn start_profit_at(
        sandbox: &mut Sandbox,
        repo: &mut OrderRepository,
        market: &Market,
        session_id: Uuid,
        side: StartProfitSide,
        qty: Decimal,
        price: Decimal,
        current_price: Decimal,
        now: DateTime<Utc>,
        positions: &[&Position],
    ) -> Result<Uuid, OrderError> {
        let valid = match side {
            StartProfitSide::Buy => price > current_price,
            StartProfitSide::Sell => price < current_price,
        };
        if !valid {
            return Err(OrderError::NotAllowed("start_profit_at price is on the wrong side of current price"));
        }

        let signed_qty = match side {
            StartProfitSide::Buy => qty.abs(),
            StartProfitSide::Sell => -qty.abs(),
        };
        sandbox
            .stop(repo, market, session_id, signed_qty, price, false, now, positions)
            .map_err(|_| OrderError::NotAllowed("exchange rejected start_profit stop order"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{Account, SpotAccount};
    use crate::position::AccountKind;
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

    fn long_position() -> Position {
        let mut p = Position::flat("binance", "BTC-USDT", AccountKind::Spot, Decimal::ZERO, Decimal::new(1, 3), Decimal::ZERO);
        p.open(Decimal::ONE, Decimal::from(100), now()).unwrap();
        p.current_price = Some(Decimal::from(100));
        p
    }

    #[test]
    fn sell_at_rejects_negative_price() {
        let mut sandbox = sandbox();
        let mut repo = OrderRepository::default();
        let market = Market::new("binance", "BTC-USDT");
        let result = Broker::sell_at(&mut sandbox, &mut repo, &market, Uuid::new_v4(), Decimal::ONE, -Decimal::ONE, now(), &[]);
        assert_eq!(result.unwrap_err(), OrderError::NegativePrice);
    }

    #[test]
    fn reduce_position_near_current_price_routes_as_market() {
        let mut sandbox = sandbox();
        let mut repo = OrderRepository::default();
        let market = Market::new("binance", "BTC-USDT");
        let position = long_position();
        Broker::reduce_position_at(&mut sandbox, &mut repo, &market, Uuid::new_v4(), Decimal::new(5, 1), Decimal::from(100), Decimal::from(100), &position, now(), &[]).unwrap();
        assert_eq!(repo.get(&market).len(), 1);
    }

    #[test]
    fn reduce_position_on_profit_side_routes_as_limit() {
        let mut sandbox = sandbox();
        let mut repo = OrderRepository::default();
        let market = Market::new("binance", "BTC-USDT");
        let position = long_position();
        Broker::reduce_position_at(&mut sandbox, &mut repo, &market, Uuid::new_v4(), Decimal::new(5, 1), Decimal::from(110), Decimal::from(100), &position, now(), &[]).unwrap();
        let orders = repo.get(&market);
        assert_eq!(orders[0].kind, crate::order::OrderKind::Limit);
    }

    #[test]
    fn start_profit_at_rejects_wrong_side_price() {
        let mut sandbox = sandbox();
        let mut repo = OrderRepository::default();
        let market = Market::new("binance", "BTC-USDT");
        let result = Broker::start_profit_at(&mut sandbox, &mut repo, &market, Uuid::new_v4(), StartProfitSide::Buy, Decimal::ONE, Decimal::from(90), Decimal::from(100), now(), &[]);
        assert!(result.is_err());
    }
}
