//! End-to-end scenarios driven entirely through the public API, combining
//! several components per test the way a real backtest/paper run would:
//! order submission, candle ingestion, fill matching, and position/account
//! bookkeeping all in one pass.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use tradekit::data::Candle;
use tradekit::engine::Engine;
use tradekit::event::{LogToggles, NullSink};
use tradekit::exchange::{Account, FuturesAccount, Sandbox, SpotAccount};
use tradekit::market::Market;
use tradekit::order::{Order, OrderKind, OrderRepository};
use tradekit::position::{AccountKind, LeverageMode, Position, PositionTransition};
use tradekit::session::RunMode;
use tradekit::simulation::simulate_tick;
use tradekit::timeframe::Timeframe;

fn now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(0, 0).unwrap()
}

#[test]
fn spot_buy_then_sell_realizes_fee_adjusted_profit() {
    let mut assets = HashMap::new();
    assets.insert(smol_str::SmolStr::new("USDT"), Decimal::from(10_000));
    assets.insert(smol_str::SmolStr::new("BTC"), Decimal::ZERO);
    let mut sandbox = Sandbox::new(Account::Spot(SpotAccount::new(Decimal::new(1, 3), assets)));
    let mut repo = OrderRepository::default();
    let market = Market::new("binance", "BTC-USDT");
    let mut position = Position::flat("binance", "BTC-USDT", AccountKind::Spot, Decimal::ZERO, Decimal::new(1, 4), Decimal::ZERO);

    sandbox.market(&mut repo, &market, Uuid::new_v4(), Decimal::new(1, 1), Decimal::from(100), false, now(), &[]).unwrap();
    assert_eq!(sandbox.wallet_balance("USDT"), Decimal::from(9_990));

    let buy_candle = Candle::new(60_000, 95.0, 100.0, 101.0, 94.0, 10.0).unwrap();
    let outcomes = simulate_tick(&mut sandbox, &mut repo, &market, &mut position, Decimal::from(90), &buy_candle, now()).unwrap();
    assert_eq!(outcomes[0].transition, PositionTransition::Open);
    assert_eq!(sandbox.wallet_balance("BTC"), Decimal::new(999, 4));
    assert_eq!(sandbox.wallet_balance("USDT"), Decimal::from(9_990));

    sandbox.market(&mut repo, &market, Uuid::new_v4(), -Decimal::new(999, 4), Decimal::from(200), false, now(), &[]).unwrap();

    let sell_candle = Candle::new(120_000, 100.0, 200.0, 201.0, 99.0, 10.0).unwrap();
    let outcomes = simulate_tick(&mut sandbox, &mut repo, &market, &mut position, Decimal::from(100), &sell_candle, now()).unwrap();
    assert_eq!(outcomes[0].transition, PositionTransition::Close);
    assert_eq!(sandbox.wallet_balance("BTC"), Decimal::ZERO);
    assert_eq!(sandbox.wallet_balance("USDT"), Decimal::new(1_000_996_002, 5));
}

#[test]
fn futures_open_and_close_with_leverage_credits_realized_pnl() {
    let mut sandbox = Sandbox::new(Account::Futures(FuturesAccount::new(Decimal::new(4, 4), Decimal::from(1_000), Decimal::from(10), LeverageMode::Isolated)));
    let mut repo = OrderRepository::default();
    let market = Market::new("binance", "BTC-USDT");
    let mut position = Position::flat("binance", "BTC-USDT", AccountKind::Futures, Decimal::ZERO, Decimal::new(1, 3), Decimal::ZERO);
    position.leverage = Decimal::from(10);
    position.leverage_mode = Some(LeverageMode::Isolated);

    sandbox.market(&mut repo, &market, Uuid::new_v4(), Decimal::ONE, Decimal::from(100), false, now(), &[]).unwrap();
    let open_candle = Candle::new(60_000, 95.0, 100.0, 101.0, 94.0, 10.0).unwrap();
    let outcomes = simulate_tick(&mut sandbox, &mut repo, &market, &mut position, Decimal::from(90), &open_candle, now()).unwrap();
    assert_eq!(outcomes[0].transition, PositionTransition::Open);
    assert_eq!(sandbox.wallet_balance(""), Decimal::new(99_996, 2));

    sandbox.market(&mut repo, &market, Uuid::new_v4(), -Decimal::ONE, Decimal::from(110), true, now(), &[&position]).unwrap();
    let close_candle = Candle::new(120_000, 100.0, 110.0, 111.0, 99.0, 10.0).unwrap();
    let outcomes = simulate_tick(&mut sandbox, &mut repo, &market, &mut position, Decimal::from(100), &close_candle, now()).unwrap();
    assert_eq!(outcomes[0].transition, PositionTransition::Close);

    // 1000 - 0.04 (open fee) - 0.044 (close fee) + 10 (realized pnl) = 1009.916
    assert_eq!(sandbox.wallet_balance(""), Decimal::new(1_009_916, 3));
}

#[test]
fn higher_timeframe_candle_reduces_five_one_minute_bars_bit_exactly() {
    let mut engine = Engine::new(RunMode::Backtest, now(), LogToggles::default(), Box::new(NullSink), Box::new(NullSink));
    let market = Market::new("binance", "BTC-USDT");
    let mut assets = HashMap::new();
    assets.insert(smol_str::SmolStr::new("USDT"), Decimal::from(10_000));
    engine.register_account("binance", Sandbox::new(Account::Spot(SpotAccount::new(Decimal::ZERO, assets))));
    engine.register_position(market.clone(), Position::flat("binance", "BTC-USDT", AccountKind::Spot, Decimal::ZERO, Decimal::new(1, 4), Decimal::ZERO), "demo");

    let timeframes = [Timeframe::Minute1, Timeframe::Minute5];
    let one_minute_bars = [
        (300_000, 1.0, 2.0, 3.0, 0.5, 1.0),
        (360_000, 2.0, 3.0, 4.0, 1.0, 2.0),
        (420_000, 3.0, 2.0, 3.0, 1.0, 1.0),
        (480_000, 2.0, 4.0, 5.0, 2.0, 3.0),
        (540_000, 4.0, 5.0, 6.0, 3.0, 2.0),
    ];
    for (ts, open, close, high, low, volume) in one_minute_bars {
        let candle = Candle::new(ts, open, close, high, low, volume).unwrap();
        engine.on_new_candle(&market, &timeframes, 10, candle, Timeframe::Minute1, now()).unwrap();
    }

    let five_minute = engine.candles.get(&market).unwrap().current(Timeframe::Minute5).unwrap();
    assert_eq!(five_minute.timestamp_ms, 300_000);
    assert_eq!(five_minute.open, 1.0);
    assert_eq!(five_minute.close, 5.0);
    assert_eq!(five_minute.high, 6.0);
    assert_eq!(five_minute.low, 0.5);
    assert_eq!(five_minute.volume, 9.0);
}

#[test]
fn reduce_only_order_exceeding_position_size_clamps_to_close_not_flip() {
    let mut assets = HashMap::new();
    assets.insert(smol_str::SmolStr::new("USDT"), Decimal::from(10_000));
    assets.insert(smol_str::SmolStr::new("BTC"), Decimal::from(10));
    let mut sandbox = Sandbox::new(Account::Spot(SpotAccount::new(Decimal::ZERO, assets)));
    let mut repo = OrderRepository::default();
    let market = Market::new("binance", "BTC-USDT");
    let mut position = Position::flat("binance", "BTC-USDT", AccountKind::Spot, Decimal::ZERO, Decimal::new(1, 3), Decimal::ZERO);
    position.open(Decimal::ONE, Decimal::from(100), now()).unwrap();

    let order = Order::new("binance", "BTC-USDT", Uuid::new_v4(), OrderKind::Limit, -Decimal::from(2), Some(Decimal::from(105)), true, now()).unwrap();
    repo.add(&market, order, false);

    let candle = Candle::new(60_000, 100.0, 106.0, 107.0, 99.0, 10.0).unwrap();
    let outcomes = simulate_tick(&mut sandbox, &mut repo, &market, &mut position, Decimal::from(95), &candle, now()).unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].transition, PositionTransition::Close);
    assert!(position.qty.is_zero());
    assert_eq!(position.position_type(), tradekit::position::PositionType::Close);
}

#[test]
fn order_book_trim_buckets_raw_asks_onto_the_price_grid() {
    let mut book = tradekit::data::orderbook::OrderBookState::new();
    book.update_raw(&[(100.12, 1.0), (100.13, 2.0), (100.21, 3.0)], &[], 0);

    let asks = book.asks();
    assert_eq!(asks[0], (100.2, 3.0));
    assert_eq!(asks[1], (100.3, 3.0));
    assert!(asks[2].0.is_nan());
}
