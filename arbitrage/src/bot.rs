//! Triangular-arbitrage cycle computation and execution (spec.md §1's
//! "order-book consumption engine" illustration, §6's REST trading flow).

use std::time::Duration;

use crate::client::{NobitexClient, OrderSide};
use crate::config::BotConfig;
use crate::error::{ArbitrageError, Result};
use crate::orderbook::OrderBookSnapshot;
use crate::websocket::MarketDataCache;

const MIN_RETRY_INTERVAL: Duration = Duration::from_millis(1_000);
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Fee applied on each of the bot's four legs (spec.md §9 open question:
/// "whether this matches venue reality is business policy, not a core
/// contract" — kept as the value the cycle computation was grounded on).
const PER_LEG_FEE: f64 = 0.0035;

pub struct ArbitrageBot {
    client: NobitexClient,
    config: BotConfig,
    market_data: Option<MarketDataCache>,
}

impl ArbitrageBot {
    pub fn new(client: NobitexClient, config: BotConfig, market_data: Option<MarketDataCache>) -> Self {
        Self { client, config, market_data }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Returns the cached WebSocket snapshot for `symbol` if one has
    /// arrived, falling back to a REST order-book fetch.
    async fn order_book(&self, symbol: &str) -> Result<OrderBookSnapshot> {
        if let Some(cache) = &self.market_data {
            if let Some(book) = cache.lock().get(symbol).cloned() {
                return Ok(book);
            }
        }
        let book = self.client.order_book(symbol).await?;
        if book.is_empty() {
            return Err(ArbitrageError::EmptyOrderBook(symbol.to_string()));
        }
        Ok(book)
    }

    /// [`Self::order_book`] + [`OrderBookSnapshot::best_turnover`], retried
    /// up to [`MAX_RETRY_ATTEMPTS`] times at [`MIN_RETRY_INTERVAL`]
    /// (spec.md §5 adapter retry policy).
    async fn best_turnover_with_retry(&self, symbol: &str, amount: f64) -> Result<(f64, f64)> {
        let mut last_err = None;
        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            match self.order_book(symbol).await {
                Ok(book) => return Ok(book.best_turnover(amount)),
                Err(err) => {
                    tracing::warn!(symbol, attempt, %err, "failed to fetch order book");
                    last_err = Some(err);
                    if attempt < MAX_RETRY_ATTEMPTS {
                        tokio::time::sleep(MIN_RETRY_INTERVAL).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or(ArbitrageError::ExchangeNotResponding {
            operation: format!("orderbook({symbol})"),
            attempts: MAX_RETRY_ATTEMPTS,
        }))
    }

    /// Computes the forward (A→B→C→A) and reverse (A→C→B→A) cycle profit
    /// percentages for [`BotConfig::trade_amount_a`], each leg taxed at
    /// [`PER_LEG_FEE`].
    pub async fn calculate_arbitrage_profit(&self) -> Result<(f64, f64)> {
        let amount_a = self.config.trade_amount_a;

        let (b, _) = self.best_turnover_with_retry(&self.config.pair_ab(), amount_a).await?;
        let b = b * (1.0 - PER_LEG_FEE);
        let (c, _) = self.best_turnover_with_retry(&self.config.pair_bc(), b).await?;
        let c = c * (1.0 - PER_LEG_FEE);
        let (_, a) = self.best_turnover_with_retry(&self.config.pair_ac(), c).await?;
        let a = a * (1.0 - PER_LEG_FEE);
        let forward_pct = (a - amount_a) / amount_a * 100.0;

        let (c, _) = self.best_turnover_with_retry(&self.config.pair_ac(), amount_a).await?;
        let c = c * (1.0 - PER_LEG_FEE);
        let (_, b) = self.best_turnover_with_retry(&self.config.pair_bc(), c).await?;
        let b = b * (1.0 - PER_LEG_FEE);
        let (_, a) = self.best_turnover_with_retry(&self.config.pair_ab(), b).await?;
        let a = a * (1.0 - PER_LEG_FEE);
        let reverse_pct = (a - amount_a) / amount_a * 100.0;

        Ok((forward_pct, reverse_pct))
    }

    /// Executes whichever cycle direction [`Self::calculate_arbitrage_profit`]
    /// found more profitable, placing three market orders and reporting the
    /// realized profit against the starting balances.
    pub async fn execute_arbitrage(&self) -> Result<bool> {
        let (forward_pct, reverse_pct) = self.calculate_arbitrage_profit().await?;
        let forward = forward_pct >= reverse_pct;

        let initial_a = self.client.wallet_balance_value(&self.config.symbol_a).await?;
        let initial_b = self.client.wallet_balance_value(&self.config.symbol_b).await?;
        let initial_c = self.client.wallet_balance_value(&self.config.symbol_c).await?;
        tracing::info!(initial_a, initial_b, initial_c, "starting balances");

        if forward {
            self.run_leg(&self.config.symbol_a, &self.config.symbol_b, OrderSide::Sell, self.config.trade_amount_a).await?;
            let have_b = self.client.wallet_balance_value(&self.config.symbol_b).await? - initial_b;

            self.run_leg(&self.config.symbol_b, &self.config.symbol_c, OrderSide::Sell, have_b).await?;
            let have_c = self.client.wallet_balance_value(&self.config.symbol_c).await? - initial_c;

            let (_, need_a) = self.best_turnover_with_retry(&self.config.pair_ac(), have_c).await?;
            self.run_leg(&self.config.symbol_a, &self.config.symbol_c, OrderSide::Buy, need_a).await?;
        } else {
            self.run_leg(&self.config.symbol_a, &self.config.symbol_c, OrderSide::Sell, self.config.trade_amount_a).await?;
            let have_c = self.client.wallet_balance_value(&self.config.symbol_c).await? - initial_c;

            let (_, need_b) = self.best_turnover_with_retry(&self.config.pair_bc(), have_c).await?;
            self.run_leg(&self.config.symbol_b, &self.config.symbol_c, OrderSide::Buy, need_b).await?;
            let have_b = self.client.wallet_balance_value(&self.config.symbol_b).await? - initial_b;

            let (_, need_a) = self.best_turnover_with_retry(&self.config.pair_ab(), have_b).await?;
            self.run_leg(&self.config.symbol_a, &self.config.symbol_b, OrderSide::Buy, need_a).await?;
        }

        let final_a = self.client.wallet_balance_value(&self.config.symbol_a).await?;
        let profit = final_a - initial_a;
        let profit_pct = profit / self.config.trade_amount_a * 100.0;
        tracing::info!(profit, profit_pct, "arbitrage cycle executed");
        Ok(true)
    }

    async fn run_leg(&self, base: &str, quote: &str, side: OrderSide, amount: f64) -> Result<()> {
        let response = self.client.place_market_order(base, quote, side, amount, None).await?;
        if !NobitexClient::order_status_ok(&response) {
            return Err(ArbitrageError::VenueError(response.to_string()));
        }
        Ok(())
    }

    /// Polls [`Self::calculate_arbitrage_profit`] every `interval` and
    /// executes a cycle whenever the best direction clears
    /// `min_profit_percent`, until `shutdown` fires.
    pub async fn monitor(
        &self,
        interval: Duration,
        min_profit_percent: f64,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        let interval = interval.max(MIN_RETRY_INTERVAL);
        loop {
            if *shutdown.borrow() {
                return;
            }
            match self.calculate_arbitrage_profit().await {
                Ok((forward_pct, reverse_pct)) => {
                    let best = forward_pct.max(reverse_pct);
                    if best >= min_profit_percent {
                        tracing::info!(best, "profitable opportunity found");
                        if let Err(err) = self.execute_arbitrage().await {
                            tracing::error!(%err, "failed to execute arbitrage cycle");
                        }
                    }
                }
                Err(err) => tracing::error!(%err, "failed to compute arbitrage profit"),
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => if *shutdown.borrow() { return; },
            }
        }
    }
}
