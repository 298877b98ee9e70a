//! Standalone triangular-arbitrage bot: CLI entry point (spec.md §6).
//!
//! Watches three order books forming a cycle (A/B, B/C, A/C) on one venue,
//! computes the forward and reverse cycle profit by walking each book's
//! levels ([`orderbook::OrderBookSnapshot::best_turnover`]), and executes
//! the better direction once it clears a profit threshold.

mod bot;
mod client;
mod config;
mod error;
mod orderbook;
mod websocket;

use std::process::ExitCode;

use bot::ArbitrageBot;
use client::NobitexClient;
use config::{parse_args, Cli};
use error::ArbitrageError;
use websocket::NobitexWebSocketClient;

const MONITOR_INTERVAL: std::time::Duration = std::time::Duration::from_millis(5_000);
const MIN_PROFIT_PERCENT: f64 = 0.2;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match parse_args(args) {
        Ok(Cli::Help(text)) => {
            print!("{text}");
            return ExitCode::SUCCESS;
        }
        Ok(Cli::Run(config)) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    if config.access_token.is_empty() {
        eprintln!("error: {}", ArbitrageError::MissingToken);
        eprintln!("Use --token or -t to provide an access token");
        return ExitCode::FAILURE;
    }

    println!("Nobitex Arbitrage Bot");
    println!("Mode: {}", if config.use_testnet { "Test" } else { "Real" });
    println!("Data source: {}", if config.use_websocket { "WebSocket" } else { "REST API" });
    println!(
        "Symbols: {}/{}, {}/{}, {}/{}",
        config.symbol_a, config.symbol_b, config.symbol_b, config.symbol_c, config.symbol_a, config.symbol_c
    );
    println!("Trade amount: {} {}", config.trade_amount_a, config.symbol_a);

    let client = match NobitexClient::new(config.use_testnet, config.access_token.clone()) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let ws_client = config.use_websocket.then(|| NobitexWebSocketClient::new(config.use_testnet));
    let market_data = ws_client.as_ref().map(|ws| ws.cache());
    let bot = ArbitrageBot::new(client, config.clone(), market_data);

    if let Some(ws_client) = ws_client {
        let symbols = vec![config.pair_ab(), config.pair_bc(), config.pair_ac()];
        let ws_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(err) = ws_client.run(&symbols, ws_shutdown).await {
                tracing::error!(%err, "orderbook stream terminated");
            }
        });
    }

    match bot.calculate_arbitrage_profit().await {
        Ok((forward_pct, reverse_pct)) => {
            let profit = forward_pct.max(reverse_pct);
            if profit > 0.0 {
                println!("Current arbitrage profit: {profit:.4}%");
            }
        }
        Err(err) => eprintln!("warning: could not compute current profit: {err}"),
    }

    let monitor = tokio::spawn(async move {
        bot.monitor(MONITOR_INTERVAL, MIN_PROFIT_PERCENT, shutdown_rx).await;
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            println!("Received shutdown signal");
        }
        result = monitor => {
            if let Err(err) = result {
                eprintln!("monitor task panicked: {err}");
            }
        }
    }
    let _ = shutdown_tx.send(true);

    ExitCode::SUCCESS
}
