//! Reconnecting WebSocket client for the venue's order-book push feed
//! (spec.md §6 "Order-book wire format", §5 "Live reconnection").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

use crate::error::{ArbitrageError, Result};
use crate::orderbook::OrderBookSnapshot;

const TESTNET_URL: &str = "wss://testnetapi.nobitex.ir/ws";
const REAL_URL: &str = "wss://wss.nobitex.ir/connection/websocket";

const MAX_RECONNECT_ATTEMPTS: u32 = 5;
const RECONNECT_INTERVAL: Duration = Duration::from_millis(2_000);

/// Shared order-book cache the bot reads from and the WebSocket task
/// writes into. `Arc<Mutex<_>>` rather than a channel: the bot only ever
/// wants the latest snapshot per symbol, never a backlog (spec.md §5's
/// "at most one bucket gap" tolerance).
pub type MarketDataCache = Arc<Mutex<HashMap<String, OrderBookSnapshot>>>;

pub struct NobitexWebSocketClient {
    url: &'static str,
    cache: MarketDataCache,
}

impl NobitexWebSocketClient {
    pub fn new(use_testnet: bool) -> Self {
        Self {
            url: if use_testnet { TESTNET_URL } else { REAL_URL },
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn cache(&self) -> MarketDataCache {
        self.cache.clone()
    }

    /// Connects, subscribes to `symbols`, and runs the read loop until
    /// `shutdown` fires, reconnecting up to [`MAX_RECONNECT_ATTEMPTS`]
    /// times at [`RECONNECT_INTERVAL`] between attempts (spec.md §5/§6).
    pub async fn run(
        &self,
        symbols: &[String],
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> Result<()> {
        let mut attempts = 0u32;
        loop {
            if *shutdown.borrow() {
                return Ok(());
            }
            match self.connect_and_subscribe(symbols, &mut shutdown).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    attempts += 1;
                    tracing::warn!(%err, attempts, "websocket disconnected, reconnecting");
                    if attempts >= MAX_RECONNECT_ATTEMPTS {
                        return Err(ArbitrageError::ExchangeNotResponding {
                            operation: "orderbook stream".to_string(),
                            attempts,
                        });
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(RECONNECT_INTERVAL) => {}
                        _ = shutdown.changed() => if *shutdown.borrow() { return Ok(()); },
                    }
                }
            }
        }
    }

    async fn connect_and_subscribe(
        &self,
        symbols: &[String],
        shutdown: &mut tokio::sync::watch::Receiver<bool>,
    ) -> Result<()> {
        let (stream, _) = tokio_tungstenite::connect_async(self.url).await?;
        let (mut sink, mut source) = stream.split();

        sink.send(Message::Text(json!({"connect": {}, "id": 1}).to_string().into()))
            .await?;

        for (i, symbol) in symbols.iter().enumerate() {
            let frame = json!({
                "subscribe": { "channel": format!("public:orderbook-{symbol}") },
                "id": i as u64 + 2,
            });
            sink.send(Message::Text(frame.to_string().into())).await?;
        }

        loop {
            tokio::select! {
                message = source.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            if let Ok(value) = serde_json::from_str::<Value>(&text) {
                                self.handle_push(&value);
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => return Err(ArbitrageError::WebSocketClosed),
                        Some(Ok(_)) => {}
                        Some(Err(err)) => return Err(err.into()),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        let _ = sink.send(Message::Close(None)).await;
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Decodes `{"push":{"channel":"public:orderbook-<SYMBOL>","pub":{"data":"<json-string>"}}}`
    /// and writes the decoded book into the cache (spec.md §6).
    fn handle_push(&self, value: &Value) {
        let Some(channel) = value.pointer("/push/channel").and_then(Value::as_str) else {
            return;
        };
        let Some(symbol) = channel.strip_prefix("public:orderbook-") else {
            return;
        };
        let Some(data_str) = value.pointer("/push/pub/data").and_then(Value::as_str) else {
            return;
        };
        let Ok(data) = serde_json::from_str::<Value>(data_str) else {
            tracing::debug!(symbol, "failed to decode inner orderbook payload");
            return;
        };
        match OrderBookSnapshot::from_json(&data) {
            Ok(book) => {
                self.cache.lock().insert(symbol.to_string(), book);
            }
            Err(err) => tracing::debug!(symbol, %err, "failed to parse orderbook push"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_name_is_parsed_into_symbol() {
        let client = NobitexWebSocketClient::new(true);
        let push = json!({
            "push": {
                "channel": "public:orderbook-BTCUSDT",
                "pub": { "data": r#"{"bids":[["100","1"]],"asks":[["101","1"]]}"# },
            }
        });
        client.handle_push(&push);
        let cache = client.cache();
        let guard = cache.lock();
        assert!(guard.contains_key("BTCUSDT"));
    }

    #[test]
    fn unrelated_channel_is_ignored() {
        let client = NobitexWebSocketClient::new(true);
        let push = json!({"push": {"channel": "public:trades-BTCUSDT", "pub": {"data": "{}"}}});
        client.handle_push(&push);
        assert!(client.cache().lock().is_empty());
    }
}
