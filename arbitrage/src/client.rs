//! REST client for the arbitrage venue (spec.md §6 "Trading REST").

use rand::RngCore;
use serde_json::{json, Value};

use crate::error::{ArbitrageError, Result};
use crate::orderbook::OrderBookSnapshot;

const BASE_URL_REAL: &str = "https://api.nobitex.ir";
const BASE_URL_TEST: &str = "https://testnetapi.nobitex.ir";

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    fn as_str(self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

/// Rewrites the currency code `IRT` to the venue's wire code `RLS`
/// (spec.md §6).
fn wire_currency(code: &str) -> String {
    if code.eq_ignore_ascii_case("IRT") {
        "RLS".to_string()
    } else {
        code.to_lowercase()
    }
}

/// 32 lowercase hex chars from 16 random bytes (spec.md §6 `clientOrderId`).
fn generate_client_order_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub struct NobitexClient {
    http: reqwest::Client,
    base_url: &'static str,
    access_token: String,
}

impl NobitexClient {
    pub fn new(use_testnet: bool, access_token: String) -> Result<Self> {
        if access_token.is_empty() {
            return Err(ArbitrageError::MissingToken);
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: if use_testnet { BASE_URL_TEST } else { BASE_URL_REAL },
            access_token,
        })
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Token {}", self.access_token))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<Value>().await?)
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Token {}", self.access_token))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<Value>().await?)
    }

    pub async fn wallet_balance(&self, currency: &str) -> Result<Value> {
        let currency = wire_currency(currency);
        self.post("/users/wallets/balance", json!({ "currency": currency })).await
    }

    /// Fetches and parses a wallet balance into an `f64` (spec.md §6
    /// "balance" endpoint, status-checked response).
    pub async fn wallet_balance_value(&self, currency: &str) -> Result<f64> {
        let response = self.wallet_balance(currency).await?;
        if response.get("status").and_then(Value::as_str) != Some("ok") {
            return Err(ArbitrageError::VenueError(response.to_string()));
        }
        let raw = response
            .get("balance")
            .ok_or_else(|| ArbitrageError::InvalidShape("missing balance field".into()))?;
        parse_numeric(raw)
    }

    pub async fn order_book(&self, symbol: &str) -> Result<OrderBookSnapshot> {
        let value = self.get(&format!("/v3/orderbook/{}", symbol)).await?;
        OrderBookSnapshot::from_json(&value)
    }

    pub async fn place_market_order(
        &self,
        base: &str,
        quote: &str,
        side: OrderSide,
        amount: f64,
        price: Option<f64>,
    ) -> Result<Value> {
        let mut body = json!({
            "type": side.as_str(),
            "srcCurrency": wire_currency(base),
            "dstCurrency": wire_currency(quote),
            "amount": amount,
            "execution": "limit",
            "clientOrderId": generate_client_order_id(),
        });
        if let Some(price) = price {
            if price > 0.0 {
                body["price"] = json!(price);
            }
        }
        self.post("/market/orders/add", body).await
    }

    /// True if `response["status"] == "ok"`.
    pub fn order_status_ok(response: &Value) -> bool {
        response.get("status").and_then(Value::as_str) == Some("ok")
    }
}

fn parse_numeric(value: &Value) -> Result<f64> {
    match value {
        Value::String(s) => s
            .parse()
            .map_err(|_| ArbitrageError::InvalidShape(format!("not numeric: {s}"))),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ArbitrageError::InvalidShape(format!("not f64-representable: {n}"))),
        other => Err(ArbitrageError::InvalidShape(format!("not numeric: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn irt_is_rewritten_to_rls() {
        assert_eq!(wire_currency("IRT"), "RLS");
        assert_eq!(wire_currency("irt"), "RLS");
        assert_eq!(wire_currency("BTC"), "btc");
    }

    #[test]
    fn client_order_id_is_32_hex_chars() {
        let id = generate_client_order_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn empty_token_is_rejected() {
        let err = NobitexClient::new(true, String::new()).unwrap_err();
        assert!(matches!(err, ArbitrageError::MissingToken));
    }

    #[test]
    fn order_status_ok_checks_the_status_field() {
        assert!(NobitexClient::order_status_ok(&json!({"status": "ok"})));
        assert!(!NobitexClient::order_status_ok(&json!({"status": "failed"})));
        assert!(!NobitexClient::order_status_ok(&json!({})));
    }

    #[test]
    fn parse_numeric_accepts_strings_and_numbers() {
        assert_eq!(parse_numeric(&json!("1.5")).unwrap(), 1.5);
        assert_eq!(parse_numeric(&json!(2.5)).unwrap(), 2.5);
        assert!(parse_numeric(&json!("nope")).is_err());
    }
}
