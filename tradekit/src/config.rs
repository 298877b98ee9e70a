//! Configuration & session bootstrap (SPEC_FULL §4.13): a hierarchical
//! config tree deserialized with `serde`, overridable by `ENV_FOO_BAR`
//! environment variables per spec.md §6. File I/O is the caller's concern
//! (spec.md §1 scope boundary) — this module only builds a [`Config`] from
//! a `serde_json::Value` the caller assembles however it likes.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::event::LogToggles;
use crate::position::{AccountKind, LeverageMode};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachingDriver {
    File,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Backtest,
    Livetrade,
    Fitness,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationRatio {
    Sharpe,
    Calmar,
    Sortino,
    Omega,
    Serenity,
    SmartSharpe,
    SmartSortino,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExchangeConfig {
    pub fee: Decimal,
    #[serde(rename = "type")]
    pub kind: AccountKind,
    pub futures_leverage_mode: Option<LeverageMode>,
    pub futures_leverage: Option<u32>,
    pub balance: Decimal,
}

#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    pub warmup_candles_num: u32,
    pub generate_candles_from_1m: bool,
    pub persistency: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { warmup_candles_num: 240, generate_candles_from_1m: true, persistency: false }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub considering_symbols: Vec<String>,
    pub trading_symbols: Vec<String>,
    pub considering_timeframes: Vec<String>,
    pub trading_timeframes: Vec<String>,
    pub considering_exchanges: Vec<String>,
    pub trading_exchanges: Vec<String>,
    pub considering_candles: Vec<String>,
    pub live_drivers: HashMap<String, String>,
    pub trading_mode: Option<TradingMode>,
    pub debug_mode: bool,
    pub is_unit_testing: bool,
}

/// Root configuration tree, mirroring spec.md §6's `env.*`/`app.*` key
/// groups one-to-one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub caching_driver: CachingDriver,
    pub logging: LoggingToggleConfig,
    pub exchanges: HashMap<String, ExchangeConfig>,
    pub data: DataConfig,
    pub optimization_ratio: OptimizationRatio,
    pub app: AppConfig,
}

/// Serde-friendly mirror of [`LogToggles`] (which is plain `Copy` data with
/// no derive dependency on `serde`).
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize)]
pub struct LoggingToggleConfig {
    pub order_submission: bool,
    pub order_cancellation: bool,
    pub order_execution: bool,
    pub position_opened: bool,
    pub position_increased: bool,
    pub position_reduced: bool,
    pub position_closed: bool,
    pub shorter_period_candles: bool,
    pub trading_candles: bool,
    pub balance_update: bool,
    pub exchange_ws_reconnection: bool,
}

impl From<LoggingToggleConfig> for LogToggles {
    fn from(c: LoggingToggleConfig) -> Self {
        LogToggles {
            order_submission: c.order_submission,
            order_cancellation: c.order_cancellation,
            order_execution: c.order_execution,
            position_opened: c.position_opened,
            position_increased: c.position_increased,
            position_reduced: c.position_reduced,
            position_closed: c.position_closed,
            shorter_period_candles: c.shorter_period_candles,
            trading_candles: c.trading_candles,
            balance_update: c.balance_update,
            exchange_ws_reconnection: c.exchange_ws_reconnection,
        }
    }
}

impl Config {
    /// Deserializes a [`Config`] from `base` after applying `env_vars`
    /// overrides (spec.md §6: `ENV.FOO.BAR → ENV_FOO_BAR`).
    pub fn from_value(base: Value, env_vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut merged = base;
        for (key, value) in env_vars {
            let Some(dotted) = env_key_to_dotted(key) else { continue };
            set_dotted(&mut merged, &dotted, coerce(value));
        }
        serde_json::from_value(merged).map_err(|e| ConfigError::InvalidConfig("<root>".into(), e.to_string()))
    }
}

/// Leaf paths `Config` recognizes, dotted the same way [`set_dotted`]
/// expects. A blind "every `_` becomes a `.`" transform would shred
/// multi-word leaf names (`order_submission`, `debug_mode`), so instead we
/// match `ENV_KEY` against this registry: a dotted path's env form is
/// itself uppercased with `.` replaced by `_`, which still collides with
/// the path's own underscores — that collision is resolved by matching
/// against the fixed list below rather than trying to invert it blindly.
const KNOWN_LEAF_PATHS: &[&str] = &[
    "caching_driver",
    "logging.order_submission",
    "logging.order_cancellation",
    "logging.order_execution",
    "logging.position_opened",
    "logging.position_increased",
    "logging.position_reduced",
    "logging.position_closed",
    "logging.shorter_period_candles",
    "logging.trading_candles",
    "logging.balance_update",
    "logging.exchange_ws_reconnection",
    "data.warmup_candles_num",
    "data.generate_candles_from_1m",
    "data.persistency",
    "optimization_ratio",
    "app.considering_symbols",
    "app.trading_symbols",
    "app.considering_timeframes",
    "app.trading_timeframes",
    "app.considering_exchanges",
    "app.trading_exchanges",
    "app.considering_candles",
    "app.trading_mode",
    "app.debug_mode",
    "app.is_unit_testing",
];

/// Suffixes of a per-exchange leaf (`exchanges.<NAME>.<suffix>`), longest
/// first so a greedy match doesn't cut `futures_leverage_mode` short at
/// `futures_leverage`.
const EXCHANGE_LEAF_SUFFIXES: &[&str] =
    &["futures_leverage_mode", "futures_leverage", "fee", "type", "balance"];

/// Maps an environment variable name back to the dotted path [`set_dotted`]
/// expects, per spec.md §6's `ENV.FOO.BAR → ENV_FOO_BAR` rule. Matches
/// against [`KNOWN_LEAF_PATHS`] and the dynamic `exchanges.<NAME>.*` shape;
/// anything else is not a recognized config key and is left alone.
fn env_key_to_dotted(env_key: &str) -> Option<String> {
    if !env_key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    let lower = env_key.to_lowercase();

    for path in KNOWN_LEAF_PATHS {
        if lower == path.replace('.', "_") {
            return Some((*path).to_string());
        }
    }

    if let Some(rest) = lower.strip_prefix("exchanges_") {
        for suffix in EXCHANGE_LEAF_SUFFIXES {
            if let Some(name) = rest.strip_suffix(&format!("_{suffix}")) {
                if !name.is_empty() {
                    return Some(format!("exchanges.{name}.{suffix}"));
                }
            }
        }
    }

    None
}

/// Coercion order from spec.md §6: bool ("true"/"false") → int → float →
/// string.
fn coerce(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(f) = raw.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}

fn set_dotted(root: &mut Value, dotted: &str, value: Value) {
    let mut cursor = root;
    let parts: Vec<&str> = dotted.split('.').collect();
    for part in &parts[..parts.len() - 1] {
        if !cursor.is_object() {
            *cursor = Value::Object(serde_json::Map::new());
        }
        cursor = cursor.as_object_mut().unwrap().entry(part.to_string()).or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
    if !cursor.is_object() {
        *cursor = Value::Object(serde_json::Map::new());
    }
    cursor.as_object_mut().unwrap().insert(parts[parts.len() - 1].to_string(), value);
}
