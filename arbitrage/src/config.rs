//! CLI argument parsing (spec.md §6 "CLI (arbitrage side-bot)").

use crate::error::{ArbitrageError, Result};

pub const DEFAULT_SYMBOL_A: &str = "DOGE";
pub const DEFAULT_SYMBOL_B: &str = "USDT";
pub const DEFAULT_SYMBOL_C: &str = "IRT";
pub const DEFAULT_AMOUNT: f64 = 10.0;

/// Bot configuration assembled from defaults + CLI flags.
#[derive(Clone, Debug, PartialEq)]
pub struct BotConfig {
    pub use_testnet: bool,
    pub access_token: String,
    pub symbol_a: String,
    pub symbol_b: String,
    pub symbol_c: String,
    pub trade_amount_a: f64,
    pub use_websocket: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            use_testnet: true,
            access_token: String::new(),
            symbol_a: DEFAULT_SYMBOL_A.to_string(),
            symbol_b: DEFAULT_SYMBOL_B.to_string(),
            symbol_c: DEFAULT_SYMBOL_C.to_string(),
            trade_amount_a: DEFAULT_AMOUNT,
            use_websocket: false,
        }
    }
}

impl BotConfig {
    pub fn pair_ab(&self) -> String {
        format!("{}{}", self.symbol_a, self.symbol_b)
    }

    pub fn pair_bc(&self) -> String {
        format!("{}{}", self.symbol_b, self.symbol_c)
    }

    pub fn pair_ac(&self) -> String {
        format!("{}{}", self.symbol_a, self.symbol_c)
    }
}

/// Outcome of parsing argv: either a config to run with, or a request to
/// print help and exit 0.
pub enum Cli {
    Run(BotConfig),
    Help(&'static str),
}

pub const HELP_TEXT: &str = "\
Nobitex Arbitrage Bot
Usage: arbitrage [options]
Options:
  --real, -r             Use real market (default: test market)
  --token, -t TOKEN       Set access token
  --symbolA, -a SYMBOL    Set symbol A (default: DOGE)
  --symbolB, -b SYMBOL    Set symbol B (default: USDT)
  --symbolC, -c SYMBOL    Set symbol C (default: IRT)
  --amount, -m AMOUNT     Set trade amount (default: 10)
  --no-websocket          Disable WebSocket (use REST API only)
  --help, -h              Show this help message
";

/// Parses CLI flags per spec.md §6. Unknown flags are rejected rather than
/// silently ignored (the original let them fall through unnoticed).
pub fn parse_args<I, S>(args: I) -> Result<Cli>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut config = BotConfig::default();
    let mut iter = args.into_iter().map(|s| s.as_ref().to_string()).peekable();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--real" | "-r" => config.use_testnet = false,
            "--no-websocket" => config.use_websocket = false,
            "--help" | "-h" => return Ok(Cli::Help(HELP_TEXT)),
            "--token" | "-t" => config.access_token = next_value(&mut iter, "token")?,
            "--symbolA" | "-a" => config.symbol_a = next_value(&mut iter, "symbolA")?,
            "--symbolB" | "-b" => config.symbol_b = next_value(&mut iter, "symbolB")?,
            "--symbolC" | "-c" => config.symbol_c = next_value(&mut iter, "symbolC")?,
            "--amount" | "-m" => {
                let raw = next_value(&mut iter, "amount")?;
                config.trade_amount_a = raw
                    .parse()
                    .map_err(|_| ArbitrageError::InvalidAmount(raw))?;
            }
            other => return Err(ArbitrageError::UnrecognizedArgument(other.to_string())),
        }
    }

    Ok(Cli::Run(config))
}

fn next_value(
    iter: &mut std::iter::Peekable<impl Iterator<Item = String>>,
    flag: &'static str,
) -> Result<String> {
    iter.next().ok_or(ArbitrageError::MissingArgumentValue(flag))
}
