use thiserror::Error;

/// Errors surfaced by the arbitrage bot: CLI parsing, the REST client, the
/// reconnecting WebSocket client, and the cycle computation itself.
#[derive(Error, Debug)]
pub enum ArbitrageError {
    #[error("missing access token: pass --token/-t or set NOBITEX_TOKEN")]
    MissingToken,

    #[error("unrecognized argument: {0}")]
    UnrecognizedArgument(String),

    #[error("--{0} requires a value")]
    MissingArgumentValue(&'static str),

    #[error("invalid trade amount: {0}")]
    InvalidAmount(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("venue returned a non-ok response: {0}")]
    VenueError(String),

    #[error("unexpected response shape: {0}")]
    InvalidShape(String),

    #[error("order book for {0} is empty")]
    EmptyOrderBook(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("websocket closed by peer")]
    WebSocketClosed,

    #[error(
        "exchange not responding after {attempts} attempts to {operation}"
    )]
    ExchangeNotResponding { operation: String, attempts: u32 },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ArbitrageError>;
