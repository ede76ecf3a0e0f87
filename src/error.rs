//! Crate-level error types.
//!
//! [`KestrelError`] unifies every error source (configuration, WebSocket,
//! JSON, HTTP, market-data parsing) behind a single enum so callers can
//! match on the variant they care about while still using the `?`
//! operator for easy propagation.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, KestrelError>;

/// Top-level error type returned by all public APIs.
#[derive(Debug, thiserror::Error)]
pub enum KestrelError {
    /// An environment variable was missing, empty, or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// A symbol failed construction-boundary validation.
    #[error("invalid symbol {0:?}: must be non-empty ASCII alphanumeric")]
    InvalidSymbol(String),

    /// A WebSocket operation (connect, send, receive) failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A REST request to the exchange failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A kline row from the REST API did not have the expected shape.
    #[error("malformed kline row: {0}")]
    MalformedKline(String),

    /// The candle window is too short for a full analysis cycle.
    #[error("insufficient window: need {required} candles, got {actual}")]
    InsufficientWindow { required: usize, actual: usize },
}
