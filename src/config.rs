//! Application configuration loaded from environment variables.
//!
//! All values have working defaults for the public MEXC endpoints:
//! - `KESTREL_SYMBOL` - trading pair to watch (default `BTCUSDT`)
//! - `KESTREL_KLINE_INTERVAL` - candle interval (default `1m`)
//! - `MEXC_WEBSOCKET_URL` - overrides the default stream endpoint
//! - `MEXC_REST_URL` - overrides the default REST endpoint

use crate::KestrelError;

/// Default public WebSocket endpoint.
const DEFAULT_WEBSOCKET_URL: &str = "wss://wbs.mexc.com/ws";

/// Default public REST endpoint.
const DEFAULT_REST_URL: &str = "https://api.mexc.com";

/// Default trading pair.
const DEFAULT_SYMBOL: &str = "BTCUSDT";

/// Default candle interval for window construction.
const DEFAULT_KLINE_INTERVAL: &str = "1m";

/// Top-level application configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub exchange: ExchangeConfig,
    /// Trading pair the whole engine operates on.
    pub symbol: String,
    /// Candle interval used for the analysis window.
    pub kline_interval: String,
}

/// Exchange endpoint configuration.
#[derive(Debug)]
pub struct ExchangeConfig {
    pub websocket_url: String,
    pub rest_url: String,
}

/// Loads the application configuration from environment variables.
///
/// # Errors
///
/// Returns [`KestrelError::InvalidSymbol`] if `KESTREL_SYMBOL` is set to
/// a value that is not non-empty ASCII alphanumeric.
pub fn fetch_config() -> crate::Result<AppConfig> {
    let websocket_url =
        non_empty_var("MEXC_WEBSOCKET_URL").unwrap_or_else(|| DEFAULT_WEBSOCKET_URL.to_string());
    let rest_url = non_empty_var("MEXC_REST_URL").unwrap_or_else(|| DEFAULT_REST_URL.to_string());

    let symbol = non_empty_var("KESTREL_SYMBOL").unwrap_or_else(|| DEFAULT_SYMBOL.to_string());
    validate_symbol(&symbol)?;

    let kline_interval = non_empty_var("KESTREL_KLINE_INTERVAL")
        .unwrap_or_else(|| DEFAULT_KLINE_INTERVAL.to_string());

    Ok(AppConfig {
        exchange: ExchangeConfig {
            websocket_url,
            rest_url,
        },
        symbol,
        kline_interval,
    })
}

/// Validates a trading-pair symbol at the construction boundary.
///
/// # Errors
///
/// Returns [`KestrelError::InvalidSymbol`] for an empty or
/// non-alphanumeric symbol.
pub fn validate_symbol(symbol: &str) -> crate::Result<()> {
    if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(KestrelError::InvalidSymbol(symbol.to_string()));
    }
    Ok(())
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}
