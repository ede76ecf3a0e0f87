//! Shared models for market data streams.
//!
//! Contains event kind definitions, channel-key construction, the
//! subscribe/unsubscribe control envelopes, and the [`MarketEvent`]
//! tagged union produced by the stream dispatcher.

pub mod candle;
pub mod ticker;
pub mod trade;

use serde::{Deserialize, Deserializer, Serialize};

pub use candle::Candle;
pub use ticker::Tick;
pub use trade::Trade;

/// Market data event kinds the stream client can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ticker,
    Trade,
    /// OHLCV candles (wire name: `"kline"`).
    Kline,
}

impl EventKind {
    /// Returns the wire-format channel suffix expected by the exchange.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Ticker => "ticker",
            EventKind::Trade => "trade",
            EventKind::Kline => "kline",
        }
    }
}

/// Builds the channel key `"<symbol-lowercase>@<kind>[_<interval>]"` that
/// uniquely identifies a subscription.
pub fn channel_key(symbol: &str, kind: EventKind, interval: Option<&str>) -> String {
    match (kind, interval) {
        (EventKind::Kline, Some(interval)) => {
            format!("{}@kline_{interval}", symbol.to_lowercase())
        }
        _ => format!("{}@{}", symbol.to_lowercase(), kind.as_str()),
    }
}

/// A single parsed event from the market data stream.
///
/// Produced by one parsing step regardless of transport (live stream or
/// polling fallback), then dispatched by channel key.
#[derive(Debug, Clone)]
pub enum MarketEvent {
    Ticker(Tick),
    Trade(Trade),
    Kline(Candle),
}

/// A `SUBSCRIPTION` control request sent over the live stream.
#[derive(Serialize)]
pub struct SubscribeRequest {
    pub method: String,
    pub params: Vec<String>,
    pub id: u64,
}

impl SubscribeRequest {
    pub fn new(channel_key: &str, id: u64) -> Self {
        Self {
            method: "SUBSCRIPTION".to_string(),
            params: vec![channel_key.to_string()],
            id,
        }
    }
}

/// An `UNSUBSCRIPTION` control request sent over the live stream.
#[derive(Serialize)]
pub struct UnsubscribeRequest {
    pub method: String,
    pub params: Vec<String>,
    pub id: u64,
}

impl UnsubscribeRequest {
    pub fn new(channel_key: &str, id: u64) -> Self {
        Self {
            method: "UNSUBSCRIPTION".to_string(),
            params: vec![channel_key.to_string()],
            id,
        }
    }
}

/// Deserializes a price/quantity field that the exchange sends either as
/// a JSON number or as a numeric string.
pub(crate) fn f64_lenient<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(f64),
        Str(String),
    }

    match NumOrStr::deserialize(deserializer)? {
        NumOrStr::Num(n) => Ok(n),
        NumOrStr::Str(s) => s.parse::<f64>().map_err(serde::de::Error::custom),
    }
}
