//! Ticker channel models.

use serde::{Deserialize, Serialize};

use crate::models::f64_lenient;

/// A last-price / 24h-stats snapshot for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tick {
    pub symbol: String,
    pub price: f64,
    pub volume_24h: f64,
    pub change_pct_24h: f64,
    pub high_24h: f64,
    pub low_24h: f64,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

/// A ticker payload from the live stream.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerPayload {
    #[serde(rename = "s")]
    pub symbol: String,
    /// Last price.
    #[serde(rename = "c", deserialize_with = "f64_lenient")]
    pub price: f64,
    #[serde(rename = "v", deserialize_with = "f64_lenient", default)]
    pub volume: f64,
    #[serde(rename = "P", deserialize_with = "f64_lenient", default)]
    pub change_pct: f64,
    #[serde(rename = "h", deserialize_with = "f64_lenient", default)]
    pub high: f64,
    #[serde(rename = "l", deserialize_with = "f64_lenient", default)]
    pub low: f64,
    #[serde(rename = "t", default)]
    pub timestamp: i64,
}

impl TickerPayload {
    pub fn into_tick(self) -> Tick {
        Tick {
            symbol: self.symbol,
            price: self.price,
            volume_24h: self.volume,
            change_pct_24h: self.change_pct,
            high_24h: self.high,
            low_24h: self.low,
            timestamp: self.timestamp,
        }
    }
}

/// The REST 24h ticker response, used to re-synthesize ticks while polling.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24hr {
    pub symbol: String,
    #[serde(deserialize_with = "f64_lenient")]
    pub last_price: f64,
    #[serde(deserialize_with = "f64_lenient", default)]
    pub volume: f64,
    #[serde(deserialize_with = "f64_lenient", default)]
    pub price_change_percent: f64,
    #[serde(deserialize_with = "f64_lenient", default)]
    pub high_price: f64,
    #[serde(deserialize_with = "f64_lenient", default)]
    pub low_price: f64,
    #[serde(default)]
    pub close_time: i64,
}

impl Ticker24hr {
    pub fn into_tick(self) -> Tick {
        Tick {
            symbol: self.symbol,
            price: self.last_price,
            volume_24h: self.volume,
            change_pct_24h: self.price_change_percent,
            high_24h: self.high_price,
            low_24h: self.low_price,
            timestamp: self.close_time,
        }
    }
}
