//! OHLCV candle models.

use serde::{Deserialize, Serialize};

use crate::KestrelError;
use crate::models::f64_lenient;

/// One OHLCV bar for a fixed time interval.
///
/// Windows are time-ordered by `open_time`. Expected invariants:
/// `high >= max(open, close)`, `low <= min(open, close)`,
/// `open_time < close_time`. Timestamps are epoch milliseconds; prices
/// and volume are doubles as received from the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Parses one REST kline row.
    ///
    /// Rows are heterogeneous JSON arrays
    /// `[open_time, "open", "high", "low", "close", "volume", close_time, ...]`
    /// with at least 7 elements; numeric fields arrive as strings or numbers.
    ///
    /// # Errors
    ///
    /// Returns [`KestrelError::MalformedKline`] if the row is not an array
    /// of the expected shape.
    pub fn from_rest_row(row: &serde_json::Value) -> crate::Result<Self> {
        let fields = row
            .as_array()
            .filter(|a| a.len() >= 7)
            .ok_or_else(|| KestrelError::MalformedKline(row.to_string()))?;

        let ts = |v: &serde_json::Value| {
            v.as_i64()
                .ok_or_else(|| KestrelError::MalformedKline(row.to_string()))
        };
        let num = |v: &serde_json::Value| {
            v.as_f64()
                .or_else(|| v.as_str().and_then(|s| s.parse::<f64>().ok()))
                .ok_or_else(|| KestrelError::MalformedKline(row.to_string()))
        };

        Ok(Self {
            open_time: ts(&fields[0])?,
            close_time: ts(&fields[6])?,
            open: num(&fields[1])?,
            high: num(&fields[2])?,
            low: num(&fields[3])?,
            close: num(&fields[4])?,
            volume: num(&fields[5])?,
        })
    }
}

/// A kline payload from the live stream.
///
/// Carries `is_closed` so the driver can restrict analysis windows to
/// completed candles.
#[derive(Debug, Clone, Deserialize)]
pub struct KlinePayload {
    #[serde(rename = "t")]
    pub open_time: i64,
    #[serde(rename = "T")]
    pub close_time: i64,
    #[serde(rename = "o", deserialize_with = "f64_lenient")]
    pub open: f64,
    #[serde(rename = "h", deserialize_with = "f64_lenient")]
    pub high: f64,
    #[serde(rename = "l", deserialize_with = "f64_lenient")]
    pub low: f64,
    #[serde(rename = "c", deserialize_with = "f64_lenient")]
    pub close: f64,
    #[serde(rename = "v", deserialize_with = "f64_lenient")]
    pub volume: f64,
    /// `true` once the candle's interval has elapsed.
    #[serde(rename = "x", default)]
    pub is_closed: bool,
}

impl KlinePayload {
    pub fn to_candle(&self) -> Candle {
        Candle {
            open_time: self.open_time,
            close_time: self.close_time,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}
