//! Trade channel models.

use serde::{Deserialize, Serialize};

use crate::models::f64_lenient;

/// A single executed trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub symbol: String,
    pub price: f64,
    pub quantity: f64,
    /// Epoch milliseconds.
    pub timestamp: i64,
    /// `true` when the aggressing side sold (buyer was the maker).
    pub taker_is_seller: bool,
}

/// A trade payload from the live stream.
#[derive(Debug, Clone, Deserialize)]
pub struct TradePayload {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "p", deserialize_with = "f64_lenient")]
    pub price: f64,
    #[serde(rename = "q", deserialize_with = "f64_lenient")]
    pub quantity: f64,
    #[serde(rename = "t", default)]
    pub timestamp: i64,
    /// `true` when the buyer was the market maker.
    #[serde(rename = "m", default)]
    pub buyer_is_maker: bool,
}

impl TradePayload {
    pub fn into_trade(self) -> Trade {
        Trade {
            symbol: self.symbol,
            price: self.price,
            quantity: self.quantity,
            timestamp: self.timestamp,
            taker_is_seller: self.buyer_is_maker,
        }
    }
}

/// A REST recent-trade row, used while polling.
///
/// The `id` field drives the monotonic de-duplication: only trades with
/// a strictly greater id than the last emitted one are forwarded.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestTrade {
    pub id: u64,
    #[serde(deserialize_with = "f64_lenient")]
    pub price: f64,
    #[serde(deserialize_with = "f64_lenient")]
    pub qty: f64,
    pub time: i64,
    #[serde(default)]
    pub is_buyer_maker: bool,
}

impl RestTrade {
    pub fn into_trade(self, symbol: &str) -> Trade {
        Trade {
            symbol: symbol.to_string(),
            price: self.price,
            quantity: self.qty,
            timestamp: self.time,
            taker_is_seller: self.is_buyer_maker,
        }
    }
}
