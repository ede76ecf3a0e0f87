//! Public market-data REST queries.
//!
//! [`MarketDataApi`] wraps the exchange's unauthenticated v3 endpoints.
//! It is the data source for the stream client's polling fallback and
//! for building candle windows when the live stream has not accumulated
//! enough history.

use tracing::debug;

use crate::Result;
use crate::models::candle::Candle;
use crate::models::ticker::Ticker24hr;
use crate::models::trade::RestTrade;

/// The exchange caps kline and trade queries at 1000 rows.
const MAX_KLINE_LIMIT: u32 = 1000;
const MAX_TRADE_LIMIT: u32 = 1000;

/// Client for the exchange's public REST market-data endpoints.
#[derive(Debug, Clone)]
pub struct MarketDataApi {
    http: reqwest::Client,
    base_url: String,
    symbol: String,
}

impl MarketDataApi {
    /// Creates a client for one trading pair.
    ///
    /// # Errors
    ///
    /// Returns [`KestrelError::InvalidSymbol`](crate::KestrelError::InvalidSymbol)
    /// for a malformed symbol.
    pub fn new(base_url: &str, symbol: &str) -> Result<Self> {
        crate::config::validate_symbol(symbol)?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            symbol: symbol.to_uppercase(),
        })
    }

    /// Symbol this client queries.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Fetches the current last price.
    ///
    /// # Errors
    ///
    /// Returns [`KestrelError::Http`](crate::KestrelError::Http) on request
    /// failure or a non-success status.
    pub async fn price(&self) -> Result<f64> {
        #[derive(serde::Deserialize)]
        struct PriceResponse {
            #[serde(deserialize_with = "crate::models::f64_lenient")]
            price: f64,
        }

        let url = format!("{}/api/v3/ticker/price", self.base_url);
        let response: PriceResponse = self
            .http
            .get(url)
            .query(&[("symbol", self.symbol.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.price)
    }

    /// Fetches the 24h ticker snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`KestrelError::Http`](crate::KestrelError::Http) on request
    /// failure or a non-success status.
    pub async fn ticker_24hr(&self) -> Result<Ticker24hr> {
        let url = format!("{}/api/v3/ticker/24hr", self.base_url);
        let ticker = self
            .http
            .get(url)
            .query(&[("symbol", self.symbol.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(ticker)
    }

    /// Fetches the most recent trades, newest last.
    ///
    /// # Errors
    ///
    /// Returns [`KestrelError::Http`](crate::KestrelError::Http) on request
    /// failure or a non-success status.
    pub async fn recent_trades(&self, limit: u32) -> Result<Vec<RestTrade>> {
        let url = format!("{}/api/v3/trades", self.base_url);
        let trades: Vec<RestTrade> = self
            .http
            .get(url)
            .query(&[
                ("symbol", self.symbol.as_str()),
                ("limit", &limit.min(MAX_TRADE_LIMIT).to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(count = trades.len(), "Fetched recent trades");
        Ok(trades)
    }

    /// Fetches up to `limit` klines for the given interval, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`KestrelError::Http`](crate::KestrelError::Http) on request
    /// failure, or [`KestrelError::MalformedKline`](crate::KestrelError::MalformedKline)
    /// if a row does not have the expected array shape.
    pub async fn klines(&self, interval: &str, limit: u32) -> Result<Vec<Candle>> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let rows: Vec<serde_json::Value> = self
            .http
            .get(url)
            .query(&[
                ("symbol", self.symbol.as_str()),
                ("interval", interval),
                ("limit", &limit.min(MAX_KLINE_LIMIT).to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in &rows {
            candles.push(Candle::from_rest_row(row)?);
        }

        debug!(count = candles.len(), interval, "Fetched klines");
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_symbol() {
        assert!(MarketDataApi::new("https://api.mexc.com", "BTC/USDT").is_err());
        assert!(MarketDataApi::new("https://api.mexc.com", "").is_err());
    }

    #[test]
    fn uppercases_symbol_and_trims_base_url() {
        let api = MarketDataApi::new("https://api.mexc.com/", "btcusdt").unwrap();
        assert_eq!(api.symbol(), "BTCUSDT");
        assert_eq!(api.base_url, "https://api.mexc.com");
    }
}
