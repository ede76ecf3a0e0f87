//! REST polling loops for the fallback mode.
//!
//! Each actively polled channel runs one task that re-synthesizes the
//! live stream's event shapes from REST responses. Loops retry
//! indefinitely: a failed iteration is skipped and the loop sleeps a
//! longer backoff before trying again. Tasks stop only by abort from
//! unsubscribe or disconnect, checked at the sleep boundaries.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::models::trade::RestTrade;
use crate::models::{EventKind, MarketEvent};
use crate::rest::MarketDataApi;
use crate::stream::EventHandler;

/// Ticker snapshots change continuously; poll fast.
const TICKER_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Trades are polled fastest to keep the id de-dup window small.
const TRADE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Candles only change on close; a slow poll is enough.
const KLINE_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Sleep after a failed poll iteration before retrying.
const ERROR_BACKOFF: Duration = Duration::from_secs(10);

/// Trades fetched per poll iteration.
const TRADE_FETCH_LIMIT: u32 = 50;

/// Human-readable cadence for one event kind in polling mode.
pub(crate) fn poll_cadence(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Ticker => "~2s (polled)",
        EventKind::Trade => "~1s (polled)",
        EventKind::Kline => "~10s (polled)",
    }
}

/// Spawns the polling loop for one channel.
pub(crate) fn spawn_poll_task(
    rest: MarketDataApi,
    channel_key: String,
    kind: EventKind,
    interval: Option<String>,
    handler: EventHandler,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(channel = %channel_key, "Polling loop started");
        match kind {
            EventKind::Ticker => poll_ticker(rest, channel_key, handler).await,
            EventKind::Trade => poll_trades(rest, channel_key, handler).await,
            EventKind::Kline => {
                let interval = interval.unwrap_or_else(|| "1m".to_string());
                poll_klines(rest, channel_key, interval, handler).await;
            }
        }
    })
}

/// Re-synthesizes tick events from the 24h ticker endpoint.
async fn poll_ticker(rest: MarketDataApi, channel_key: String, handler: EventHandler) {
    loop {
        match rest.ticker_24hr().await {
            Ok(ticker) => {
                handler(MarketEvent::Ticker(ticker.into_tick()));
                tokio::time::sleep(TICKER_POLL_INTERVAL).await;
            }
            Err(e) => {
                warn!(channel = %channel_key, error = %e, "Ticker poll failed, backing off");
                tokio::time::sleep(ERROR_BACKOFF).await;
            }
        }
    }
}

/// Re-synthesizes trade events from the recent-trades endpoint.
///
/// Tracks the highest trade id already emitted and forwards only trades
/// with a strictly greater id, so overlapping polls never repeat a
/// trade. The very first poll emits everything it fetched once.
async fn poll_trades(rest: MarketDataApi, channel_key: String, handler: EventHandler) {
    let mut last_id: Option<u64> = None;

    loop {
        match rest.recent_trades(TRADE_FETCH_LIMIT).await {
            Ok(trades) => {
                for trade in fresh_trades(trades, &mut last_id) {
                    handler(MarketEvent::Trade(trade.into_trade(rest.symbol())));
                }
                tokio::time::sleep(TRADE_POLL_INTERVAL).await;
            }
            Err(e) => {
                warn!(channel = %channel_key, error = %e, "Trade poll failed, backing off");
                tokio::time::sleep(ERROR_BACKOFF).await;
            }
        }
    }
}

/// Filters a fetched batch down to unseen trades, ascending by id, and
/// advances the de-duplication watermark.
fn fresh_trades(mut trades: Vec<RestTrade>, last_id: &mut Option<u64>) -> Vec<RestTrade> {
    trades.sort_by_key(|t| t.id);
    trades.dedup_by_key(|t| t.id);
    trades.retain(|t| last_id.is_none_or(|id| t.id > id));
    if let Some(newest) = trades.last() {
        *last_id = Some(newest.id);
    }
    trades
}

/// Re-synthesizes closed-candle events from the klines endpoint.
///
/// Fetches the two most recent candles (the last one is still forming)
/// and emits the completed one when its open time advances.
async fn poll_klines(
    rest: MarketDataApi,
    channel_key: String,
    interval: String,
    handler: EventHandler,
) {
    let mut last_open_time: Option<i64> = None;

    loop {
        match rest.klines(&interval, 2).await {
            Ok(candles) if candles.len() >= 2 => {
                let closed = candles[candles.len() - 2];
                if last_open_time.is_none_or(|t| closed.open_time > t) {
                    last_open_time = Some(closed.open_time);
                    handler(MarketEvent::Kline(closed));
                }
                tokio::time::sleep(KLINE_POLL_INTERVAL).await;
            }
            Ok(_) => {
                debug!(channel = %channel_key, "Not enough klines yet");
                tokio::time::sleep(KLINE_POLL_INTERVAL).await;
            }
            Err(e) => {
                warn!(channel = %channel_key, error = %e, "Kline poll failed, backing off");
                tokio::time::sleep(ERROR_BACKOFF).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(id: u64) -> RestTrade {
        RestTrade {
            id,
            price: 100.0,
            qty: 1.0,
            time: id as i64,
            is_buyer_maker: false,
        }
    }

    #[test]
    fn first_poll_emits_all_trades_once() {
        let mut last_id = None;
        let fresh = fresh_trades(vec![trade(5), trade(6)], &mut last_id);
        assert_eq!(fresh.iter().map(|t| t.id).collect::<Vec<_>>(), vec![5, 6]);
        assert_eq!(last_id, Some(6));
    }

    #[test]
    fn overlapping_polls_do_not_repeat_ids() {
        let mut last_id = None;

        let first = fresh_trades(vec![trade(5), trade(6)], &mut last_id);
        let second = fresh_trades(vec![trade(6), trade(7)], &mut last_id);

        let mut emitted: Vec<u64> = first.iter().map(|t| t.id).collect();
        emitted.extend(second.iter().map(|t| t.id));
        assert_eq!(emitted, vec![5, 6, 7]);
    }

    #[test]
    fn unordered_batch_is_emitted_ascending() {
        let mut last_id = None;
        let fresh = fresh_trades(vec![trade(9), trade(7), trade(8)], &mut last_id);
        assert_eq!(fresh.iter().map(|t| t.id).collect::<Vec<_>>(), vec![7, 8, 9]);
    }

    #[test]
    fn duplicate_ids_within_one_batch_collapse() {
        let mut last_id = None;
        let fresh = fresh_trades(vec![trade(6), trade(6)], &mut last_id);
        assert_eq!(fresh.len(), 1);
    }
}
