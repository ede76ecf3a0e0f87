//! Single parsing step for inbound stream messages.
//!
//! Every message becomes a [`MarketEvent`] plus routing information, or
//! is dropped. Enveloped messages (`{stream, data}`) route by exact
//! stream key; bare payloads are matched structurally (a last-price
//! field plus symbol means ticker, price plus quantity plus symbol
//! means trade) and routed by event kind.

use serde_json::Value;

use crate::models::candle::KlinePayload;
use crate::models::ticker::TickerPayload;
use crate::models::trade::TradePayload;
use crate::models::{EventKind, MarketEvent};

/// A parsed message with its routing hint.
#[derive(Debug)]
pub enum RoutedEvent {
    /// Enveloped message carrying its exact channel key.
    Keyed { stream: String, event: MarketEvent },
    /// Bare payload matched by shape; routed to the first subscription
    /// of the detected kind.
    Unkeyed { kind: EventKind, event: MarketEvent },
}

/// Returns `true` for a remote notice that the stream is blocked,
/// which triggers the polling fallback.
pub fn is_blocked_notice(value: &Value) -> bool {
    value
        .get("msg")
        .and_then(|m| m.as_str())
        .is_some_and(|m| m.to_lowercase().contains("blocked"))
}

/// Parses one inbound JSON message.
///
/// Returns `None` for unrecognized shapes, control acknowledgements,
/// and klines that have not closed yet; the caller logs and drops them.
pub fn parse_message(value: &Value) -> Option<RoutedEvent> {
    // Enveloped: {"stream": "...", "data": {...}}
    if let (Some(stream), Some(data)) = (
        value.get("stream").and_then(|s| s.as_str()),
        value.get("data"),
    ) {
        let event = parse_payload_for_stream(stream, data)?;
        return Some(RoutedEvent::Keyed {
            stream: stream.to_string(),
            event,
        });
    }

    // Bare ticker: last price + symbol.
    if value.get("c").is_some() && value.get("s").is_some() {
        let payload: TickerPayload = serde_json::from_value(value.clone()).ok()?;
        return Some(RoutedEvent::Unkeyed {
            kind: EventKind::Ticker,
            event: MarketEvent::Ticker(payload.into_tick()),
        });
    }

    // Bare trade: price + quantity + symbol.
    if value.get("p").is_some() && value.get("q").is_some() && value.get("s").is_some() {
        let payload: TradePayload = serde_json::from_value(value.clone()).ok()?;
        return Some(RoutedEvent::Unkeyed {
            kind: EventKind::Trade,
            event: MarketEvent::Trade(payload.into_trade()),
        });
    }

    None
}

/// Parses an enveloped payload according to its stream key suffix.
fn parse_payload_for_stream(stream: &str, data: &Value) -> Option<MarketEvent> {
    if stream.contains("@ticker") {
        let payload: TickerPayload = serde_json::from_value(data.clone()).ok()?;
        return Some(MarketEvent::Ticker(payload.into_tick()));
    }

    if stream.contains("@trade") {
        let payload: TradePayload = serde_json::from_value(data.clone()).ok()?;
        return Some(MarketEvent::Trade(payload.into_trade()));
    }

    if stream.contains("@kline") {
        let payload: KlinePayload = serde_json::from_value(data.clone()).ok()?;
        // Only completed candles reach subscribers.
        if !payload.is_closed {
            return None;
        }
        return Some(MarketEvent::Kline(payload.to_candle()));
    }

    None
}
