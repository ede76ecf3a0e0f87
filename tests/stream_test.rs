//! Stream client integration tests.
//!
//! Exercises the live/polling state machine against local stand-in
//! servers: a real WebSocket listener for the live path and a canned
//! HTTP responder for the REST polling fallback. No external network.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::SinkExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tungstenite::Message;

use kestrel::models::{EventKind, MarketEvent};
use kestrel::rest::MarketDataApi;
use kestrel::stream::dispatch::{RoutedEvent, is_blocked_notice, parse_message};
use kestrel::stream::{StreamClient, StreamMode};

/// A REST endpoint nothing listens on; polls against it just error out.
const DEAD_REST: &str = "http://127.0.0.1:9";

/// A WebSocket endpoint nothing listens on; connects fail immediately.
const DEAD_WS: &str = "ws://127.0.0.1:9";

/// Serves each queued JSON body to one HTTP request, repeating the last
/// body once the queue runs dry.
async fn spawn_http_server(bodies: Vec<String>) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind http listener");
    let addr = listener.local_addr().expect("local addr");

    let handle = tokio::spawn(async move {
        let mut queue: VecDeque<String> = bodies.into();
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;

            let body = if queue.len() > 1 {
                queue.pop_front().unwrap_or_default()
            } else {
                queue.front().cloned().unwrap_or_default()
            };
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (addr, handle)
}

/// Polls the client until its mode matches, panicking after ~5s.
async fn wait_for_mode(client: &StreamClient, mode: StreamMode) {
    for _ in 0..100 {
        if client.status().await.mode == mode {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("client never reached mode {mode:?}");
}

#[tokio::test]
async fn test_resubscribing_replaces_handler_without_second_channel() {
    let rest = MarketDataApi::new(DEAD_REST, "BTCUSDT").expect("valid symbol");
    let client = StreamClient::new(DEAD_WS, rest);

    let first = client.subscribe_ticker(|_| {}).await;
    let second = client.subscribe_ticker(|_| {}).await;
    assert_eq!(first, second);
    assert_eq!(first, "btcusdt@ticker");

    let status = client.status().await;
    assert_eq!(status.mode, StreamMode::Disconnected);
    assert_eq!(status.active_channels, vec!["btcusdt@ticker"]);
    assert!(status.polling_channels.is_empty());
}

#[tokio::test]
async fn test_connect_failure_falls_back_to_polling_all_channels() {
    let rest = MarketDataApi::new(DEAD_REST, "BTCUSDT").expect("valid symbol");
    let mut client = StreamClient::new(DEAD_WS, rest);

    client.subscribe_ticker(|_| {}).await;
    client.subscribe_trade(|_| {}).await;
    client.subscribe_kline("1m", |_| {}).await;

    client.connect().await;
    wait_for_mode(&client, StreamMode::Polling).await;

    let status = client.status().await;
    assert_eq!(
        status.active_channels,
        vec!["btcusdt@kline_1m", "btcusdt@ticker", "btcusdt@trade"]
    );
    // One polling loop per registered channel, no more.
    assert_eq!(status.polling_channels, status.active_channels);

    client.disconnect().await;
    let status = client.status().await;
    assert_eq!(status.mode, StreamMode::Disconnected);
    assert!(status.polling_channels.is_empty());
}

#[tokio::test]
async fn test_resubscribe_in_polling_mode_keeps_one_task() {
    let rest = MarketDataApi::new(DEAD_REST, "BTCUSDT").expect("valid symbol");
    let mut client = StreamClient::new(DEAD_WS, rest);

    client.connect().await;
    wait_for_mode(&client, StreamMode::Polling).await;

    client.subscribe_ticker(|_| {}).await;
    client.subscribe_ticker(|_| {}).await;

    let status = client.status().await;
    assert_eq!(status.active_channels, vec!["btcusdt@ticker"]);
    assert_eq!(status.polling_channels, vec!["btcusdt@ticker"]);

    client.disconnect().await;
}

#[tokio::test]
async fn test_unsubscribe_cancels_only_that_channel() {
    let rest = MarketDataApi::new(DEAD_REST, "BTCUSDT").expect("valid symbol");
    let mut client = StreamClient::new(DEAD_WS, rest);

    let ticker_key = client.subscribe_ticker(|_| {}).await;
    client.subscribe_trade(|_| {}).await;
    client.connect().await;
    wait_for_mode(&client, StreamMode::Polling).await;

    client.unsubscribe(&ticker_key).await;

    let status = client.status().await;
    assert_eq!(status.active_channels, vec!["btcusdt@trade"]);
    assert_eq!(status.polling_channels, vec!["btcusdt@trade"]);

    // Unknown channels are a no-op, not an error.
    client.unsubscribe("btcusdt@ticker").await;
    client.unsubscribe("nonsense@channel").await;

    client.disconnect().await;
}

#[tokio::test]
async fn test_polled_ticker_events_reach_the_handler() {
    let body = r#"{"symbol":"BTCUSDT","lastPrice":"43000.5","volume":"1000.1","priceChangePercent":"1.2","highPrice":"43500","lowPrice":"42000","closeTime":1700000000000}"#;
    let (addr, server) = spawn_http_server(vec![body.to_string()]).await;

    let rest = MarketDataApi::new(&format!("http://{addr}"), "BTCUSDT").expect("valid symbol");
    let mut client = StreamClient::new(DEAD_WS, rest);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    client
        .subscribe_ticker(move |event| {
            if let MarketEvent::Ticker(tick) = event {
                let _ = tx.send(tick);
            }
        })
        .await;

    client.connect().await;
    wait_for_mode(&client, StreamMode::Polling).await;

    let tick = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("tick within deadline")
        .expect("channel open");
    assert_eq!(tick.symbol, "BTCUSDT");
    assert_eq!(tick.price, 43000.5);

    client.disconnect().await;
    server.abort();
}

#[tokio::test]
async fn test_trade_polling_deduplicates_by_id() {
    let first = r#"[
        {"id": 5, "price": "100.0", "qty": "1.0", "time": 1, "isBuyerMaker": false},
        {"id": 6, "price": "101.0", "qty": "1.0", "time": 2, "isBuyerMaker": true}
    ]"#;
    let second = r#"[
        {"id": 6, "price": "101.0", "qty": "1.0", "time": 2, "isBuyerMaker": true},
        {"id": 7, "price": "102.0", "qty": "1.0", "time": 3, "isBuyerMaker": false}
    ]"#;
    let (addr, server) = spawn_http_server(vec![first.to_string(), second.to_string()]).await;

    let rest = MarketDataApi::new(&format!("http://{addr}"), "BTCUSDT").expect("valid symbol");
    let mut client = StreamClient::new(DEAD_WS, rest);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    client
        .subscribe_trade(move |event| {
            if let MarketEvent::Trade(trade) = event
                && let Ok(mut ids) = sink.lock()
            {
                ids.push(trade.timestamp);
            }
        })
        .await;

    client.connect().await;
    wait_for_mode(&client, StreamMode::Polling).await;

    // Trade polls run every second; give a few iterations time to land.
    tokio::time::sleep(Duration::from_millis(3500)).await;
    client.disconnect().await;
    server.abort();

    // Ids 5, 6, 7 each delivered exactly once, in order (trade
    // timestamps stand in for ids here: 1, 2, 3).
    let ids = seen.lock().expect("collector lock").clone();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_live_transport_close_switches_every_channel_to_polling() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ws listener");
    let addr = listener.local_addr().expect("local addr");
    let server = tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            // Complete the handshake, then die.
            let ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("ws handshake");
            drop(ws);
        }
    });

    let rest = MarketDataApi::new(DEAD_REST, "BTCUSDT").expect("valid symbol");
    let mut client = StreamClient::new(&format!("ws://{addr}"), rest);
    client.subscribe_ticker(|_| {}).await;
    client.subscribe_trade(|_| {}).await;

    client.connect().await;
    wait_for_mode(&client, StreamMode::Polling).await;

    let status = client.status().await;
    assert_eq!(status.active_channels, vec!["btcusdt@ticker", "btcusdt@trade"]);
    assert_eq!(status.polling_channels, status.active_channels);

    client.disconnect().await;
    let _ = server.await;
}

#[tokio::test]
async fn test_remote_blocked_notice_triggers_fallback() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ws listener");
    let addr = listener.local_addr().expect("local addr");
    let server = tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let mut ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("ws handshake");
            ws.send(Message::Text(r#"{"msg":"Blocked!"}"#.into()))
                .await
                .expect("send blocked notice");
            // Keep the socket open; the client must fall back anyway.
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
    });

    let rest = MarketDataApi::new(DEAD_REST, "BTCUSDT").expect("valid symbol");
    let mut client = StreamClient::new(&format!("ws://{addr}"), rest);
    client.subscribe_ticker(|_| {}).await;

    client.connect().await;
    wait_for_mode(&client, StreamMode::Polling).await;

    client.disconnect().await;
    server.abort();
}

#[tokio::test]
async fn test_live_enveloped_message_reaches_subscriber() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ws listener");
    let addr = listener.local_addr().expect("local addr");
    let server = tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            let mut ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("ws handshake");
            let envelope = r#"{"stream":"btcusdt@ticker","data":{"s":"BTCUSDT","c":"43000.5"}}"#;
            ws.send(Message::Text(envelope.into()))
                .await
                .expect("send ticker");
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
    });

    let rest = MarketDataApi::new(DEAD_REST, "BTCUSDT").expect("valid symbol");
    let mut client = StreamClient::new(&format!("ws://{addr}"), rest);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    client
        .subscribe_ticker(move |event| {
            if let MarketEvent::Ticker(tick) = event {
                let _ = tx.send(tick.price);
            }
        })
        .await;

    client.connect().await;

    let price = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("tick within deadline")
        .expect("channel open");
    assert_eq!(price, 43000.5);
    assert_eq!(client.status().await.mode, StreamMode::StreamingLive);

    client.disconnect().await;
    server.abort();
}

#[test]
fn test_parse_enveloped_messages_route_by_stream_key() {
    let ticker = serde_json::json!({
        "stream": "btcusdt@ticker",
        "data": {"s": "BTCUSDT", "c": "43000.5"}
    });
    match parse_message(&ticker) {
        Some(RoutedEvent::Keyed { stream, event }) => {
            assert_eq!(stream, "btcusdt@ticker");
            assert!(matches!(event, MarketEvent::Ticker(_)));
        }
        other => panic!("expected keyed ticker, got {other:?}"),
    }

    let kline = serde_json::json!({
        "stream": "btcusdt@kline_1m",
        "data": {
            "t": 1, "T": 2, "o": "1", "h": "2", "l": "0.5", "c": "1.5",
            "v": "10", "x": true
        }
    });
    assert!(matches!(
        parse_message(&kline),
        Some(RoutedEvent::Keyed { event: MarketEvent::Kline(_), .. })
    ));
}

#[test]
fn test_parse_bare_payloads_match_structurally() {
    let ticker = serde_json::json!({"s": "BTCUSDT", "c": "43000.5"});
    assert!(matches!(
        parse_message(&ticker),
        Some(RoutedEvent::Unkeyed { kind: EventKind::Ticker, .. })
    ));

    let trade = serde_json::json!({"s": "BTCUSDT", "p": "43000.5", "q": "0.1"});
    assert!(matches!(
        parse_message(&trade),
        Some(RoutedEvent::Unkeyed { kind: EventKind::Trade, .. })
    ));
}

#[test]
fn test_parse_drops_open_klines_and_unknown_shapes() {
    let open_kline = serde_json::json!({
        "stream": "btcusdt@kline_1m",
        "data": {
            "t": 1, "T": 2, "o": "1", "h": "2", "l": "0.5", "c": "1.5",
            "v": "10", "x": false
        }
    });
    assert!(parse_message(&open_kline).is_none());

    assert!(parse_message(&serde_json::json!({"hello": "world"})).is_none());
    assert!(parse_message(&serde_json::json!({"id": 1, "code": 0})).is_none());
}

#[test]
fn test_blocked_notice_detection() {
    assert!(is_blocked_notice(&serde_json::json!({"msg": "Blocked!"})));
    assert!(is_blocked_notice(
        &serde_json::json!({"code": 0, "msg": "connection blocked by provider"})
    ));
    assert!(!is_blocked_notice(&serde_json::json!({"msg": "PONG"})));
    assert!(!is_blocked_notice(&serde_json::json!({"s": "BTCUSDT"})));
}
