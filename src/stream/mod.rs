//! Live market data stream client with REST polling fallback.
//!
//! [`StreamClient`] owns the connection to the exchange's WebSocket
//! stream and the registry of channel subscriptions. When the stream
//! cannot be established, reports itself blocked, or dies mid-session,
//! every active subscription is transparently switched to a REST
//! polling loop that re-synthesizes the same event shapes; the caller
//! never sees a transport error, only a mode change in [`StreamClient::status`].
//!
//! This module is organized by concern:
//! - [`dispatch`] - one parsing step from inbound JSON to [`MarketEvent`]
//! - [`polling`] - per-channel REST polling loops for fallback mode

pub mod dispatch;
mod polling;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use tungstenite::Message;

use crate::models::{EventKind, MarketEvent, SubscribeRequest, UnsubscribeRequest, channel_key};
use crate::rest::MarketDataApi;
use dispatch::RoutedEvent;

/// Write half of the live stream connection.
pub type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Read half of the live stream connection.
pub type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Callback invoked with each event delivered on a channel.
pub type EventHandler = Arc<dyn Fn(MarketEvent) + Send + Sync>;

/// Bounded time to establish the live stream before falling back.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Operating mode of the stream client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StreamMode {
    Disconnected,
    Connecting,
    StreamingLive,
    Polling,
}

impl StreamMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamMode::Disconnected => "disconnected",
            StreamMode::Connecting => "connecting",
            StreamMode::StreamingLive => "streaming",
            StreamMode::Polling => "polling",
        }
    }
}

/// Expected update cadence per event kind, for operator visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CadenceDescription {
    pub ticker: &'static str,
    pub trades: &'static str,
    pub klines: &'static str,
}

/// Snapshot of the client's operating state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamStatus {
    pub mode: StreamMode,
    /// Channel keys with a registered handler, sorted.
    pub active_channels: Vec<String>,
    /// Channels currently served by a polling loop, sorted.
    pub polling_channels: Vec<String>,
    pub cadence: CadenceDescription,
}

/// One registered channel: its event kind, handler, and (in fallback
/// mode) the polling task serving it.
struct Subscription {
    kind: EventKind,
    interval: Option<String>,
    handler: EventHandler,
    poll_task: Option<JoinHandle<()>>,
}

/// State shared between the client handle and the receive loop.
struct Shared {
    rest: MarketDataApi,
    mode: Mutex<StreamMode>,
    registry: Mutex<HashMap<String, Subscription>>,
    writer: Mutex<Option<WsWriter>>,
}

/// Market data stream client for a single trading pair.
pub struct StreamClient {
    shared: Arc<Shared>,
    websocket_url: String,
    symbol: String,
    reader_task: Option<JoinHandle<()>>,
    request_id: AtomicU64,
}

impl StreamClient {
    /// Creates a client; the symbol is taken from the REST client, which
    /// validated it at construction.
    pub fn new(websocket_url: &str, rest: MarketDataApi) -> Self {
        let symbol = rest.symbol().to_string();
        Self {
            shared: Arc::new(Shared {
                rest,
                mode: Mutex::new(StreamMode::Disconnected),
                registry: Mutex::new(HashMap::new()),
                writer: Mutex::new(None),
            }),
            websocket_url: websocket_url.to_string(),
            symbol,
            reader_task: None,
            request_id: AtomicU64::new(1),
        }
    }

    /// Attempts the live stream connection, falling back to polling on
    /// failure or timeout.
    ///
    /// Never surfaces a transport error: a failed attempt leaves the
    /// client in polling mode with every registered channel served.
    pub async fn connect(&mut self) {
        {
            *self.shared.mode.lock().await = StreamMode::Connecting;
        }
        info!(url = %self.websocket_url, "Connecting to market data stream");

        match tokio::time::timeout(CONNECT_TIMEOUT, connect_async(&self.websocket_url)).await {
            Ok(Ok((ws_stream, _))) => {
                let (writer, reader) = ws_stream.split();
                {
                    *self.shared.writer.lock().await = Some(writer);
                }
                {
                    *self.shared.mode.lock().await = StreamMode::StreamingLive;
                }
                info!("Market data stream connected");

                // The live stream now serves every channel; stop any
                // polling loops left over from a previous fallback, and
                // announce channels registered before the connection.
                let keys: Vec<String> = {
                    let mut registry = self.shared.registry.lock().await;
                    for subscription in registry.values_mut() {
                        if let Some(task) = subscription.poll_task.take() {
                            task.abort();
                        }
                    }
                    registry.keys().cloned().collect()
                };
                for key in keys {
                    self.send_subscribe(&key).await;
                }

                let shared = Arc::clone(&self.shared);
                self.reader_task = Some(tokio::spawn(receive_loop(shared, reader)));
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Stream connection failed");
                enter_polling(&self.shared).await;
            }
            Err(_) => {
                warn!(
                    timeout_secs = CONNECT_TIMEOUT.as_secs(),
                    "Stream connection timed out"
                );
                enter_polling(&self.shared).await;
            }
        }
    }

    /// Subscribes to last-price ticker updates.
    ///
    /// Returns the channel key. Idempotent per key: re-subscribing
    /// replaces the handler.
    pub async fn subscribe_ticker<F>(&self, handler: F) -> String
    where
        F: Fn(MarketEvent) + Send + Sync + 'static,
    {
        self.subscribe_channel(EventKind::Ticker, None, Arc::new(handler))
            .await
    }

    /// Subscribes to individual trade executions.
    pub async fn subscribe_trade<F>(&self, handler: F) -> String
    where
        F: Fn(MarketEvent) + Send + Sync + 'static,
    {
        self.subscribe_channel(EventKind::Trade, None, Arc::new(handler))
            .await
    }

    /// Subscribes to completed candles for the given interval.
    pub async fn subscribe_kline<F>(&self, interval: &str, handler: F) -> String
    where
        F: Fn(MarketEvent) + Send + Sync + 'static,
    {
        self.subscribe_channel(EventKind::Kline, Some(interval.to_string()), Arc::new(handler))
            .await
    }

    async fn subscribe_channel(
        &self,
        kind: EventKind,
        interval: Option<String>,
        handler: EventHandler,
    ) -> String {
        let key = channel_key(&self.symbol, kind, interval.as_deref());

        {
            let mut registry = self.shared.registry.lock().await;
            let previous = registry.insert(
                key.clone(),
                Subscription {
                    kind,
                    interval,
                    handler,
                    poll_task: None,
                },
            );
            if let Some(previous) = previous {
                if let Some(task) = previous.poll_task {
                    task.abort();
                }
                debug!(channel = %key, "Replaced existing subscription handler");
            }
        }

        let mode = { *self.shared.mode.lock().await };
        match mode {
            StreamMode::StreamingLive => self.send_subscribe(&key).await,
            StreamMode::Polling => start_polling_for(&self.shared, &key).await,
            // Takes effect when connect() announces registered channels.
            StreamMode::Disconnected | StreamMode::Connecting => {}
        }

        info!(channel = %key, mode = mode.as_str(), "Subscribed to channel");
        key
    }

    /// Removes a channel's handler and cancels its polling loop.
    ///
    /// A no-op for unregistered channels. Sends an unsubscribe control
    /// message only while streaming live.
    pub async fn unsubscribe(&self, channel_key: &str) {
        let removed = {
            self.shared.registry.lock().await.remove(channel_key)
        };
        let Some(subscription) = removed else {
            debug!(channel = %channel_key, "Unsubscribe for unregistered channel ignored");
            return;
        };

        if let Some(task) = subscription.poll_task {
            task.abort();
        }

        if *self.shared.mode.lock().await == StreamMode::StreamingLive {
            let request = UnsubscribeRequest::new(channel_key, self.next_request_id());
            self.send_control(&request).await;
        }

        info!(channel = %channel_key, "Unsubscribed from channel");
    }

    /// Cancels all polling loops and the receive loop, closes the live
    /// transport, and resets to disconnected.
    pub async fn disconnect(&mut self) {
        {
            *self.shared.mode.lock().await = StreamMode::Disconnected;
        }

        if let Some(task) = self.reader_task.take() {
            task.abort();
        }

        {
            let mut registry = self.shared.registry.lock().await;
            for subscription in registry.values_mut() {
                if let Some(task) = subscription.poll_task.take() {
                    task.abort();
                }
            }
        }

        {
            let mut writer = self.shared.writer.lock().await;
            if let Some(mut w) = writer.take() {
                let _ = w.close().await;
            }
        }

        info!("Stream client disconnected");
    }

    /// Current mode, active channels, and expected update cadence.
    pub async fn status(&self) -> StreamStatus {
        let mode = { *self.shared.mode.lock().await };
        let registry = self.shared.registry.lock().await;

        let mut active_channels: Vec<String> = registry.keys().cloned().collect();
        active_channels.sort();

        let mut polling_channels: Vec<String> = registry
            .iter()
            .filter(|(_, s)| s.poll_task.is_some())
            .map(|(k, _)| k.clone())
            .collect();
        polling_channels.sort();

        StreamStatus {
            mode,
            active_channels,
            polling_channels,
            cadence: cadence_for(mode),
        }
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn send_subscribe(&self, key: &str) {
        let request = SubscribeRequest::new(key, self.next_request_id());
        self.send_control(&request).await;
    }

    /// Sends a control envelope over the live transport. Send failures
    /// are logged, not raised; the receive loop owns failure handling.
    async fn send_control<T: serde::Serialize>(&self, request: &T) {
        let json = match serde_json::to_string(request) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to encode control message");
                return;
            }
        };

        let mut writer = self.shared.writer.lock().await;
        if let Some(w) = writer.as_mut() {
            if let Err(e) = w.send(Message::Text(json.into())).await {
                warn!(error = %e, "Failed to send control message");
            }
        }
    }
}

/// Expected cadence per event kind for the given mode.
fn cadence_for(mode: StreamMode) -> CadenceDescription {
    match mode {
        StreamMode::Polling => CadenceDescription {
            ticker: polling::poll_cadence(EventKind::Ticker),
            trades: polling::poll_cadence(EventKind::Trade),
            klines: polling::poll_cadence(EventKind::Kline),
        },
        _ => CadenceDescription {
            ticker: "~100ms (price changes)",
            trades: "immediate (every execution)",
            klines: "on candle close",
        },
    }
}

/// Reads and dispatches live stream messages until the transport dies.
///
/// Malformed or unrecognized messages are dropped after logging. On
/// closure, read error, or a remote blocked notice the loop transitions
/// the client to polling without losing any subscription.
async fn receive_loop(shared: Arc<Shared>, mut reader: WsReader) {
    while let Some(message) = reader.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let value: serde_json::Value = match serde_json::from_str(&text) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(error = %e, "Dropping malformed stream message");
                        continue;
                    }
                };

                if dispatch::is_blocked_notice(&value) {
                    warn!("Remote reports the stream is blocked");
                    break;
                }

                match dispatch::parse_message(&value) {
                    Some(routed) => deliver(&shared, routed).await,
                    None => debug!("Dropping unrecognized stream message"),
                }
            }
            Ok(Message::Close(_)) => {
                warn!("Stream closed by remote");
                break;
            }
            Ok(_) => {} // ping/pong/binary frames
            Err(e) => {
                warn!(error = %e, "Stream read error");
                break;
            }
        }
    }

    // disconnect() flips the mode before aborting this task, so a live
    // mode here means the transport died on its own.
    let was_live = { *shared.mode.lock().await == StreamMode::StreamingLive };
    if was_live {
        enter_polling(&shared).await;
    }
}

/// Routes one parsed event to its subscription handler.
async fn deliver(shared: &Shared, routed: RoutedEvent) {
    let handler = {
        let registry = shared.registry.lock().await;
        match &routed {
            RoutedEvent::Keyed { stream, .. } => {
                registry.get(stream).map(|s| Arc::clone(&s.handler))
            }
            RoutedEvent::Unkeyed { kind, .. } => {
                let suffix = format!("@{}", kind.as_str());
                registry
                    .iter()
                    .find(|(key, _)| key.ends_with(&suffix))
                    .map(|(_, s)| Arc::clone(&s.handler))
            }
        }
    };

    match handler {
        Some(handler) => handler(routed.into_event()),
        None => debug!("No subscription for stream message"),
    }
}

impl RoutedEvent {
    fn into_event(self) -> MarketEvent {
        match self {
            RoutedEvent::Keyed { event, .. } => event,
            RoutedEvent::Unkeyed { event, .. } => event,
        }
    }
}

/// Switches the client to polling mode, starting one loop per channel
/// that does not already have one. Idempotent.
async fn enter_polling(shared: &Arc<Shared>) {
    {
        let mut mode = shared.mode.lock().await;
        if *mode == StreamMode::Polling {
            return;
        }
        *mode = StreamMode::Polling;
    }

    {
        let mut writer = shared.writer.lock().await;
        writer.take();
    }

    let mut registry = shared.registry.lock().await;
    for (key, subscription) in registry.iter_mut() {
        if subscription.poll_task.is_none() {
            subscription.poll_task = Some(polling::spawn_poll_task(
                shared.rest.clone(),
                key.clone(),
                subscription.kind,
                subscription.interval.clone(),
                Arc::clone(&subscription.handler),
            ));
        }
    }

    warn!(
        channels = registry.len(),
        "Stream unavailable - falling back to REST polling"
    );
}

/// Starts the polling loop for one channel if it is not already running.
async fn start_polling_for(shared: &Arc<Shared>, key: &str) {
    let mut registry = shared.registry.lock().await;
    if let Some(subscription) = registry.get_mut(key)
        && subscription.poll_task.is_none()
    {
        subscription.poll_task = Some(polling::spawn_poll_task(
            shared.rest.clone(),
            key.to_string(),
            subscription.kind,
            subscription.interval.clone(),
            Arc::clone(&subscription.handler),
        ));
    }
}
