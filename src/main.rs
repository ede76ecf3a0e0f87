use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, warn};

use kestrel::KestrelError;
use kestrel::analysis::MarketAnalysis;
use kestrel::config::fetch_config;
use kestrel::models::MarketEvent;
use kestrel::rest::MarketDataApi;
use kestrel::strategy::Strategy;
use kestrel::stream::StreamClient;

/// Full analysis cadence; the stream keeps prices fresh in between.
const ANALYSIS_INTERVAL: Duration = Duration::from_secs(60);

/// Candles fetched per analysis window.
const ANALYSIS_WINDOW: u32 = 200;

#[tokio::main]
async fn main() -> Result<(), KestrelError> {
    // Initialize tracing subscriber for logging output.
    tracing_subscriber::fmt::init();

    let config = fetch_config()?;
    let rest = MarketDataApi::new(&config.exchange.rest_url, &config.symbol)?;
    let mut stream = StreamClient::new(&config.exchange.websocket_url, rest.clone());

    // Latest price seen on any channel, shared with the analysis loop.
    let last_price = Arc::new(Mutex::new(None::<f64>));

    let price_from_ticks = Arc::clone(&last_price);
    stream
        .subscribe_ticker(move |event| {
            if let MarketEvent::Ticker(tick) = event
                && let Ok(mut price) = price_from_ticks.lock()
            {
                *price = Some(tick.price);
            }
        })
        .await;

    let price_from_trades = Arc::clone(&last_price);
    stream
        .subscribe_trade(move |event| {
            if let MarketEvent::Trade(trade) = event
                && let Ok(mut price) = price_from_trades.lock()
            {
                *price = Some(trade.price);
            }
        })
        .await;

    stream.connect().await;

    let status = stream.status().await;
    info!(
        mode = status.mode.as_str(),
        channels = status.active_channels.len(),
        "Stream client ready"
    );

    tokio::select! {
        () = analysis_loop(rest, config.kline_interval.clone(), last_price) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    stream.disconnect().await;
    Ok(())
}

/// Fetches a fresh candle window on a fixed cadence and runs both the
/// full analysis pipeline and the fast-path strategy over it.
async fn analysis_loop(
    rest: MarketDataApi,
    kline_interval: String,
    last_price: Arc<Mutex<Option<f64>>>,
) {
    let mut analysis = MarketAnalysis::new();
    let mut strategy = Strategy::new();

    loop {
        match rest.klines(&kline_interval, ANALYSIS_WINDOW).await {
            Ok(window) => {
                let streamed_price = last_price.lock().ok().and_then(|guard| *guard);
                let current_price = streamed_price
                    .or_else(|| window.last().map(|c| c.close))
                    .unwrap_or(0.0);

                match analysis.analyze(&window, current_price) {
                    Ok(result) => info!(
                        action = result.decision.action.as_str(),
                        confidence = result.decision.confidence,
                        reasons = result.decision.reasons.len(),
                        "Market analysis"
                    ),
                    Err(e) => warn!(error = %e, "Analysis skipped"),
                }

                strategy.calculate_indicators(&window);
                let check = strategy.should_trade();
                if check.should_trade
                    && let Some(action) = check.action
                {
                    info!(
                        action = action.as_str(),
                        confidence = check.confidence,
                        "Fast-path signal"
                    );
                }
            }
            Err(e) => warn!(error = %e, "Failed to fetch candle window"),
        }

        tokio::time::sleep(ANALYSIS_INTERVAL).await;
    }
}
