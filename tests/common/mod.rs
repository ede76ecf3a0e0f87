//! Shared helpers for building synthetic candle windows.

#![allow(dead_code)]

use kestrel::models::candle::Candle;

pub fn candle(i: usize, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
    Candle {
        open_time: i as i64 * 60_000,
        close_time: (i as i64 + 1) * 60_000 - 1,
        open,
        high,
        low,
        close,
        volume,
    }
}

/// All candles identical OHLC: no gains, no losses, flat volume.
pub fn flat_window(len: usize, price: f64) -> Vec<Candle> {
    (0..len)
        .map(|i| candle(i, price, price, price, price, 5.0))
        .collect()
}

/// Close rises 0.5% per candle from 100, volume flat.
pub fn ascending_window(len: usize) -> Vec<Candle> {
    let mut close = 100.0;
    (0..len)
        .map(|i| {
            let open = close;
            close *= 1.005;
            candle(i, open, close, open, close, 5.0)
        })
        .collect()
}

/// Close falls 0.5% per candle from 100, volume flat.
pub fn descending_window(len: usize) -> Vec<Candle> {
    let mut close = 100.0;
    (0..len)
        .map(|i| {
            let open = close;
            close *= 0.995;
            candle(i, open, open, close, close, 5.0)
        })
        .collect()
}

/// Deterministic pseudo-random walk for bounds checks. Same seed, same
/// window.
pub fn noisy_window(len: usize, seed: u64) -> Vec<Candle> {
    let mut state = seed;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) as f64 / (u64::MAX >> 33) as f64
    };

    let mut close = 100.0;
    (0..len)
        .map(|i| {
            let open = close;
            let change = (next() - 0.5) * 0.04;
            close = (close * (1.0 + change)).max(1.0);
            let high = open.max(close) * (1.0 + next() * 0.002);
            let low = open.min(close) * (1.0 - next() * 0.002);
            let volume = 1.0 + next() * 10.0;
            candle(i, open, high, low, close, volume)
        })
        .collect()
}
