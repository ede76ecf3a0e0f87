//! Streaming market data client and indicator/signal engine.
//!
//! Maintains a live feed of ticker, trade, and kline events for a single
//! trading pair (degrading to REST polling when the stream is blocked),
//! derives a battery of technical indicators over a rolling candle
//! window, and reduces them to a scored LONG/SHORT/HOLD decision.

pub mod analysis;
pub mod config;
pub mod error;
pub mod models;
pub mod rest;
pub mod strategy;
pub mod stream;

pub use error::{KestrelError, Result};
