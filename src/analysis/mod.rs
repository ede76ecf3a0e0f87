//! Market analysis pipeline: indicators, levels, patterns, decision.
//!
//! [`MarketAnalysis`] runs one full analysis cycle over a candle window
//! and retains a bounded history of the results. The computations
//! themselves ([`calculate_indicators`], [`decide`], and the detectors)
//! are synchronous, side-effect-free functions usable on their own.

pub mod decision;
pub mod indicators;
pub mod levels;
pub mod patterns;

use std::collections::VecDeque;

use serde::Serialize;
use tracing::info;

use crate::KestrelError;
use crate::models::candle::Candle;

pub use decision::{Action, Decision, decide};
pub use indicators::{IndicatorSet, calculate_indicators};
pub use levels::{LevelSet, detect_levels};
pub use patterns::{
    MarketStructure, PatternReport, Trend, VolumeAnalysis, analyze_structure, analyze_volume,
    detect_patterns, detect_trend,
};

/// A full cycle needs enough candles for the slowest indicator (SMA 50).
const MIN_WINDOW: usize = 50;

/// Analyses retained before FIFO eviction.
const HISTORY_CAPACITY: usize = 100;

/// Analyses exposed by the recent-history accessor.
const RECENT_HISTORY: usize = 20;

/// One complete analysis cycle: every derived feature plus the decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    /// Close time of the window's last candle, epoch milliseconds.
    pub timestamp: i64,
    pub current_price: f64,
    pub indicators: IndicatorSet,
    pub levels: LevelSet,
    pub patterns: PatternReport,
    pub structure: MarketStructure,
    pub volume: VolumeAnalysis,
    pub decision: Decision,
}

/// Runs analysis cycles and keeps the bounded decision history.
#[derive(Debug, Default)]
pub struct MarketAnalysis {
    history: VecDeque<Analysis>,
}

impl MarketAnalysis {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Runs one analysis cycle over a window of completed candles.
    ///
    /// The window must be time-ordered, oldest first. The resulting
    /// analysis is appended to the history (evicting the oldest entry
    /// past 100) and returned.
    ///
    /// # Errors
    ///
    /// Returns [`KestrelError::InsufficientWindow`] when fewer than 50
    /// candles are available.
    pub fn analyze(&mut self, window: &[Candle], current_price: f64) -> crate::Result<Analysis> {
        if window.len() < MIN_WINDOW {
            return Err(KestrelError::InsufficientWindow {
                required: MIN_WINDOW,
                actual: window.len(),
            });
        }

        let indicators = calculate_indicators(window);
        let levels = detect_levels(window, current_price);
        let patterns = detect_patterns(window);
        let structure = analyze_structure(window);
        let volume = analyze_volume(window);
        let decision = decide(
            &indicators,
            &levels,
            &patterns,
            &structure,
            &volume,
            current_price,
        );

        info!(
            action = decision.action.as_str(),
            confidence = decision.confidence,
            bullish = decision.bullish_votes,
            bearish = decision.bearish_votes,
            price = current_price,
            "Analysis cycle complete"
        );

        let analysis = Analysis {
            timestamp: window[window.len() - 1].close_time,
            current_price,
            indicators,
            levels,
            patterns,
            structure,
            volume,
            decision,
        };

        self.history.push_back(analysis.clone());
        while self.history.len() > HISTORY_CAPACITY {
            self.history.pop_front();
        }

        Ok(analysis)
    }

    /// The most recent analysis, if any cycle has run.
    pub fn last(&self) -> Option<&Analysis> {
        self.history.back()
    }

    /// The most recent analyses (up to 20), oldest first.
    pub fn recent_history(&self) -> Vec<&Analysis> {
        let skip = self.history.len().saturating_sub(RECENT_HISTORY);
        self.history.iter().skip(skip).collect()
    }

    /// Number of retained analyses (at most 100).
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}
