//! Fast-path trading strategy with position tracking.
//!
//! A lighter, lower-latency companion to the full analysis pipeline:
//! a reduced indicator set scored with fixed weights, gated by a
//! confidence threshold and by the currently held position so the same
//! direction is never signalled twice in a row.

use serde::Serialize;

use crate::analysis::indicators;
use crate::models::candle::Candle;

/// Minimum vote weight before a trade is recommended.
const CONFIDENCE_THRESHOLD: f64 = 0.3;

/// Trade direction for the fast path; doubles as the held position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Signal {
    Buy,
    Sell,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
        }
    }
}

/// The reduced indicator set the fast loop works from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrategySnapshot {
    pub rsi: f64,
    pub macd_line: f64,
    pub macd_signal: f64,
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
    pub sma_20: f64,
    pub sma_50: f64,
    pub current_price: f64,
}

/// Outcome of the "should we trade" check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TradeCheck {
    pub should_trade: bool,
    pub action: Option<Signal>,
    pub confidence: f64,
}

/// Three-state strategy machine over `{flat, long, short}`.
///
/// The position only changes through [`Strategy::update_position`],
/// i.e. after an externally confirmed execution.
#[derive(Debug, Default)]
pub struct Strategy {
    snapshot: Option<StrategySnapshot>,
    position: Option<Signal>,
}

impl Strategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the reduced indicator set from a candle window and
    /// stores it for the subsequent signal checks.
    ///
    /// Indicators degrade to their neutral defaults on short windows,
    /// so this never fails; an empty window yields an all-zero snapshot.
    pub fn calculate_indicators(&mut self, window: &[Candle]) -> StrategySnapshot {
        let closes: Vec<f64> = window.iter().map(|c| c.close).collect();
        let current_price = closes.last().copied().unwrap_or(0.0);

        let macd = indicators::macd(&closes, 12, 26, 9);
        let bands = indicators::bollinger(&closes, 20, 2.0);

        let snapshot = StrategySnapshot {
            rsi: indicators::rsi(&closes, 14),
            macd_line: macd.line,
            macd_signal: macd.signal,
            bb_upper: bands.upper,
            bb_middle: bands.middle,
            bb_lower: bands.lower,
            sma_20: indicators::sma(&closes, 20),
            sma_50: indicators::sma(&closes, 50),
            current_price,
        };

        self.snapshot = Some(snapshot);
        snapshot
    }

    /// Scores the stored snapshot with fixed weights.
    ///
    /// RSI carries 0.3, MACD 0.2, Bollinger 0.2, and the MA cross 0.3.
    /// Returns the winning direction and its summed weight, or `None`
    /// when no side clears the confidence threshold.
    pub fn analyze_signals(&self) -> Option<(Signal, f64)> {
        let snapshot = self.snapshot.as_ref()?;

        let mut buy = 0.0;
        let mut sell = 0.0;

        if snapshot.rsi < 30.0 {
            buy += 0.3;
        } else if snapshot.rsi > 70.0 {
            sell += 0.3;
        }

        if snapshot.macd_line > snapshot.macd_signal {
            buy += 0.2;
        } else if snapshot.macd_line < snapshot.macd_signal {
            sell += 0.2;
        }

        if snapshot.current_price < snapshot.bb_lower {
            buy += 0.2;
        } else if snapshot.current_price > snapshot.bb_upper {
            sell += 0.2;
        }

        if snapshot.sma_20 > snapshot.sma_50 {
            buy += 0.3;
        } else if snapshot.sma_20 < snapshot.sma_50 {
            sell += 0.3;
        }

        if buy > sell && buy > CONFIDENCE_THRESHOLD {
            Some((Signal::Buy, buy))
        } else if sell > buy && sell > CONFIDENCE_THRESHOLD {
            Some((Signal::Sell, sell))
        } else {
            None
        }
    }

    /// Decides whether to trade right now.
    ///
    /// Refuses to re-signal the direction of the currently held
    /// position, preventing repeated identical orders.
    pub fn should_trade(&self) -> TradeCheck {
        let Some((signal, confidence)) = self.analyze_signals() else {
            return TradeCheck {
                should_trade: false,
                action: None,
                confidence: 0.0,
            };
        };

        if self.position == Some(signal) {
            return TradeCheck {
                should_trade: false,
                action: None,
                confidence,
            };
        }

        TradeCheck {
            should_trade: true,
            action: Some(signal),
            confidence,
        }
    }

    /// Records an executed trade's direction as the held position.
    pub fn update_position(&mut self, position: Signal) {
        self.position = Some(position);
    }

    /// The currently held position, `None` when flat.
    pub fn position(&self) -> Option<Signal> {
        self.position
    }
}
