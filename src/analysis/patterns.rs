//! Chart pattern, market structure, and volume observations.
//!
//! Qualitative features derived from the same candle window as the
//! indicator set: trend direction, higher-high/higher-low structure,
//! candlestick shapes, breakout proximity, price/RSI divergence, and
//! volume bias.

use serde::Serialize;

use crate::analysis::indicators::rsi;
use crate::models::candle::Candle;

/// Regression-slope trend over the last 20 closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    Uptrend,
    Downtrend,
    Sideways,
    InsufficientData,
}

/// Higher-high/higher-low structure bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StructureBias {
    Bullish,
    Bearish,
    Sideways,
}

/// Market structure over the last 20 candles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarketStructure {
    pub bias: StructureBias,
    /// `(higher_highs + higher_lows) / (2 * (N - 1))`, in [0, 1].
    pub score: f64,
    pub higher_highs_ratio: f64,
    pub higher_lows_ratio: f64,
}

/// Candlestick shape flags from the most recent candles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CandlePatterns {
    /// Any of the last 3 candles has a body under 10% of its range.
    pub doji: bool,
    /// The latest candle has a lower wick over twice its body and an
    /// upper wick under half its body.
    pub hammer: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BreakoutDirection {
    Up,
    Down,
}

/// Proximity to the 10-candle high or low.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Breakout {
    pub direction: BreakoutDirection,
    pub probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DivergenceKind {
    Bullish,
    Bearish,
}

/// Opposite-sign price/RSI movement over the last 10 candles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Divergence {
    pub kind: DivergenceKind,
    /// Always reported at moderate strength by this detector.
    pub strength: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VolumeTrend {
    Increasing,
    Decreasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VolumeBias {
    Bullish,
    Bearish,
}

/// Volume behavior over the recent window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeAnalysis {
    pub trend: VolumeTrend,
    pub bias: VolumeBias,
    pub avg_volume_10: f64,
    pub current_volume: f64,
    /// Latest volume relative to the 20-candle average.
    pub volume_ratio: f64,
}

/// All pattern observations for one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PatternReport {
    pub trend: Trend,
    pub candles: CandlePatterns,
    pub breakout: Option<Breakout>,
    pub divergence: Option<Divergence>,
}

/// Detects all chart patterns for the window.
pub fn detect_patterns(window: &[Candle]) -> PatternReport {
    PatternReport {
        trend: detect_trend(window),
        candles: detect_candle_patterns(window),
        breakout: detect_breakout(window),
        divergence: detect_divergence(window),
    }
}

/// Linear-regression trend of the last 20 closes.
///
/// The slope threshold is 0.1% of the last close per candle.
pub fn detect_trend(window: &[Candle]) -> Trend {
    if window.len() < 10 {
        return Trend::InsufficientData;
    }

    let start = window.len().saturating_sub(20);
    let closes: Vec<f64> = window[start..].iter().map(|c| c.close).collect();
    let slope = regression_slope(&closes);
    let last = closes[closes.len() - 1];

    if slope > last * 0.001 {
        Trend::Uptrend
    } else if slope < -last * 0.001 {
        Trend::Downtrend
    } else {
        Trend::Sideways
    }
}

/// Least-squares slope of `values` against their indices.
fn regression_slope(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }

    if den == 0.0 { 0.0 } else { num / den }
}

/// Counts strictly-increasing consecutive highs and lows over the last
/// 20 candles.
pub fn analyze_structure(window: &[Candle]) -> MarketStructure {
    let start = window.len().saturating_sub(20);
    let tail = &window[start..];
    if tail.len() < 2 {
        return MarketStructure {
            bias: StructureBias::Sideways,
            score: 0.0,
            higher_highs_ratio: 0.0,
            higher_lows_ratio: 0.0,
        };
    }

    let transitions = (tail.len() - 1) as f64;
    let higher_highs = tail.windows(2).filter(|w| w[1].high > w[0].high).count() as f64;
    let higher_lows = tail.windows(2).filter(|w| w[1].low > w[0].low).count() as f64;

    let score = (higher_highs + higher_lows) / (2.0 * transitions);
    let bias = if score > 0.6 {
        StructureBias::Bullish
    } else if score < 0.4 {
        StructureBias::Bearish
    } else {
        StructureBias::Sideways
    };

    MarketStructure {
        bias,
        score,
        higher_highs_ratio: higher_highs / transitions,
        higher_lows_ratio: higher_lows / transitions,
    }
}

/// Doji and hammer flags from the most recent candles.
pub fn detect_candle_patterns(window: &[Candle]) -> CandlePatterns {
    if window.len() < 3 {
        return CandlePatterns {
            doji: false,
            hammer: false,
        };
    }

    let doji = window[window.len() - 3..].iter().any(|c| {
        let body = (c.close - c.open).abs();
        let range = c.high - c.low;
        body < range * 0.1
    });

    let last = &window[window.len() - 1];
    let body = (last.close - last.open).abs();
    let lower_wick = last.open.min(last.close) - last.low;
    let upper_wick = last.high - last.open.max(last.close);
    let hammer = lower_wick > body * 2.0 && upper_wick < body * 0.5;

    CandlePatterns { doji, hammer }
}

/// Breakout potential when the close sits within 1% of the 10-candle
/// high or low. Requires at least 20 candles.
pub fn detect_breakout(window: &[Candle]) -> Option<Breakout> {
    if window.len() < 20 {
        return None;
    }

    let tail = &window[window.len() - 10..];
    let recent_high = tail.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let recent_low = tail.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let close = window[window.len() - 1].close;
    if close <= 0.0 {
        return None;
    }

    if (recent_high - close) / close < 0.01 {
        Some(Breakout {
            direction: BreakoutDirection::Up,
            probability: 0.7,
        })
    } else if (close - recent_low) / close < 0.01 {
        Some(Breakout {
            direction: BreakoutDirection::Down,
            probability: 0.7,
        })
    } else {
        None
    }
}

/// Price/RSI divergence over the last 10 candles.
///
/// Price rising while RSI falls flags bearish divergence, and the
/// reverse flags bullish. Requires at least 30 candles.
pub fn detect_divergence(window: &[Candle]) -> Option<Divergence> {
    if window.len() < 30 {
        return None;
    }

    let closes: Vec<f64> = window.iter().map(|c| c.close).collect();
    let n = closes.len();

    let price_delta = closes[n - 1] - closes[n - 10];
    let rsi_delta = rsi(&closes, 14) - rsi(&closes[..n - 9], 14);

    if price_delta > 0.0 && rsi_delta < 0.0 {
        Some(Divergence {
            kind: DivergenceKind::Bearish,
            strength: "MODERATE",
        })
    } else if price_delta < 0.0 && rsi_delta > 0.0 {
        Some(Divergence {
            kind: DivergenceKind::Bullish,
            strength: "MODERATE",
        })
    } else {
        None
    }
}

/// Volume trend and directional bias over the last 10 candles.
pub fn analyze_volume(window: &[Candle]) -> VolumeAnalysis {
    let volumes: Vec<f64> = window.iter().map(|c| c.volume).collect();
    let n = volumes.len();

    let current_volume = volumes.last().copied().unwrap_or(0.0);
    let avg_volume_10 = if n >= 10 {
        volumes[n - 10..].iter().sum::<f64>() / 10.0
    } else if n > 0 {
        volumes.iter().sum::<f64>() / n as f64
    } else {
        0.0
    };

    // 10-candle moving average now vs five candles earlier.
    let trend = if n >= 15 {
        let now = volumes[n - 10..].iter().sum::<f64>() / 10.0;
        let earlier = volumes[n - 15..n - 5].iter().sum::<f64>() / 10.0;
        if now > earlier {
            VolumeTrend::Increasing
        } else {
            VolumeTrend::Decreasing
        }
    } else {
        VolumeTrend::Decreasing
    };

    // Volume coincident with positive vs negative returns.
    let mut positive = 0.0;
    let mut negative = 0.0;
    if n >= 11 {
        for i in n - 10..n {
            let change = window[i].close - window[i - 1].close;
            if change > 0.0 {
                positive += volumes[i];
            } else if change < 0.0 {
                negative += volumes[i];
            }
        }
    }
    let bias = if positive > negative {
        VolumeBias::Bullish
    } else {
        VolumeBias::Bearish
    };

    let avg_20 = if n >= 20 {
        volumes[n - 20..].iter().sum::<f64>() / 20.0
    } else {
        avg_volume_10
    };
    let volume_ratio = if avg_20 > 0.0 {
        current_volume / avg_20
    } else {
        1.0
    };

    VolumeAnalysis {
        trend,
        bias,
        avg_volume_10,
        current_volume,
        volume_ratio,
    }
}
