//! Weighted-voting decision engine.
//!
//! Reduces the indicator set, level set, pattern report, market
//! structure, and volume analysis to a single scored LONG/SHORT/HOLD
//! signal. Each rule contributes integer votes to the bullish or bearish
//! tally and appends a human-readable reason; rules are evaluated in a
//! fixed order so the reason list is reproducible.

use serde::Serialize;

use crate::analysis::indicators::IndicatorSet;
use crate::analysis::levels::LevelSet;
use crate::analysis::patterns::{
    BreakoutDirection, MarketStructure, PatternReport, StructureBias, VolumeAnalysis, VolumeBias,
    VolumeTrend,
};

/// Confidence is capped below certainty no matter how lopsided the vote.
const MAX_CONFIDENCE: f64 = 95.0;

/// The engine's recommended action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Action {
    Long,
    Short,
    Hold,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Long => "LONG",
            Action::Short => "SHORT",
            Action::Hold => "HOLD",
        }
    }
}

/// A scored trading decision with its full audit trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub action: Action,
    /// Vote-imbalance confidence in [0, 95].
    pub confidence: f64,
    pub bullish_votes: u32,
    pub bearish_votes: u32,
    /// One entry per fired rule, in evaluation order.
    pub reasons: Vec<String>,
}

/// Accumulates votes and reasons during rule evaluation.
struct Tally {
    bullish: u32,
    bearish: u32,
    reasons: Vec<String>,
}

impl Tally {
    fn new() -> Self {
        Self {
            bullish: 0,
            bearish: 0,
            reasons: Vec::new(),
        }
    }

    fn bullish(&mut self, votes: u32, reason: String) {
        self.bullish += votes;
        self.reasons.push(reason);
    }

    fn bearish(&mut self, votes: u32, reason: String) {
        self.bearish += votes;
        self.reasons.push(reason);
    }
}

/// Scores one analysis cycle.
///
/// Pure function of its inputs: identical inputs produce an identical
/// decision, including reason ordering.
pub fn decide(
    indicators: &IndicatorSet,
    levels: &LevelSet,
    patterns: &PatternReport,
    structure: &MarketStructure,
    volume: &VolumeAnalysis,
    current_price: f64,
) -> Decision {
    let mut tally = Tally::new();

    // RSI
    let rsi = indicators.rsi;
    if rsi < 30.0 {
        tally.bullish(2, format!("RSI oversold at {rsi:.1} - strong buy signal"));
    } else if rsi > 70.0 {
        tally.bearish(2, format!("RSI overbought at {rsi:.1} - sell signal"));
    } else if rsi <= 45.0 {
        tally.bullish(1, format!("RSI at {rsi:.1} - moderate bullish"));
    } else if rsi >= 55.0 {
        tally.bearish(1, format!("RSI at {rsi:.1} - moderate bearish"));
    }

    // MACD histogram always votes one way or the other.
    if indicators.macd.histogram > 0.0 {
        tally.bullish(1, "MACD histogram positive - bullish momentum".to_string());
    } else {
        tally.bearish(1, "MACD histogram negative - bearish momentum".to_string());
    }

    // Moving average alignment
    if current_price > indicators.sma_20 && indicators.sma_20 > indicators.sma_50 {
        tally.bullish(2, "Price above SMA20 > SMA50 - strong uptrend".to_string());
    } else if current_price < indicators.sma_20 && indicators.sma_20 < indicators.sma_50 {
        tally.bearish(2, "Price below SMA20 < SMA50 - strong downtrend".to_string());
    }

    // Support/resistance proximity
    if let Some(distance) = levels.distance_to_support_pct
        && distance < 1.0
    {
        tally.bullish(2, format!("Near support level - {distance:.2}% away"));
    }
    if let Some(distance) = levels.distance_to_resistance_pct
        && distance < 1.0
    {
        tally.bearish(1, format!("Near resistance level - {distance:.2}% away"));
    }

    // Market structure
    match structure.bias {
        StructureBias::Bullish => tally.bullish(1, "Market structure is bullish".to_string()),
        StructureBias::Bearish => tally.bearish(1, "Market structure is bearish".to_string()),
        StructureBias::Sideways => {}
    }

    // Volume confirmation
    if volume.trend == VolumeTrend::Increasing {
        match volume.bias {
            VolumeBias::Bullish => {
                tally.bullish(1, "Volume supports bullish bias".to_string());
            }
            VolumeBias::Bearish => {
                tally.bearish(1, "Volume supports bearish bias".to_string());
            }
        }
    }

    // Breakout proximity
    if let Some(breakout) = patterns.breakout {
        match breakout.direction {
            BreakoutDirection::Up => {
                tally.bullish(1, "Potential upward breakout detected".to_string());
            }
            BreakoutDirection::Down => {
                tally.bearish(1, "Potential downward breakout detected".to_string());
            }
        }
    }

    // CCI
    let cci = indicators.cci;
    if cci < -100.0 {
        tally.bullish(2, format!("CCI oversold at {cci:.1} - strong buy signal"));
    } else if cci > 100.0 {
        tally.bearish(2, format!("CCI overbought at {cci:.1} - strong sell signal"));
    }

    // Rate of change
    let roc = indicators.roc;
    if roc > 5.0 {
        tally.bullish(1, format!("Strong positive momentum - ROC: {roc:.1}%"));
    } else if roc < -5.0 {
        tally.bearish(1, format!("Strong negative momentum - ROC: {roc:.1}%"));
    }

    // High volatility reads as risk-off, not directional.
    let volatility = indicators.volatility;
    if volatility > 0.3 {
        tally.bearish(1, format!("High volatility detected - {volatility:.2}"));
    }

    // ADX confirms whichever side the price/SMA20 relation favors.
    let adx = indicators.adx;
    if adx > 25.0 {
        if current_price > indicators.sma_20 {
            tally.bullish(1, format!("Strong uptrend confirmed - ADX: {adx:.1}"));
        } else {
            tally.bearish(1, format!("Strong downtrend confirmed - ADX: {adx:.1}"));
        }
    }

    // Aroon oscillator
    let aroon_osc = indicators.aroon.oscillator;
    if aroon_osc > 50.0 {
        tally.bullish(1, format!("Aroon indicates uptrend - oscillator: {aroon_osc:.1}"));
    } else if aroon_osc < -50.0 {
        tally.bearish(1, format!("Aroon indicates downtrend - oscillator: {aroon_osc:.1}"));
    }

    // Money Flow Index
    let mfi = indicators.mfi;
    if mfi < 20.0 {
        tally.bullish(2, format!("MFI oversold at {mfi:.1} - strong buy signal"));
    } else if mfi > 80.0 {
        tally.bearish(2, format!("MFI overbought at {mfi:.1} - strong sell signal"));
    }

    // VWAP
    if current_price > indicators.vwap * 1.01 {
        tally.bullish(1, "Price above VWAP - bullish bias".to_string());
    } else if current_price < indicators.vwap * 0.99 {
        tally.bearish(1, "Price below VWAP - bearish bias".to_string());
    }

    // Pivot point breakout/breakdown
    if let Some(pivots) = &indicators.pivot_points {
        if current_price > pivots.r1 {
            tally.bullish(1, "Price above R1 resistance - bullish breakout".to_string());
        } else if current_price < pivots.s1 {
            tally.bearish(1, "Price below S1 support - bearish breakdown".to_string());
        }
    }

    // Fibonacci retracement support. Only ever votes bullish; a price
    // near a retracement is treated as a support approach.
    if let Some(fib) = &indicators.fibonacci
        && current_price > 0.0
    {
        if (current_price - fib.fib_618).abs() / current_price < 0.005 {
            tally.bullish(1, "Price near 61.8% Fibonacci support".to_string());
        } else if (current_price - fib.fib_382).abs() / current_price < 0.005 {
            tally.bullish(1, "Price near 38.2% Fibonacci support".to_string());
        }
    }

    // Fear/greed, contrarian on fear.
    let fear_greed = indicators.fear_greed;
    if fear_greed < 25.0 {
        tally.bullish(
            2,
            format!("Extreme fear detected - F&G: {fear_greed:.1} (contrarian buy)"),
        );
    } else if fear_greed > 75.0 {
        tally.bearish(1, format!("Extreme greed detected - F&G: {fear_greed:.1} (caution)"));
    }

    // Bull/bear power, mutually exclusive in priority order.
    let bull = indicators.bull_bear.bull;
    let bear = indicators.bull_bear.bear;
    if bull > 0.0 && bear > 0.0 {
        tally.bullish(
            2,
            "Both bull and bear power positive - strong bullish momentum".to_string(),
        );
    } else if bull > bear.abs() {
        tally.bullish(1, "Bull power dominates - bullish bias".to_string());
    } else if bear.abs() > bull {
        tally.bearish(1, "Bear power dominates - bearish bias".to_string());
    }

    finalize(tally)
}

/// Turns the vote tally into an action and bounded confidence.
fn finalize(tally: Tally) -> Decision {
    let bullish = tally.bullish;
    let bearish = tally.bearish;
    let total = bullish + bearish;

    let (action, confidence) = if total == 0 {
        (Action::Hold, 0.0)
    } else {
        let strength = bullish.abs_diff(bearish) as f64;
        let confidence = (strength / total as f64 * 100.0).min(MAX_CONFIDENCE);
        let action = if bullish > bearish + 1 {
            Action::Long
        } else if bearish > bullish + 1 {
            Action::Short
        } else {
            Action::Hold
        };
        (action, confidence)
    };

    Decision {
        action,
        confidence,
        bullish_votes: bullish,
        bearish_votes: bearish,
        reasons: tally.reasons,
    }
}
