//! Support and resistance level detection from local extrema.

use serde::Serialize;

use crate::models::candle::Candle;

/// Two levels closer than this fraction are merged (first found wins).
const MERGE_THRESHOLD: f64 = 0.005;

/// At most this many levels are kept per side, strongest (highest) last.
const MAX_LEVELS: usize = 5;

/// Detected price levels around the current price.
///
/// Level lists are sorted ascending. Distances are percentages of the
/// current price, present only when a level exists on that side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelSet {
    pub support: Vec<f64>,
    pub resistance: Vec<f64>,
    pub nearest_support: Option<f64>,
    pub nearest_resistance: Option<f64>,
    pub distance_to_support_pct: Option<f64>,
    pub distance_to_resistance_pct: Option<f64>,
}

/// Derives support/resistance levels from local extrema in the window.
///
/// A candle's high is a resistance candidate when it exceeds the highs
/// of the two candles on each side; lows mirror this for support.
/// Candidates within 0.5% of an already kept level are dropped.
pub fn detect_levels(window: &[Candle], current_price: f64) -> LevelSet {
    let highs: Vec<f64> = window.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = window.iter().map(|c| c.low).collect();

    let resistance = local_extrema(&highs, |center, neighbor| center > neighbor);
    let support = local_extrema(&lows, |center, neighbor| center < neighbor);

    let nearest_resistance = resistance
        .iter()
        .copied()
        .filter(|&r| r > current_price)
        .fold(None, |acc: Option<f64>, r| {
            Some(acc.map_or(r, |a| a.min(r)))
        });
    let nearest_support = support
        .iter()
        .copied()
        .filter(|&s| s < current_price)
        .fold(None, |acc: Option<f64>, s| {
            Some(acc.map_or(s, |a| a.max(s)))
        });

    let distance_to_resistance_pct = nearest_resistance
        .filter(|_| current_price > 0.0)
        .map(|r| (r - current_price) / current_price * 100.0);
    let distance_to_support_pct = nearest_support
        .filter(|_| current_price > 0.0)
        .map(|s| (current_price - s) / current_price * 100.0);

    LevelSet {
        support,
        resistance,
        nearest_support,
        nearest_resistance,
        distance_to_support_pct,
        distance_to_resistance_pct,
    }
}

/// Finds local extrema (2 candles each side), merges near-duplicates,
/// and keeps the top [`MAX_LEVELS`] ascending.
fn local_extrema(values: &[f64], beats: impl Fn(f64, f64) -> bool) -> Vec<f64> {
    let mut candidates = Vec::new();
    for i in 2..values.len().saturating_sub(2) {
        let v = values[i];
        if beats(v, values[i - 1])
            && beats(v, values[i + 1])
            && beats(v, values[i - 2])
            && beats(v, values[i + 2])
        {
            candidates.push(v);
        }
    }

    candidates.sort_by(|a, b| a.total_cmp(b));
    candidates.dedup();

    let mut levels: Vec<f64> = Vec::new();
    for candidate in candidates {
        let near_existing = levels
            .iter()
            .any(|&kept| kept != 0.0 && (candidate - kept).abs() / kept < MERGE_THRESHOLD);
        if !near_existing {
            levels.push(candidate);
        }
    }

    if levels.len() > MAX_LEVELS {
        levels.split_off(levels.len() - MAX_LEVELS)
    } else {
        levels
    }
}
