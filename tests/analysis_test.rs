//! End-to-end analysis pipeline and decision engine tests.

mod common;

use common::{ascending_window, flat_window, noisy_window};
use kestrel::KestrelError;
use kestrel::analysis::patterns::{StructureBias, Trend};
use kestrel::analysis::{
    Action, MarketAnalysis, analyze_structure, analyze_volume, calculate_indicators, decide,
    detect_levels, detect_patterns, detect_trend,
};

#[test]
fn test_analyze_rejects_short_window() {
    let mut analysis = MarketAnalysis::new();
    let window = flat_window(49, 100.0);

    let err = analysis.analyze(&window, 100.0).unwrap_err();
    assert!(matches!(
        err,
        KestrelError::InsufficientWindow {
            required: 50,
            actual: 49
        }
    ));
    assert_eq!(analysis.history_len(), 0);
}

#[test]
fn test_ascending_window_goes_long() {
    let window = ascending_window(60);
    let current_price = window[window.len() - 1].close;

    assert_eq!(detect_trend(&window), Trend::Uptrend);
    assert_eq!(analyze_structure(&window).bias, StructureBias::Bullish);

    let indicators = calculate_indicators(&window);
    assert!(indicators.sma_20 > indicators.sma_50);

    let mut analysis = MarketAnalysis::new();
    let result = analysis
        .analyze(&window, current_price)
        .expect("window long enough");
    assert_eq!(result.decision.action, Action::Long);
    assert!(result.decision.confidence > 0.0);
    assert!(result.decision.bullish_votes > result.decision.bearish_votes);
    assert!(!result.decision.reasons.is_empty());
}

#[test]
fn test_flat_window_holds_with_zero_confidence() {
    let window = flat_window(60, 100.0);

    let indicators = calculate_indicators(&window);
    assert_eq!(indicators.rsi, 50.0);
    assert!(indicators.macd.histogram.abs() < 1e-12);

    let mut analysis = MarketAnalysis::new();
    let result = analysis.analyze(&window, 100.0).expect("window long enough");
    assert_eq!(result.decision.action, Action::Hold);
    assert_eq!(result.decision.confidence, 0.0);
}

#[test]
fn test_decide_is_pure() {
    let window = noisy_window(90, 77);
    let current_price = window[window.len() - 1].close;

    let indicators = calculate_indicators(&window);
    let levels = detect_levels(&window, current_price);
    let patterns = detect_patterns(&window);
    let structure = analyze_structure(&window);
    let volume = analyze_volume(&window);

    let first = decide(
        &indicators,
        &levels,
        &patterns,
        &structure,
        &volume,
        current_price,
    );
    let second = decide(
        &indicators,
        &levels,
        &patterns,
        &structure,
        &volume,
        current_price,
    );

    // Same action, confidence, vote counts, and reason order.
    assert_eq!(first, second);
}

#[test]
fn test_confidence_never_exceeds_cap() {
    for seed in 0..20 {
        let window = noisy_window(80, seed);
        let current_price = window[window.len() - 1].close;

        let mut analysis = MarketAnalysis::new();
        let result = analysis
            .analyze(&window, current_price)
            .expect("window long enough");
        assert!(result.decision.confidence >= 0.0);
        assert!(result.decision.confidence <= 95.0);
    }
}

#[test]
fn test_history_evicts_oldest_past_hundred() {
    let mut analysis = MarketAnalysis::new();

    for i in 0..101i64 {
        // Shift timestamps so every analysis is distinguishable.
        let mut window = flat_window(60, 100.0);
        for candle in &mut window {
            candle.open_time += i * 3_600_000;
            candle.close_time += i * 3_600_000;
        }
        analysis.analyze(&window, 100.0).expect("window long enough");
    }

    assert_eq!(analysis.history_len(), 100);

    // The first analysis (i = 0) was evicted; the newest is present.
    let recent = analysis.recent_history();
    assert_eq!(recent.len(), 20);
    let newest = analysis.last().expect("history populated");
    assert_eq!(newest.timestamp, 100 * 3_600_000 + 60 * 60_000 - 1);

    let oldest_retained = recent[0];
    assert!(oldest_retained.timestamp > 60 * 60_000 - 1);
}

#[test]
fn test_recent_history_is_capped_at_twenty() {
    let mut analysis = MarketAnalysis::new();
    let window = flat_window(60, 100.0);

    for _ in 0..5 {
        analysis.analyze(&window, 100.0).expect("window long enough");
    }
    assert_eq!(analysis.recent_history().len(), 5);

    for _ in 0..30 {
        analysis.analyze(&window, 100.0).expect("window long enough");
    }
    assert_eq!(analysis.recent_history().len(), 20);
    assert_eq!(analysis.history_len(), 35);
}
