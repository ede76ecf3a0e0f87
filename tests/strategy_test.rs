//! Fast-path strategy signal and position-suppression tests.

mod common;

use common::{ascending_window, descending_window, flat_window};
use kestrel::strategy::{Signal, Strategy};

#[test]
fn test_uptrend_recommends_buy() {
    let mut strategy = Strategy::new();
    strategy.calculate_indicators(&ascending_window(80));

    let check = strategy.should_trade();
    assert!(check.should_trade);
    assert_eq!(check.action, Some(Signal::Buy));
    assert!(check.confidence > 0.3);
}

#[test]
fn test_downtrend_recommends_sell() {
    let mut strategy = Strategy::new();
    strategy.calculate_indicators(&descending_window(80));

    let check = strategy.should_trade();
    assert!(check.should_trade);
    assert_eq!(check.action, Some(Signal::Sell));
}

#[test]
fn test_flat_market_gives_no_signal() {
    let mut strategy = Strategy::new();
    strategy.calculate_indicators(&flat_window(80, 100.0));

    assert!(strategy.analyze_signals().is_none());
    let check = strategy.should_trade();
    assert!(!check.should_trade);
    assert_eq!(check.action, None);
    assert_eq!(check.confidence, 0.0);
}

#[test]
fn test_no_signal_before_indicators_are_computed() {
    let strategy = Strategy::new();
    assert!(!strategy.should_trade().should_trade);
}

#[test]
fn test_held_position_suppresses_same_direction() {
    let mut strategy = Strategy::new();
    strategy.calculate_indicators(&ascending_window(80));

    // The uptrend recommends BUY until a BUY is executed.
    assert_eq!(strategy.should_trade().action, Some(Signal::Buy));
    strategy.update_position(Signal::Buy);

    let check = strategy.should_trade();
    assert!(!check.should_trade);
    assert_eq!(check.action, None);
    // The confidence behind the suppressed signal is still reported.
    assert!(check.confidence > 0.3);
}

#[test]
fn test_opposite_position_releases_the_signal() {
    let mut strategy = Strategy::new();
    strategy.calculate_indicators(&ascending_window(80));

    strategy.update_position(Signal::Sell);
    let check = strategy.should_trade();
    assert!(check.should_trade);
    assert_eq!(check.action, Some(Signal::Buy));
}

#[test]
fn test_position_starts_flat_and_tracks_updates() {
    let mut strategy = Strategy::new();
    assert_eq!(strategy.position(), None);

    strategy.update_position(Signal::Buy);
    assert_eq!(strategy.position(), Some(Signal::Buy));

    strategy.update_position(Signal::Sell);
    assert_eq!(strategy.position(), Some(Signal::Sell));
}

#[test]
fn test_snapshot_carries_reduced_indicator_set() {
    let mut strategy = Strategy::new();
    let window = ascending_window(80);
    let snapshot = strategy.calculate_indicators(&window);

    assert_eq!(snapshot.current_price, window[window.len() - 1].close);
    assert!(snapshot.sma_20 > snapshot.sma_50);
    assert!(snapshot.bb_upper > snapshot.bb_middle);
    assert!(snapshot.bb_middle > snapshot.bb_lower);
    assert_eq!(snapshot.rsi, 100.0); // uninterrupted gains
}
