//! Integration tests for the three strategy detectors.
//!
//! Each scenario builds a daily series with the exact stage structure the
//! strategy looks for, then checks both the positive match and the nearby
//! shapes that must not fire.

use candlescreen::prelude::*;
use chrono::{Days, NaiveDate};

fn date(offset: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + Days::new(offset as u64)
}

fn bar(offset: usize, o: f64, h: f64, l: f64, c: f64, v: f64) -> Bar {
    Bar::new(date(offset), o, h, l, c, v)
}

fn series(instrument: &str, bars: Vec<Bar>) -> BarSeries {
    BarSeries::new(instrument, bars).unwrap()
}

// ============================================================
// SCENARIO BUILDERS
// ============================================================

/// Five declining prefix bars, then: small bearish bar, larger bearish bar,
/// gap-down bar closing bullish above the second close.
fn reversal_bars() -> Vec<Bar> {
    let mut bars = Vec::new();
    for (i, c) in [10.6, 10.5, 10.45, 10.3, 10.1].iter().enumerate() {
        bars.push(bar(i, c + 0.05, c + 0.1, c - 0.1, *c, 1000.0));
    }
    bars.push(bar(5, 10.0, 10.1, 9.7, 9.8, 1000.0));
    bars.push(bar(6, 9.8, 9.85, 9.1, 9.2, 1500.0));
    bars.push(bar(7, 9.1, 9.65, 9.05, 9.6, 2000.0));
    bars
}

/// Decline of -8% over five bars, six-bar consolidation inside a 2% band, a
/// +10% limit-up bar, a four-bar pullback on contracting volume, then a
/// breakout above the limit-up high on 2.2x volume.
fn volume_breakout_bars() -> Vec<Bar> {
    let mut bars = Vec::new();
    for (i, c) in [100.0, 98.0, 96.0, 94.0, 92.0].iter().enumerate() {
        bars.push(bar(i, c + 1.0, c + 2.5, c - 1.0, *c, 10_000.0));
    }
    for i in 0..6 {
        bars.push(bar(5 + i, 92.0, 92.6, 91.4, 92.0, 10_000.0));
    }
    bars.push(bar(11, 92.5, 101.5, 92.3, 101.2, 30_000.0));
    bars.push(bar(12, 100.5, 100.8, 98.8, 99.0, 6_000.0));
    bars.push(bar(13, 99.0, 99.5, 97.8, 98.0, 6_000.0));
    bars.push(bar(14, 98.0, 98.4, 97.2, 97.5, 6_000.0));
    bars.push(bar(15, 97.5, 98.8, 97.3, 98.5, 6_000.0));
    bars.push(bar(16, 99.8, 102.8, 99.5, 102.5, 24_000.0));
    bars
}

/// Same prefix as the volume breakout, then a quiet four-bar shelf holding
/// above the limit-up close on shrunk volume, then a push through the shelf
/// top on merely average volume.
fn shrink_breakout_bars() -> Vec<Bar> {
    let mut bars = Vec::new();
    for (i, c) in [100.0, 98.0, 96.0, 94.0, 92.0].iter().enumerate() {
        bars.push(bar(i, c + 1.0, c + 2.5, c - 1.0, *c, 10_000.0));
    }
    for i in 0..6 {
        bars.push(bar(5 + i, 92.0, 92.6, 91.4, 92.0, 10_000.0));
    }
    bars.push(bar(11, 92.5, 101.5, 92.3, 101.2, 30_000.0));
    bars.push(bar(12, 101.4, 101.9, 100.9, 101.3, 5_000.0));
    bars.push(bar(13, 101.3, 101.8, 100.9, 101.4, 5_000.0));
    bars.push(bar(14, 101.4, 101.7, 100.8, 101.25, 5_000.0));
    bars.push(bar(15, 101.3, 101.9, 101.0, 101.5, 5_000.0));
    bars.push(bar(16, 101.6, 102.5, 101.4, 102.3, 12_000.0));
    bars
}

// ============================================================
// THREE-DAY REVERSAL
// ============================================================

#[test]
fn reversal_fires_after_declining_prefix() {
    let detector = ThreeDayReversalDetector::with_defaults();
    let m = detector.evaluate(&series("600000", reversal_bars())).unwrap();

    assert_eq!(m.instrument, "600000");
    assert_eq!(m.strategy, StrategyId("three_day_reversal"));
    assert_eq!(m.match_date, date(7));
    assert_eq!(m.window, vec![date(5), date(6), date(7)]);
    assert!(m.metrics["b2_body_ratio"] > m.metrics["b1_body_ratio"]);
    assert!(m.metrics["b3_close_strength"] > 0.0);
    assert!(m.metrics["prior_decline"] < 0.0);
}

#[test]
fn reversal_does_not_fire_when_third_close_stays_below_second() {
    let mut bars = reversal_bars();
    // Closes at 9.05, below day 2's 9.2: the reversal never confirmed
    bars[7] = bar(7, 9.1, 9.65, 9.0, 9.05, 2000.0);
    let detector = ThreeDayReversalDetector::with_defaults();
    assert!(detector.evaluate(&series("600000", bars)).is_none());
}

#[test]
fn reversal_does_not_fire_without_gap_down_open() {
    let mut bars = reversal_bars();
    // Opens above day 2's close
    bars[7] = bar(7, 9.3, 9.65, 9.25, 9.6, 2000.0);
    let detector = ThreeDayReversalDetector::with_defaults();
    assert!(detector.evaluate(&series("600000", bars)).is_none());
}

#[test]
fn reversal_short_series_yields_none_not_panic() {
    let detector = ThreeDayReversalDetector::with_defaults();
    for n in 0..detector.min_bars() {
        let bars: Vec<Bar> = reversal_bars().into_iter().take(n).collect();
        assert!(detector.evaluate(&series("600000", bars)).is_none());
    }
}

// ============================================================
// VOLUME BREAKOUT
// ============================================================

#[test]
fn volume_breakout_fires_on_five_stage_sequence() {
    let detector = VolumeBreakoutDetector::with_defaults();
    let m = detector
        .evaluate(&series("000001", volume_breakout_bars()))
        .unwrap();

    assert_eq!(m.strategy, StrategyId("volume_breakout"));
    assert_eq!(m.match_date, date(16));
    // Window spans decline start through the breakout bar
    assert_eq!(m.window.first(), Some(&date(0)));
    assert_eq!(m.window.last(), Some(&date(16)));
    assert!((m.metrics["decline_pct"] - 0.08).abs() < 1e-9);
    assert_eq!(m.metrics["consolidation_len"], 6.0);
    assert!((m.metrics["limit_up_change"] - 0.10).abs() < 1e-9);
    assert!(m.metrics["pullback_volume_ratio"] < 1.0);
    assert!(m.metrics["breakout_volume_ratio"] > 2.0);
}

#[test]
fn volume_breakout_requires_a_limit_up_stage() {
    let mut bars = volume_breakout_bars();
    // An ordinary +5% bar where the limit-up should be: the scan exhausts
    bars[11] = bar(11, 92.5, 97.0, 92.3, 96.6, 30_000.0);
    let detector = VolumeBreakoutDetector::with_defaults();
    assert!(detector.evaluate(&series("000001", bars)).is_none());
}

#[test]
fn volume_breakout_requires_expanded_breakout_volume() {
    let mut bars = volume_breakout_bars();
    bars[16].volume = 11_000.0;
    let detector = VolumeBreakoutDetector::with_defaults();
    assert!(detector.evaluate(&series("000001", bars)).is_none());
}

#[test]
fn volume_breakout_pullback_must_hold_consolidation_low() {
    let mut bars = volume_breakout_bars();
    bars[13] = bar(13, 92.0, 92.4, 89.9, 90.2, 6_000.0);
    let detector = VolumeBreakoutDetector::with_defaults();
    assert!(detector.evaluate(&series("000001", bars)).is_none());
}

#[test]
fn volume_breakout_short_series_yields_none_not_panic() {
    let detector = VolumeBreakoutDetector::with_defaults();
    let full = series("000001", volume_breakout_bars());
    for n in 0..detector.min_bars() {
        assert!(detector.evaluate(&full.tail(n)).is_none());
    }
}

// ============================================================
// SHRINK-VOLUME BREAKOUT
// ============================================================

#[test]
fn shrink_breakout_fires_on_five_stage_sequence() {
    let detector = ShrinkVolumeBreakoutDetector::with_defaults();
    let m = detector
        .evaluate(&series("300750", shrink_breakout_bars()))
        .unwrap();

    assert_eq!(m.strategy, StrategyId("shrink_volume_breakout"));
    assert_eq!(m.match_date, date(16));
    assert!(m.metrics["consolidation2_volume_ratio"] < 0.8);
    // Modest confirmation only: well below what the volume breakout demands
    assert!(m.metrics["breakout_volume_ratio"] >= 1.0);
    assert!(m.metrics["breakout_volume_ratio"] < 1.5);
}

#[test]
fn shrink_breakout_requires_shrunk_shelf_volume() {
    let mut bars = shrink_breakout_bars();
    bars[13].volume = 15_000.0;
    let detector = ShrinkVolumeBreakoutDetector::with_defaults();
    assert!(detector.evaluate(&series("300750", bars)).is_none());
}

#[test]
fn shrink_breakout_shelf_must_hold_limit_up_close() {
    let mut bars = shrink_breakout_bars();
    bars[15] = bar(15, 101.3, 101.5, 100.5, 100.9, 5_000.0);
    let detector = ShrinkVolumeBreakoutDetector::with_defaults();
    assert!(detector.evaluate(&series("300750", bars)).is_none());
}

// ============================================================
// CROSS-DETECTOR PROPERTIES
// ============================================================

#[test]
fn detectors_are_deterministic() {
    let reversal = ThreeDayReversalDetector::with_defaults();
    let volume = VolumeBreakoutDetector::with_defaults();
    let shrink = ShrinkVolumeBreakoutDetector::with_defaults();

    for bars in [reversal_bars(), volume_breakout_bars(), shrink_breakout_bars()] {
        let s = series("600000", bars);
        assert_eq!(reversal.evaluate(&s), reversal.evaluate(&s));
        assert_eq!(volume.evaluate(&s), volume.evaluate(&s));
        assert_eq!(shrink.evaluate(&s), shrink.evaluate(&s));
    }
}

#[test]
fn detectors_do_not_interfere() {
    let reversal = ThreeDayReversalDetector::with_defaults();
    let volume = VolumeBreakoutDetector::with_defaults();
    let shrink = ShrinkVolumeBreakoutDetector::with_defaults();
    let s = series("000001", volume_breakout_bars());

    // Evaluated alone
    let alone = volume.evaluate(&s);

    // Evaluated after the other two ran on the same series
    let _ = reversal.evaluate(&s);
    let _ = shrink.evaluate(&s);
    let together = volume.evaluate(&s);

    assert_eq!(alone, together);
    assert!(alone.is_some());
}

#[test]
fn breakout_shapes_are_mutually_exclusive_here() {
    // The pullback closes below the limit-up close, which the shrink shelf
    // forbids; the shelf holds above it, which the pullback forbids.
    let volume = VolumeBreakoutDetector::with_defaults();
    let shrink = ShrinkVolumeBreakoutDetector::with_defaults();

    let vb = series("000001", volume_breakout_bars());
    let sb = series("300750", shrink_breakout_bars());

    assert!(volume.evaluate(&vb).is_some());
    assert!(shrink.evaluate(&vb).is_none());
    assert!(shrink.evaluate(&sb).is_some());
    assert!(volume.evaluate(&sb).is_none());
}
