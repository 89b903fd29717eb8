//! Shared classification primitives
//!
//! Bar-shape tests, volume-ratio baselines and the linear score mapping used
//! by all three strategy detectors.

use crate::Bar;

/// Fractional change from `from` to `to`. Zero when the base is not positive
/// (series validation rules that out for real data).
#[inline]
pub fn pct_change(from: f64, to: f64) -> f64 {
    if from > 0.0 {
        (to - from) / from
    } else {
        0.0
    }
}

/// Net close-to-close return over a slice: first close → last close.
/// Zero for slices shorter than two bars.
#[inline]
pub fn net_return(bars: &[Bar]) -> f64 {
    match (bars.first(), bars.last()) {
        (Some(first), Some(last)) if bars.len() > 1 => pct_change(first.close, last.close),
        _ => 0.0,
    }
}

/// Session trading range relative to its close: `(high - low) / close`.
#[inline]
pub fn range_ratio(bar: &Bar) -> f64 {
    if bar.close > 0.0 {
        bar.range() / bar.close
    } else {
        0.0
    }
}

/// Trailing average volume at a specific bar index, over the `window` bars
/// BEFORE the bar (the bar itself is excluded, so a surge does not inflate
/// its own baseline). At index 0 falls back to the bar's own volume.
#[inline]
pub fn trailing_avg_volume(bars: &[Bar], at: usize, window: usize) -> f64 {
    if at == 0 {
        return bars[0].volume;
    }
    let start = at.saturating_sub(window);
    let slice = &bars[start..at];
    let sum: f64 = slice.iter().map(|b| b.volume).sum();
    sum / slice.len() as f64
}

/// A bar's volume divided by its trailing average volume. Zero when the
/// baseline itself is zero.
#[inline]
pub fn volume_ratio(bars: &[Bar], at: usize, window: usize) -> f64 {
    let avg = trailing_avg_volume(bars, at, window);
    if avg > 0.0 {
        bars[at].volume / avg
    } else {
        0.0
    }
}

/// True when a bar's close sits within `tolerance` of the capped price
/// `prev_close * (1 + limit_pct)`, i.e. the session closed pinned at the
/// regulatory daily price-move cap.
#[inline]
pub fn is_limit_up(bar: &Bar, prev_close: f64, limit_pct: f64, tolerance: f64) -> bool {
    if prev_close <= 0.0 {
        return false;
    }
    let change = pct_change(prev_close, bar.close);
    (change - limit_pct).abs() <= tolerance
}

/// Linear map of `value` from [low, high] onto [score_low, score_high],
/// clamped at both ends. `low > high` inverts the mapping.
#[inline]
pub fn linear_map(value: f64, low: f64, high: f64, score_low: f64, score_high: f64) -> f64 {
    if (high - low).abs() < f64::EPSILON {
        return if value >= high { score_high } else { score_low };
    }
    let ratio = ((value - low) / (high - low)).clamp(0.0, 1.0);
    score_low + ratio * (score_high - score_low)
}

/// Clamp a composite score into [0, 100] and round to a whole point.
#[inline]
pub fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 100.0).round()
}
