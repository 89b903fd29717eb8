//! Forward stage scanning shared by the breakout detectors
//!
//! Both breakout strategies open with the same three stages: a decline, a
//! low-volatility consolidation and a limit-up bar. [`scan_prefix`] finds that
//! prefix in one forward pass with no backtracking; each detector then
//! continues with its own fourth and fifth stage (pullback + expansion
//! breakout, or second consolidation + shrink breakout). A stage hands over at
//! the first bar satisfying the next stage's entry condition, once the current
//! stage has lasted its minimum number of sessions.

use crate::Bar;

use super::helpers::{is_limit_up, pct_change, range_ratio};

/// States of the five-stage scan. The shared scanner drives
/// `Decline → Consolidation → LimitUp`; the detectors continue with
/// `Pullback` or `SecondConsolidation` and finish at `Breakout`. Any bar that
/// breaks its stage's condition moves the scan to `Rejected`, which is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Decline,
    Consolidation,
    LimitUp,
    Pullback,
    SecondConsolidation,
    Breakout,
    Rejected,
}

/// Entry conditions and stage minimums for the shared three-stage prefix.
#[derive(Debug, Clone)]
pub struct PrefixRules {
    pub decline_pct: f64,
    pub decline_min_len: usize,
    pub consolidation_range: f64,
    pub consolidation_min_len: usize,
    pub limit_up_pct: f64,
    pub limit_up_tolerance: f64,
    /// Minimum body/range ratio for the limit-up bar; `None` also accepts
    /// one-tick boards (open = close = high, zero range).
    pub limit_up_body_min: Option<f64>,
}

/// Boundaries and summary figures of a completed decline → consolidation →
/// limit-up prefix. All indices are into the scanned slice.
#[derive(Debug, Clone)]
pub struct StagePrefix {
    pub decline_start: usize,
    pub decline_len: usize,
    /// Net close-to-close return over the decline stage (negative).
    pub decline_return: f64,
    pub consolidation_start: usize,
    pub consolidation_len: usize,
    /// Lowest low of the consolidation stage; the pullback floor.
    pub consolidation_low: f64,
    /// Largest per-bar (high-low)/close seen inside the consolidation.
    pub consolidation_range_max: f64,
    /// Index of the limit-up bar.
    pub limit_up: usize,
}

/// One forward pass over `bars[start..end]` looking for the shared prefix.
/// Returns at the first completed prefix; a consolidation bar that breaks the
/// range condition without being the limit-up bar rejects the whole scan (no
/// backtracking), and an exhausted window yields `None`.
pub fn scan_prefix(bars: &[Bar], start: usize, end: usize, rules: &PrefixRules) -> Option<StagePrefix> {
    if end > bars.len() || start + 1 >= end {
        return None;
    }

    let mut state = ScanState::Decline;
    let decline_start = start;
    let mut consolidation_start = 0usize;
    let mut consolidation_low = f64::INFINITY;
    let mut consolidation_range_max = 0.0f64;

    for i in (start + 1)..end {
        let bar = &bars[i];
        match state {
            ScanState::Decline => {
                let stage_len = i - decline_start;
                let net = pct_change(bars[decline_start].close, bars[i - 1].close);
                if stage_len >= rules.decline_min_len
                    && net <= -rules.decline_pct
                    && range_ratio(bar) < rules.consolidation_range
                {
                    state = ScanState::Consolidation;
                    consolidation_start = i;
                    consolidation_low = bar.low;
                    consolidation_range_max = range_ratio(bar);
                }
                // otherwise the bar extends the decline
            }
            ScanState::Consolidation => {
                let stage_len = i - consolidation_start;
                if stage_len >= rules.consolidation_min_len
                    && is_limit_up(bar, bars[i - 1].close, rules.limit_up_pct, rules.limit_up_tolerance)
                    && limit_up_shape_ok(bar, rules)
                {
                    return Some(StagePrefix {
                        decline_start,
                        decline_len: consolidation_start - decline_start,
                        decline_return: pct_change(
                            bars[decline_start].close,
                            bars[consolidation_start - 1].close,
                        ),
                        consolidation_start,
                        consolidation_len: stage_len,
                        consolidation_low,
                        consolidation_range_max,
                        limit_up: i,
                    });
                }
                if range_ratio(bar) < rules.consolidation_range {
                    consolidation_low = consolidation_low.min(bar.low);
                    consolidation_range_max = consolidation_range_max.max(range_ratio(bar));
                } else {
                    state = ScanState::Rejected;
                }
            }
            _ => break,
        }
        if state == ScanState::Rejected {
            break;
        }
    }

    None
}

fn limit_up_shape_ok(bar: &Bar, rules: &PrefixRules) -> bool {
    match rules.limit_up_body_min {
        Some(min) => bar.is_bullish() && bar.body_ratio().is_some_and(|r| r >= min),
        None => true,
    }
}
