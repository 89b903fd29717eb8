//! Shrink-volume breakout detector
//!
//! Decline → consolidation → limit-up → second consolidation on drying volume
//! → breakout on merely average volume. Models a breakout after selling
//! pressure has been absorbed: holders stopped distributing (volume dries up
//! while price holds the limit-up close), so the advance needs no surge.

use std::collections::BTreeMap;

use crate::{
    config::ShrinkBreakoutParams, Bar, BarSeries, ConfigError, PatternMatch, StrategyDetector,
    StrategyId,
};

use super::{
    helpers::{clamp_score, pct_change, range_ratio, volume_ratio},
    stages::{scan_prefix, PrefixRules},
};

#[derive(Debug, Clone, Default)]
pub struct ShrinkVolumeBreakoutDetector {
    pub params: ShrinkBreakoutParams,
}

/// Session shape of the limit-up bar, recorded as a metric.
fn limit_up_kind(bar: &Bar) -> f64 {
    // Boards close pinned at the cap, so exact comparisons are what the data
    // actually carries.
    if bar.open == bar.close && bar.close == bar.high {
        1.0 // one-tick board
    } else if bar.open == bar.low && bar.close == bar.high {
        2.0 // T-board: dipped intraday, recovered the cap
    } else {
        0.0 // ordinary limit-up
    }
}

impl ShrinkVolumeBreakoutDetector {
    pub fn new(params: ShrinkBreakoutParams) -> Self {
        Self { params }
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    fn prefix_rules(&self) -> PrefixRules {
        let p = &self.params;
        PrefixRules {
            decline_pct: p.decline_pct,
            decline_min_len: p.decline_min_len,
            consolidation_range: p.consolidation_range,
            consolidation_min_len: p.consolidation_min_len,
            limit_up_pct: p.limit_up_pct,
            limit_up_tolerance: p.limit_up_tolerance,
            // One-tick boards are acceptable here: absorption matters, not
            // the limit-up session's body
            limit_up_body_min: None,
        }
    }

    fn score(
        &self,
        decline: f64,
        consolidation_len: usize,
        lu_kind: f64,
        spread: f64,
        mean_vr: f64,
        breakout_gain: f64,
    ) -> f64 {
        let mut score = 40.0;
        let extra_len = consolidation_len as f64 - 22.0;
        if extra_len > 0.0 {
            score += ((extra_len / 10.0).floor() * 3.0).min(10.0);
        }
        let extra_decline = decline * 100.0 - 15.0;
        if extra_decline > 0.0 {
            score += ((extra_decline / 5.0).floor() * 3.0).min(10.0);
        }
        score += if lu_kind > 0.0 { 8.0 } else { 5.0 };
        let spread_pct = spread * 100.0;
        if spread_pct < 5.0 {
            score += 8.0;
        } else if spread_pct < 8.0 {
            score += 5.0;
        } else if spread_pct < 10.0 {
            score += 3.0;
        }
        if mean_vr < 0.5 {
            score += 10.0;
        } else if mean_vr < 0.6 {
            score += 8.0;
        } else if mean_vr < 0.7 {
            score += 6.0;
        } else if mean_vr < 0.8 {
            score += 4.0;
        } else if mean_vr < 0.9 {
            score += 2.0;
        }
        let gain_pct = breakout_gain * 100.0;
        if (2.0..=5.0).contains(&gain_pct) {
            score += 8.0;
        } else if gain_pct > 5.0 && gain_pct <= 8.0 {
            score += 5.0;
        }
        // Support held through the second consolidation
        score += 6.0;
        clamp_score(score)
    }
}

impl StrategyDetector for ShrinkVolumeBreakoutDetector {
    fn id(&self) -> StrategyId {
        StrategyId("shrink_volume_breakout")
    }

    fn min_bars(&self) -> usize {
        let p = &self.params;
        // decline base + decline + consolidation + limit-up + second
        // consolidation + breakout
        p.decline_min_len + p.consolidation_min_len + p.consolidation2_min_len + 3
    }

    fn validate_config(&self) -> Result<(), ConfigError> {
        self.params.validate()
    }

    fn evaluate(&self, series: &BarSeries) -> Option<PatternMatch> {
        let p = &self.params;
        let bars = series.bars();
        let n = bars.len();
        if n < self.min_bars() {
            return None;
        }

        let last = n - 1;
        let start = n.saturating_sub(p.scan_window);
        let prefix = scan_prefix(bars, start, last, &self.prefix_rules())?;

        let lu = prefix.limit_up;
        let lu_bar = &bars[lu];
        let consolidation2_len = last - lu - 1;
        if consolidation2_len < p.consolidation2_min_len {
            return None;
        }

        // Second consolidation: range-bound above the limit-up close, with
        // every session trading below the shrink ceiling.
        let mut vr_sum = 0.0;
        let mut close_min = f64::INFINITY;
        let mut close_max = f64::NEG_INFINITY;
        let mut close_sum = 0.0;
        for i in (lu + 1)..last {
            let b = &bars[i];
            if range_ratio(b) >= p.consolidation_range {
                return None;
            }
            if b.close < lu_bar.close {
                return None;
            }
            let vr = volume_ratio(bars, i, p.volume_avg_window);
            if vr >= p.volume_shrink_ratio {
                return None;
            }
            vr_sum += vr;
            close_min = close_min.min(b.close);
            close_max = close_max.max(b.close);
            close_sum += b.close;
        }

        // Breakout: clears every close of the second consolidation with volume
        // back at (not far above) the shrunk baseline.
        let breakout = &bars[last];
        if !breakout.is_bullish() || breakout.close <= close_max {
            return None;
        }
        let breakout_vr = volume_ratio(bars, last, p.volume_avg_window);
        if breakout_vr < 1.0 {
            return None;
        }

        let close_mean = close_sum / consolidation2_len as f64;
        let spread = if close_mean > 0.0 {
            (close_max - close_min) / close_mean
        } else {
            0.0
        };
        let mean_vr = vr_sum / consolidation2_len as f64;
        let lu_change = pct_change(bars[lu - 1].close, lu_bar.close);
        let lu_kind = limit_up_kind(lu_bar);
        let breakout_gain = breakout.change_pct();

        let score = self.score(
            -prefix.decline_return,
            prefix.consolidation_len,
            lu_kind,
            spread,
            mean_vr,
            breakout_gain,
        );

        let metrics = BTreeMap::from(
            [
                ("decline_pct", -prefix.decline_return),
                ("consolidation_len", prefix.consolidation_len as f64),
                ("consolidation_range", prefix.consolidation_range_max),
                ("limit_up_change", lu_change),
                ("limit_up_kind", lu_kind),
                ("consolidation2_len", consolidation2_len as f64),
                ("consolidation2_spread", spread),
                ("consolidation2_volume_ratio", mean_vr),
                ("breakout_volume_ratio", breakout_vr),
                ("breakout_gain", breakout_gain),
                ("score", score),
            ]
            .map(|(k, v)| (k.to_string(), v)),
        );

        Some(PatternMatch {
            instrument: series.instrument().to_string(),
            strategy: self.id(),
            match_date: breakout.date,
            window: bars[prefix.decline_start..=last].iter().map(|b| b.date).collect(),
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, NaiveDate};

    fn bar(offset: usize, o: f64, h: f64, l: f64, c: f64, v: f64) -> Bar {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + Days::new(offset as u64);
        Bar::new(date, o, h, l, c, v)
    }

    /// Decline, consolidation and limit-up as in the volume-breakout shape,
    /// then a quiet 4-bar shelf above the limit-up close and a modest-volume
    /// push through its top.
    fn shrink_bars() -> Vec<Bar> {
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

    fn series(bars: Vec<Bar>) -> BarSeries {
        BarSeries::new("300750", bars).unwrap()
    }

    #[test]
    fn test_fires_on_full_sequence() {
        let detector = ShrinkVolumeBreakoutDetector::with_defaults();
        let m = detector.evaluate(&series(shrink_bars())).unwrap();
        assert_eq!(m.strategy, StrategyId("shrink_volume_breakout"));
        assert_eq!(m.metrics["consolidation2_len"], 4.0);
        assert!(m.metrics["consolidation2_volume_ratio"] < 0.8);
        assert!(m.metrics["breakout_volume_ratio"] >= 1.0);
        assert_eq!(m.metrics["limit_up_kind"], 0.0);
    }

    #[test]
    fn test_no_fire_when_volume_does_not_shrink() {
        let mut bars = shrink_bars();
        bars[12].volume = 12_000.0; // ratio ~0.86, above the 0.8 ceiling
        let detector = ShrinkVolumeBreakoutDetector::with_defaults();
        assert!(detector.evaluate(&series(bars)).is_none());
    }

    #[test]
    fn test_no_fire_when_shelf_loses_limit_up_close() {
        let mut bars = shrink_bars();
        bars[14] = bar(14, 101.2, 101.4, 100.6, 101.0, 5_000.0); // closes below 101.2
        let detector = ShrinkVolumeBreakoutDetector::with_defaults();
        assert!(detector.evaluate(&series(bars)).is_none());
    }

    #[test]
    fn test_no_fire_without_shelf_breakout() {
        let mut bars = shrink_bars();
        bars[16] = bar(16, 101.2, 101.6, 101.0, 101.45, 12_000.0); // under the 101.5 shelf top
        let detector = ShrinkVolumeBreakoutDetector::with_defaults();
        assert!(detector.evaluate(&series(bars)).is_none());
    }

    #[test]
    fn test_no_fire_when_breakout_volume_still_dead() {
        let mut bars = shrink_bars();
        bars[16].volume = 8_000.0; // ratio 0.8, below the 1x confirmation
        let detector = ShrinkVolumeBreakoutDetector::with_defaults();
        assert!(detector.evaluate(&series(bars)).is_none());
    }

    #[test]
    fn test_one_tick_board_accepted_and_classified() {
        let mut bars = shrink_bars();
        bars[11] = bar(11, 101.2, 101.2, 101.2, 101.2, 30_000.0);
        let detector = ShrinkVolumeBreakoutDetector::with_defaults();
        let m = detector.evaluate(&series(bars)).unwrap();
        assert_eq!(m.metrics["limit_up_kind"], 1.0);
    }

    #[test]
    fn test_short_series_never_matches() {
        let detector = ShrinkVolumeBreakoutDetector::with_defaults();
        let truncated = series(shrink_bars()).tail(detector.min_bars() - 1);
        assert!(detector.evaluate(&truncated).is_none());
    }
}
