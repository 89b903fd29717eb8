//! Volume breakout detector
//!
//! Decline → consolidation → limit-up → pullback on contracting volume →
//! breakout above the limit-up high on expanding volume. The surge on the
//! final bar is the confirmation: buyers step back in with size after the
//! pullback failed to break the consolidation floor.

use std::collections::BTreeMap;

use crate::{
    config::VolumeBreakoutParams, BarSeries, ConfigError, PatternMatch, StrategyDetector,
    StrategyId,
};

use super::{
    helpers::{clamp_score, linear_map, pct_change, volume_ratio},
    stages::{scan_prefix, PrefixRules},
};

#[derive(Debug, Clone, Default)]
pub struct VolumeBreakoutDetector {
    pub params: VolumeBreakoutParams,
}

impl VolumeBreakoutDetector {
    pub fn new(params: VolumeBreakoutParams) -> Self {
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
            limit_up_body_min: Some(p.limit_up_body_min),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn score(
        &self,
        decline: f64,
        consolidation_len: usize,
        lu_body_ratio: f64,
        lu_volume_ratio: f64,
        pullback_spread: f64,
        pullback_len: usize,
        breakout_volume_ratio: f64,
        breakout_body_ratio: f64,
    ) -> f64 {
        let mut score = linear_map(decline * 100.0, 15.0, 40.0, 0.0, 15.0);
        score += linear_map(consolidation_len as f64, 22.0, 60.0, 0.0, 10.0);
        score += linear_map(lu_body_ratio, 0.6, 1.0, 0.0, 10.0);
        score += linear_map(lu_volume_ratio, 1.0, 4.0, 0.0, 10.0);
        let spread_pct = pullback_spread * 100.0;
        score += if spread_pct <= 5.0 {
            15.0
        } else {
            linear_map(spread_pct, 10.0, 5.0, 0.0, 15.0)
        };
        score += linear_map(pullback_len as f64, 5.0, 15.0, 0.0, 10.0);
        score += linear_map(breakout_volume_ratio, 1.0, 3.0, 0.0, 15.0);
        score += linear_map(breakout_body_ratio, 0.3, 0.9, 0.0, 15.0);
        clamp_score(score)
    }
}

impl StrategyDetector for VolumeBreakoutDetector {
    fn id(&self) -> StrategyId {
        StrategyId("volume_breakout")
    }

    fn min_bars(&self) -> usize {
        let p = &self.params;
        // decline base + decline + consolidation + limit-up + pullback + breakout
        p.decline_min_len + p.consolidation_min_len + p.pullback_min_len + 3
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
        let pullback_len = last - lu - 1;
        if pullback_len < p.pullback_min_len {
            return None;
        }

        // Pullback: every bar gives back part of the limit-up gain, holds the
        // consolidation floor and trades below its trailing average volume.
        let mut vr_sum = 0.0;
        let mut close_min = f64::INFINITY;
        let mut close_max = f64::NEG_INFINITY;
        let mut close_sum = 0.0;
        for i in (lu + 1)..last {
            let b = &bars[i];
            if b.close >= lu_bar.close {
                return None;
            }
            if b.close < prefix.consolidation_low {
                return None;
            }
            let vr = volume_ratio(bars, i, p.volume_avg_window);
            if vr >= 1.0 {
                return None;
            }
            vr_sum += vr;
            close_min = close_min.min(b.close);
            close_max = close_max.max(b.close);
            close_sum += b.close;
        }

        // Breakout: the most recent bar clears the limit-up high with volume
        // expanded well past the trailing baseline.
        let breakout = &bars[last];
        if !breakout.is_bullish() || breakout.close <= lu_bar.high {
            return None;
        }
        let breakout_vr = volume_ratio(bars, last, p.volume_avg_window);
        if breakout_vr < p.volume_expand_ratio {
            return None;
        }

        let close_mean = close_sum / pullback_len as f64;
        let pullback_spread = if close_mean > 0.0 {
            (close_max - close_min) / close_mean
        } else {
            0.0
        };
        let lu_change = pct_change(bars[lu - 1].close, lu_bar.close);
        let lu_body_ratio = lu_bar.body_ratio().unwrap_or(0.0);
        let lu_volume_ratio = volume_ratio(bars, lu, p.volume_avg_window);
        let breakout_body_ratio = breakout.body_ratio().unwrap_or(0.0);
        let pullback_vr = vr_sum / pullback_len as f64;

        let score = self.score(
            -prefix.decline_return,
            prefix.consolidation_len,
            lu_body_ratio,
            lu_volume_ratio,
            pullback_spread,
            pullback_len,
            breakout_vr,
            breakout_body_ratio,
        );

        let metrics = BTreeMap::from(
            [
                ("decline_pct", -prefix.decline_return),
                ("consolidation_len", prefix.consolidation_len as f64),
                ("consolidation_range", prefix.consolidation_range_max),
                ("limit_up_change", lu_change),
                ("limit_up_body_ratio", lu_body_ratio),
                ("limit_up_volume_ratio", lu_volume_ratio),
                ("pullback_len", pullback_len as f64),
                ("pullback_volume_ratio", pullback_vr),
                ("pullback_spread", pullback_spread),
                ("breakout_volume_ratio", breakout_vr),
                ("breakout_margin", pct_change(lu_bar.high, breakout.close)),
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
