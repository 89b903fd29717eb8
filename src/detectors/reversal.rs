//! Three-day reversal detector
//!
//! A small bearish session, a second bearish session with a clearly larger
//! decline, then a session that opens at or below the second close and closes
//! bullish back above it. Only considered after a net decline over the
//! preceding bars, so the pattern reads as exhaustion of a downtrend rather
//! than noise inside a range.

use std::collections::BTreeMap;

use crate::{
    config::ReversalParams, BarSeries, ConfigError, PatternMatch, StrategyDetector, StrategyId,
};

use super::helpers::{clamp_score, pct_change};

#[derive(Debug, Clone, Default)]
pub struct ThreeDayReversalDetector {
    pub params: ReversalParams,
}

impl ThreeDayReversalDetector {
    pub fn new(params: ReversalParams) -> Self {
        Self { params }
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    fn score(
        &self,
        decl1: f64,
        decl2: f64,
        gap: f64,
        d2_gap: f64,
        b3_gain: f64,
        contrast: f64,
        engulfed: bool,
        max_shadow: f64,
    ) -> f64 {
        // Rubric works in percent space; inputs are fractions.
        let mut score = 40.0;
        score += ((decl2 * 100.0 - 3.0).min(5.0)).max(0.0) * 2.0;
        score += (gap.abs() * 100.0).min(3.0) * 2.0;
        if !engulfed {
            score += 8.0;
        }
        if d2_gap < 0.0 {
            score += (d2_gap.abs() * 100.0).min(2.0) * 5.0;
        }
        let b3_pct = b3_gain * 100.0;
        if b3_pct <= 3.0 {
            score += 8.0;
        } else if b3_pct <= 5.0 {
            score += 4.0;
        }
        if decl1 > 0.0 {
            score += ((contrast - 1.5).min(3.0)).max(0.0) * 3.33;
        }
        let shadow_pct = max_shadow * 100.0;
        if shadow_pct <= 10.0 {
            score += 8.0;
        } else if shadow_pct <= 20.0 {
            score += 5.0;
        } else if shadow_pct <= 30.0 {
            score += 2.0;
        }
        clamp_score(score)
    }
}

impl StrategyDetector for ThreeDayReversalDetector {
    fn id(&self) -> StrategyId {
        StrategyId("three_day_reversal")
    }

    fn min_bars(&self) -> usize {
        3 + self.params.prior_trend_bars
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

        // Prior trend: net close-to-close change over the prefix immediately
        // before the three-bar window must be a decline.
        let prior_change = pct_change(bars[n - 3 - p.prior_trend_bars].close, bars[n - 4].close);
        if prior_change >= 0.0 || -prior_change < p.prior_decline_min {
            return None;
        }

        let b1 = &bars[n - 3];
        let b2 = &bars[n - 2];
        let b3 = &bars[n - 1];

        // Day 1: small bearish body
        let decl1 = -b1.change_pct();
        if !b1.is_bearish() || decl1 >= p.small_body_ratio {
            return None;
        }

        // Day 2: bearish, strictly larger decline than day 1
        let decl2 = -b2.change_pct();
        if !b2.is_bearish() || decl2 <= p.large_decline_pct || decl2 <= decl1 {
            return None;
        }

        // Day 3: gap-down or flat open, bullish close back above day 2's close
        let b3_gain = b3.change_pct();
        if b3.open > b2.close || !b3.is_bullish() || b3.close <= b2.close {
            return None;
        }
        if b3_gain < p.bull_close_min {
            return None;
        }

        // Heavy selling wicks on any of the three bars disqualify the setup
        let max_shadow = [b1, b2, b3]
            .iter()
            .map(|b| b.upper_shadow_ratio().unwrap_or(0.0))
            .fold(0.0f64, f64::max);
        if max_shadow > p.max_upper_shadow {
            return None;
        }

        let gap = pct_change(b2.close, b3.open);
        let d2_gap = pct_change(b1.close, b2.open);
        let contrast = if decl1 > 0.0 { decl2 / decl1 } else { 0.0 };
        let engulfed = b2.high >= b1.high && b2.low <= b1.low;
        let close_strength = pct_change(b2.close, b3.close);

        let score = self.score(
            decl1, decl2, gap, d2_gap, b3_gain, contrast, engulfed, max_shadow,
        );

        let metrics = BTreeMap::from(
            [
                ("b1_body_ratio", decl1),
                ("b2_body_ratio", decl2),
                ("b2_to_b1_contrast", contrast),
                ("b3_gap_open", gap),
                ("b3_close_strength", close_strength),
                ("b3_above_b1_open", if b3.close > b1.open { 1.0 } else { 0.0 }),
                ("prior_decline", prior_change),
                ("max_upper_shadow", max_shadow),
                ("score", score),
            ]
            .map(|(k, v)| (k.to_string(), v)),
        );

        Some(PatternMatch {
            instrument: series.instrument().to_string(),
            strategy: self.id(),
            match_date: b3.date,
            window: vec![b1.date, b2.date, b3.date],
            metrics,
        })
    }
}
