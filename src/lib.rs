//! # candlescreen - Multi-Strategy Candlestick Screener
//!
//! Screens a universe of equity instruments' daily OHLCV history for three
//! multi-day candlestick setups: a three-day reversal, a volume-confirmed
//! breakout and a shrink-volume breakout.
//!
//! ## Quick Start
//!
//! ```rust
//! use candlescreen::prelude::*;
//! use chrono::{Days, NaiveDate};
//!
//! // Build a series for one instrument (normally fetched from a data source)
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let bars: Vec<Bar> = (0..40)
//!     .map(|i| {
//!         let px = 100.0 - i as f64 * 0.1;
//!         Bar::new(
//!             start + Days::new(i),
//!             px,
//!             px + 0.5,
//!             px - 0.5,
//!             px - 0.05,
//!             10_000.0,
//!         )
//!     })
//!     .collect();
//! let series = BarSeries::new("600519", bars).unwrap();
//!
//! // Wire up in-memory providers and run a screening pass
//! let universe = StaticUniverse::new(["600519"]);
//! let provider = StaticSeriesProvider::new([series]);
//! let screener = Screener::new(PatternConfig::default(), ScreenerConfig::default()).unwrap();
//!
//! let result = screener.run(&universe, &provider).unwrap();
//! assert_eq!(result.universe_size, 1);
//! ```

pub mod config;
pub mod detectors;
pub mod providers;
pub mod screener;

pub mod prelude {
    pub use crate::{
        // Configuration
        config::{
            ParamMeta, ParamType, PatternConfig, ReversalParams, ShrinkBreakoutParams,
            VolumeBreakoutParams,
        },
        // Detectors
        detectors::{ShrinkVolumeBreakoutDetector, ThreeDayReversalDetector, VolumeBreakoutDetector},
        // Providers
        providers::{
            ProviderError, SeriesProvider, StaticSeriesProvider, StaticUniverse, UniverseProvider,
        },
        // Orchestration
        screener::{Aggregator, Screener, ScreenerConfig},
        // Types
        Bar,
        BarSeries,
        ConfigError,
        InstrumentFailure,
        InstrumentId,
        PatternMatch,
        ScreenError,
        ScreeningResult,
        SeriesError,
        // Core traits
        StrategyDetector,
        StrategyId,
    };
}

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

/// Exchange ticker / instrument code.
pub type InstrumentId = String;

// ============================================================
// ERRORS
// ============================================================

/// Fatal, run-level errors. Anything recoverable at the instrument level is
/// recorded inside [`ScreeningResult::errors`] instead.
#[derive(Debug, thiserror::Error)]
pub enum ScreenError {
    /// The instrument universe could not be obtained; no partial result exists.
    #[error("universe unavailable: {0}")]
    Universe(crate::providers::ProviderError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Invalid threshold or window configuration, rejected before any fetch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Malformed or insufficient bar data for a single instrument.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeriesError {
    #[error("invalid bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: &'static str },

    #[error("bar dates not strictly ascending at index {index}")]
    UnorderedDates { index: usize },

    #[error("insufficient data: need {need} bars, got {got}")]
    Insufficient { need: usize, got: usize },
}

// ============================================================
// BAR
// ============================================================

/// One daily trading session for an instrument.
///
/// Invariants (`high >= max(open, close)`, `low <= min(open, close)`,
/// positive prices, non-negative finite volume) are enforced by
/// [`Bar::validate`] when a [`BarSeries`] is constructed, not by this plain
/// record.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    #[inline]
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    #[inline]
    pub fn upper_shadow(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    #[inline]
    pub fn lower_shadow(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    #[inline]
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    #[inline]
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Close-over-open change as a fraction of the open.
    #[inline]
    pub fn change_pct(&self) -> f64 {
        if self.open > 0.0 {
            (self.close - self.open) / self.open
        } else {
            0.0
        }
    }

    /// Body as ratio of range. Returns None if range ≈ 0 (one-tick session).
    #[inline]
    pub fn body_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.body() / range)
    }

    #[inline]
    pub fn upper_shadow_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.upper_shadow() / range)
    }

    #[inline]
    pub fn lower_shadow_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.lower_shadow() / range)
    }

    /// Validate session data consistency.
    pub fn validate(&self) -> Result<(), SeriesError> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite()) || !self.volume.is_finite() {
            return Err(SeriesError::InvalidBar {
                index: 0,
                reason: "NaN or infinite value",
            });
        }
        if prices.iter().any(|p| *p <= 0.0) {
            return Err(SeriesError::InvalidBar {
                index: 0,
                reason: "non-positive price",
            });
        }
        if self.high < self.open.max(self.close) {
            return Err(SeriesError::InvalidBar {
                index: 0,
                reason: "high below body",
            });
        }
        if self.low > self.open.min(self.close) {
            return Err(SeriesError::InvalidBar {
                index: 0,
                reason: "low above body",
            });
        }
        if self.volume < 0.0 {
            return Err(SeriesError::InvalidBar {
                index: 0,
                reason: "negative volume",
            });
        }
        Ok(())
    }
}

// ============================================================
// BAR SERIES
// ============================================================

/// An instrument's daily bars, strictly ascending by date.
///
/// Construction validates every bar and the date ordering; once built the
/// series is read-only, so detectors can assume a well-formed input.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BarSeries {
    instrument: InstrumentId,
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(instrument: impl Into<InstrumentId>, bars: Vec<Bar>) -> Result<Self, SeriesError> {
        for (i, bar) in bars.iter().enumerate() {
            bar.validate().map_err(|e| match e {
                SeriesError::InvalidBar { reason, .. } => SeriesError::InvalidBar { index: i, reason },
                other => other,
            })?;
        }
        for (i, pair) in bars.windows(2).enumerate() {
            if pair[1].date <= pair[0].date {
                return Err(SeriesError::UnorderedDates { index: i + 1 });
            }
        }
        Ok(Self {
            instrument: instrument.into(),
            bars,
        })
    }

    #[inline]
    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    #[inline]
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    #[inline]
    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Last `n` bars as a new series. Slicing preserves every invariant, so
    /// this cannot fail.
    pub fn tail(&self, n: usize) -> BarSeries {
        let start = self.bars.len().saturating_sub(n);
        BarSeries {
            instrument: self.instrument.clone(),
            bars: self.bars[start..].to_vec(),
        }
    }
}

// ============================================================
// STRATEGY ID / PATTERN MATCH
// ============================================================

/// Unique identifier for a screening strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StrategyId(pub &'static str);

impl StrategyId {
    /// Returns the string identifier
    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for StrategyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl serde::Serialize for StrategyId {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.0)
    }
}

/// Result of a detector: one strategy's full stage sequence was found ending
/// at `match_date`. Immutable once produced.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PatternMatch {
    pub instrument: InstrumentId,
    pub strategy: StrategyId,
    pub match_date: NaiveDate,
    /// Dates of the bars spanned by the matched window, ascending.
    pub window: Vec<NaiveDate>,
    /// Per-strategy diagnostic metrics, name → value.
    pub metrics: BTreeMap<String, f64>,
}

// ============================================================
// SCREENING RESULT
// ============================================================

/// Per-instrument failure recorded during a run. The run itself continues.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct InstrumentFailure {
    pub instrument: InstrumentId,
    pub reason: String,
}

/// Finalized output of one screening run, handed to reporting collaborators.
///
/// `matches` preserves universe order, with the strategy declaration order
/// (reversal, volume breakout, shrink breakout) within each instrument.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScreeningResult {
    pub run_date: DateTime<Utc>,
    pub universe_size: usize,
    pub matches: Vec<PatternMatch>,
    pub errors: Vec<InstrumentFailure>,
}

// ============================================================
// STRATEGY DETECTOR TRAIT
// ============================================================

/// A pure classifier from a bar series to an optional match at the series'
/// most recent bar.
///
/// Implementations never panic and never mutate the series: a series of any
/// valid shape yields a definite match-or-no-match. Series shorter than
/// [`min_bars`](StrategyDetector::min_bars) always yield `None`.
pub trait StrategyDetector: Send + Sync {
    fn id(&self) -> StrategyId;

    /// Minimum series length for this strategy's full stage sequence.
    fn min_bars(&self) -> usize;

    fn evaluate(&self, series: &BarSeries) -> Option<PatternMatch>;

    fn validate_config(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

// ============================================================
// TESTS
// ============================================================
