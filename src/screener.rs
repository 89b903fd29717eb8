//! Screening orchestration
//!
//! Iterates the instrument universe, fetches each instrument's series from the
//! provider, runs the three strategy detectors in declaration order and
//! aggregates everything into one [`ScreeningResult`]. One instrument's
//! failure never aborts the run; only a missing universe does.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    config::PatternConfig,
    detectors::{ShrinkVolumeBreakoutDetector, ThreeDayReversalDetector, VolumeBreakoutDetector},
    providers::{SeriesProvider, UniverseProvider},
    ConfigError, InstrumentFailure, InstrumentId, PatternMatch, ScreenError, ScreeningResult,
    SeriesError, StrategyDetector,
};

// ============================================================
// RUN CONFIGURATION
// ============================================================

/// Run-level knobs, as opposed to the classification thresholds carried by
/// [`PatternConfig`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ScreenerConfig {
    /// Trading days of history requested per instrument.
    pub lookback_days: usize,
    /// Concurrent fetch/evaluate workers. A bound of 1 runs fully
    /// sequentially, which is what rate-limited providers usually want.
    pub concurrency: usize,
    /// Patience for a single series fetch, passed through to the provider.
    pub fetch_timeout: Duration,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            lookback_days: 200,
            concurrency: 8,
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

impl ScreenerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lookback_days == 0 {
            return Err(ConfigError::Invalid("lookback_days must be > 0"));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be > 0"));
        }
        Ok(())
    }
}

// ============================================================
// SCREENER
// ============================================================

/// Per-instrument outcome inside a run; merged by the aggregator in universe
/// order.
enum Outcome {
    Matched(Vec<PatternMatch>),
    Failed(InstrumentFailure),
    Skipped,
}

/// The screening orchestrator. Detectors are built once from the validated
/// [`PatternConfig`] and shared read-only across workers.
pub struct Screener {
    reversal: ThreeDayReversalDetector,
    volume_breakout: VolumeBreakoutDetector,
    shrink_breakout: ShrinkVolumeBreakoutDetector,
    config: ScreenerConfig,
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for Screener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screener")
            .field("reversal", &self.reversal)
            .field("volume_breakout", &self.volume_breakout)
            .field("shrink_breakout", &self.shrink_breakout)
            .field("config", &self.config)
            .field("pool", &format_args!("ThreadPool({} threads)", self.pool.current_num_threads()))
            .finish()
    }
}

impl Screener {
    /// Validates both configs before anything is fetched; an invalid
    /// threshold fails here, not mid-run.
    pub fn new(patterns: PatternConfig, config: ScreenerConfig) -> Result<Self, ScreenError> {
        patterns.validate()?;
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.concurrency)
            .build()
            .map_err(|_| ConfigError::Invalid("failed to build worker pool"))?;
        Ok(Self {
            reversal: ThreeDayReversalDetector::new(patterns.reversal),
            volume_breakout: VolumeBreakoutDetector::new(patterns.volume_breakout),
            shrink_breakout: ShrinkVolumeBreakoutDetector::new(patterns.shrink_breakout),
            config,
            pool,
        })
    }

    /// Detectors in declaration order; matches are appended in this order
    /// within each instrument.
    fn detectors(&self) -> [&dyn StrategyDetector; 3] {
        [&self.reversal, &self.volume_breakout, &self.shrink_breakout]
    }

    /// Shortest series any detector can work with. Below this the instrument
    /// is recorded as an error rather than silently yielding nothing.
    fn min_required(&self) -> usize {
        self.detectors()
            .iter()
            .map(|d| d.min_bars())
            .min()
            .unwrap_or(0)
    }

    /// Screen the whole universe.
    pub fn run(
        &self,
        universe: &dyn UniverseProvider,
        series: &dyn SeriesProvider,
    ) -> Result<ScreeningResult, ScreenError> {
        self.run_cancellable(universe, series, &AtomicBool::new(false))
    }

    /// Screen the whole universe, checking `cancel` before each new fetch.
    /// Cancellation stops issuing fetches; instruments already in flight
    /// finish normally and cancelled ones are simply absent from the result.
    pub fn run_cancellable(
        &self,
        universe: &dyn UniverseProvider,
        series: &dyn SeriesProvider,
        cancel: &AtomicBool,
    ) -> Result<ScreeningResult, ScreenError> {
        let started = Instant::now();
        let instruments = universe.instruments().map_err(ScreenError::Universe)?;
        info!(universe = instruments.len(), "screening run started");

        let outcomes: Vec<Outcome> = self.pool.install(|| {
            instruments
                .par_iter()
                .map(|id| self.screen_one(id, series, cancel))
                .collect()
        });

        let mut aggregator = Aggregator::new();
        for outcome in outcomes {
            match outcome {
                Outcome::Matched(matches) => aggregator.push_matches(matches),
                Outcome::Failed(failure) => aggregator.push_error(failure),
                Outcome::Skipped => {}
            }
        }
        let result = aggregator.finish(instruments.len());

        info!(
            universe = result.universe_size,
            matches = result.matches.len(),
            errors = result.errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "screening run finished"
        );
        Ok(result)
    }

    fn screen_one(
        &self,
        instrument: &InstrumentId,
        series: &dyn SeriesProvider,
        cancel: &AtomicBool,
    ) -> Outcome {
        if cancel.load(Ordering::Relaxed) {
            debug!(instrument = %instrument, "cancelled before fetch");
            return Outcome::Skipped;
        }

        let fetched = match series.fetch(
            instrument,
            self.config.lookback_days,
            self.config.fetch_timeout,
        ) {
            Ok(s) => s,
            Err(e) => {
                warn!(instrument = %instrument, error = %e, "series fetch failed");
                return Outcome::Failed(InstrumentFailure {
                    instrument: instrument.clone(),
                    reason: e.to_string(),
                });
            }
        };

        let need = self.min_required();
        if fetched.len() < need {
            let reason = SeriesError::Insufficient {
                need,
                got: fetched.len(),
            };
            warn!(instrument = %instrument, %reason, "series too short");
            return Outcome::Failed(InstrumentFailure {
                instrument: instrument.clone(),
                reason: reason.to_string(),
            });
        }

        let mut matches = Vec::new();
        for detector in self.detectors() {
            if let Some(m) = detector.evaluate(&fetched) {
                debug!(instrument = %instrument, strategy = %m.strategy, "pattern matched");
                matches.push(m);
            }
        }
        Outcome::Matched(matches)
    }
}

// ============================================================
// AGGREGATOR
// ============================================================

/// Builds the final [`ScreeningResult`]: keeps insertion order, drops exact
/// `(instrument, strategy, match_date)` repeats and stamps the run date when
/// finished. Matches are never mutated after creation.
#[derive(Debug, Default)]
pub struct Aggregator {
    matches: Vec<PatternMatch>,
    errors: Vec<InstrumentFailure>,
    seen: std::collections::HashSet<(InstrumentId, crate::StrategyId, chrono::NaiveDate)>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_match(&mut self, m: PatternMatch) {
        let key = (m.instrument.clone(), m.strategy, m.match_date);
        if self.seen.insert(key) {
            self.matches.push(m);
        }
    }

    pub fn push_matches(&mut self, matches: impl IntoIterator<Item = PatternMatch>) {
        for m in matches {
            self.push_match(m);
        }
    }

    pub fn push_error(&mut self, failure: InstrumentFailure) {
        self.errors.push(failure);
    }

    pub fn finish(self, universe_size: usize) -> ScreeningResult {
        ScreeningResult {
            run_date: chrono::Utc::now(),
            universe_size,
            matches: self.matches,
            errors: self.errors,
        }
    }
}
