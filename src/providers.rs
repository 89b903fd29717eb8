//! Data-access capability interfaces
//!
//! The screener consumes two collaborators: a universe provider (which
//! instruments exist) and a series provider (daily bars for one instrument).
//! Any concrete data source implements these two traits; the crate ships
//! in-memory implementations for tests, demos and replays.

use std::collections::HashMap;
use std::time::Duration;

use crate::{BarSeries, InstrumentId, SeriesError};

// ============================================================
// ERRORS
// ============================================================

/// Failures surfaced by data providers.
///
/// At the instrument level every variant is recoverable: the screener records
/// it and moves on. A failure from [`UniverseProvider::instruments`] is
/// promoted to a fatal [`ScreenError::Universe`](crate::ScreenError::Universe).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("data source unavailable: {0}")]
    Unavailable(String),

    #[error("no data for instrument {0}")]
    NotFound(InstrumentId),

    #[error("rate limited by data source")]
    RateLimited,

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed series: {0}")]
    Malformed(#[from] SeriesError),
}

// ============================================================
// CAPABILITY TRAITS
// ============================================================

/// Source of the tradable-instrument universe.
pub trait UniverseProvider: Send + Sync {
    fn instruments(&self) -> Result<Vec<InstrumentId>, ProviderError>;
}

/// Source of historical daily bars for one instrument.
///
/// `timeout` is the caller's patience for this single fetch; honoring it is
/// the provider's concern. The returned series carries at most
/// `lookback_days` bars ending at the most recent session.
pub trait SeriesProvider: Send + Sync {
    fn fetch(
        &self,
        instrument: &InstrumentId,
        lookback_days: usize,
        timeout: Duration,
    ) -> Result<BarSeries, ProviderError>;
}

// ============================================================
// IN-MEMORY IMPLEMENTATIONS
// ============================================================

/// Fixed instrument list.
#[derive(Debug, Clone, Default)]
pub struct StaticUniverse {
    instruments: Vec<InstrumentId>,
}

impl StaticUniverse {
    pub fn new<I>(instruments: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<InstrumentId>,
    {
        Self {
            instruments: instruments.into_iter().map(Into::into).collect(),
        }
    }
}

impl UniverseProvider for StaticUniverse {
    fn instruments(&self) -> Result<Vec<InstrumentId>, ProviderError> {
        Ok(self.instruments.clone())
    }
}

/// Pre-loaded series keyed by instrument. Fetches ignore the timeout and
/// return the series tail; unknown instruments report `NotFound`.
#[derive(Debug, Clone, Default)]
pub struct StaticSeriesProvider {
    series: HashMap<InstrumentId, BarSeries>,
}

impl StaticSeriesProvider {
    pub fn new<I>(series: I) -> Self
    where
        I: IntoIterator<Item = BarSeries>,
    {
        Self {
            series: series
                .into_iter()
                .map(|s| (s.instrument().to_string(), s))
                .collect(),
        }
    }
}

impl SeriesProvider for StaticSeriesProvider {
    fn fetch(
        &self,
        instrument: &InstrumentId,
        lookback_days: usize,
        _timeout: Duration,
    ) -> Result<BarSeries, ProviderError> {
        self.series
            .get(instrument)
            .map(|s| s.tail(lookback_days))
            .ok_or_else(|| ProviderError::NotFound(instrument.clone()))
    }
}
