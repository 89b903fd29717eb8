//! Screening thresholds and parameter metadata
//!
//! Every detector is a pure function of its series and the parameter struct it
//! was built with; there is no process-wide configuration state. Parameter
//! metadata enables:
//! - Grid search calibration against historical data
//! - Parameter documentation
//! - Per-run overrides from name→value maps
//!
//! # Example
//!
//! ```rust
//! use candlescreen::config::{PatternConfig, ReversalParams};
//!
//! let cfg = PatternConfig::default();
//! cfg.validate().unwrap();
//!
//! for param in ReversalParams::param_meta() {
//!   println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//! ```

use std::collections::HashMap;

use crate::ConfigError;

// ============================================================
// PARAMETER METADATA
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Fractional ratio (thresholds like 0.03 = 3%; some ratios exceed 1.0,
  /// e.g. volume expansion multiples)
  Ratio,
  /// Session count (positive integer)
  Period,
}

/// Metadata for a single strategy parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name (e.g., "volume_expand_ratio")
  pub name: &'static str,
  /// Parameter type (Ratio or Period)
  pub param_type: ParamType,
  /// Default value
  pub default: f64,
  /// Range for calibration sweeps: (min, max, step)
  pub range: (f64, f64, f64),
  /// Human-readable description
  pub description: &'static str,
}

impl ParamMeta {
  /// Create a new ParamMeta for a Ratio parameter
  pub const fn ratio(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Ratio, default, range, description }
  }

  /// Create a new ParamMeta for a Period parameter
  pub const fn period(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Period, default, range, description }
  }

  /// Generate all values for a calibration sweep
  pub fn generate_grid(&self) -> Vec<f64> {
    let (min, max, step) = self.range;
    let mut values = Vec::new();
    let mut v = min;
    while v <= max + f64::EPSILON {
      values.push(v);
      v += step;
    }
    values
  }

  /// Validate a value for this parameter
  pub fn validate(&self, value: f64) -> Result<(), ConfigError> {
    let (min, max, _) = self.range;
    if value.is_nan() || value < min || value > max {
      return Err(ConfigError::OutOfRange { field: self.name, value, min, max });
    }
    if self.param_type == ParamType::Period && (value < 1.0 || value.fract() != 0.0) {
      return Err(ConfigError::Invalid("period must be a positive integer"));
    }
    Ok(())
  }
}

/// Helper to read an override map with default fallback
fn lookup(params: &HashMap<&str, f64>, key: &str, default: f64) -> f64 {
  params.get(key).copied().unwrap_or(default)
}

// ============================================================
// THREE-DAY REVERSAL
// ============================================================

/// Thresholds for the three-day reversal strategy: a small bearish session,
/// a larger bearish session, then a gap-down session that closes bullish back
/// above the second close, all after a net decline.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ReversalParams {
  /// Upper bound on the first bar's decline, close-over-open fraction
  pub small_body_ratio: f64,
  /// Lower bound on the second bar's decline, close-over-open fraction
  pub large_decline_pct: f64,
  /// Minimum close-over-open gain of the third bar
  pub bull_close_min: f64,
  /// Cap on the largest upper-shadow/range ratio across the three bars
  pub max_upper_shadow: f64,
  /// Bars preceding the three-bar window used for the prior-trend test
  pub prior_trend_bars: usize,
  /// Minimum magnitude of the net decline over the prior-trend bars
  /// (0 = any net decline qualifies)
  pub prior_decline_min: f64,
}

impl Default for ReversalParams {
  fn default() -> Self {
    Self {
      small_body_ratio: 0.03,
      large_decline_pct: 0.03,
      bull_close_min: 0.01,
      max_upper_shadow: 0.30,
      prior_trend_bars: 5,
      prior_decline_min: 0.0,
    }
  }
}

impl ReversalParams {
  pub fn param_meta() -> &'static [ParamMeta] {
    const META: &[ParamMeta] = &[
      ParamMeta::ratio(
        "small_body_ratio",
        0.03,
        (0.005, 0.10, 0.005),
        "Upper bound on day-1 decline fraction",
      ),
      ParamMeta::ratio(
        "large_decline_pct",
        0.03,
        (0.01, 0.10, 0.005),
        "Lower bound on day-2 decline fraction",
      ),
      ParamMeta::ratio(
        "bull_close_min",
        0.01,
        (0.0, 0.05, 0.005),
        "Minimum day-3 close-over-open gain",
      ),
      ParamMeta::ratio(
        "max_upper_shadow",
        0.30,
        (0.05, 0.50, 0.05),
        "Cap on upper-shadow/range over the three bars",
      ),
      ParamMeta::period(
        "prior_trend_bars",
        5.0,
        (3.0, 30.0, 1.0),
        "Lookback prefix establishing the prior downtrend",
      ),
      ParamMeta::ratio(
        "prior_decline_min",
        0.0,
        (0.0, 0.30, 0.01),
        "Minimum net decline over the prefix (0 = any)",
      ),
    ];
    META
  }

  /// Build from an override map; missing keys use defaults.
  pub fn with_params(params: &HashMap<&str, f64>) -> Result<Self, ConfigError> {
    let d = Self::default();
    let built = Self {
      small_body_ratio: lookup(params, "small_body_ratio", d.small_body_ratio),
      large_decline_pct: lookup(params, "large_decline_pct", d.large_decline_pct),
      bull_close_min: lookup(params, "bull_close_min", d.bull_close_min),
      max_upper_shadow: lookup(params, "max_upper_shadow", d.max_upper_shadow),
      prior_trend_bars: lookup(params, "prior_trend_bars", d.prior_trend_bars as f64) as usize,
      prior_decline_min: lookup(params, "prior_decline_min", d.prior_decline_min),
    };
    built.validate()?;
    Ok(built)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    in_range("small_body_ratio", self.small_body_ratio, 0.0, 1.0)?;
    in_range("large_decline_pct", self.large_decline_pct, 0.0, 1.0)?;
    in_range("bull_close_min", self.bull_close_min, 0.0, 1.0)?;
    in_range("max_upper_shadow", self.max_upper_shadow, 0.0, 1.0)?;
    in_range("prior_decline_min", self.prior_decline_min, 0.0, 1.0)?;
    if self.prior_trend_bars == 0 {
      return Err(ConfigError::Invalid("prior_trend_bars must be > 0"));
    }
    Ok(())
  }
}

// ============================================================
// VOLUME BREAKOUT
// ============================================================

/// Thresholds for the volume breakout strategy: decline → consolidation →
/// limit-up → low-volume pullback → expansion breakout.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct VolumeBreakoutParams {
  /// Trailing bars scanned for the five-stage sequence
  pub scan_window: usize,
  /// Minimum net close-to-close decline over the decline stage
  pub decline_pct: f64,
  /// Minimum sessions in the decline stage
  pub decline_min_len: usize,
  /// Per-bar (high-low)/close ceiling inside a consolidation
  pub consolidation_range: f64,
  /// Minimum sessions in the consolidation stage
  pub consolidation_min_len: usize,
  /// Regulatory daily price-move cap modelled by the limit-up bar
  pub limit_up_pct: f64,
  /// Allowed deviation of the limit-up close from prior_close*(1+limit_up_pct)
  pub limit_up_tolerance: f64,
  /// Minimum body/range ratio of the limit-up bar (excludes one-tick boards)
  pub limit_up_body_min: f64,
  /// Minimum sessions in the pullback stage
  pub pullback_min_len: usize,
  /// Trailing window for average-volume baselines
  pub volume_avg_window: usize,
  /// Breakout volume must reach this multiple of the trailing average
  pub volume_expand_ratio: f64,
}

impl Default for VolumeBreakoutParams {
  fn default() -> Self {
    Self {
      scan_window: 40,
      decline_pct: 0.05,
      decline_min_len: 3,
      consolidation_range: 0.03,
      consolidation_min_len: 4,
      limit_up_pct: 0.10,
      limit_up_tolerance: 0.005,
      limit_up_body_min: 0.5,
      pullback_min_len: 2,
      volume_avg_window: 5,
      volume_expand_ratio: 1.5,
    }
  }
}

impl VolumeBreakoutParams {
  pub fn param_meta() -> &'static [ParamMeta] {
    const META: &[ParamMeta] = &[
      ParamMeta::period("scan_window", 40.0, (20.0, 60.0, 5.0), "Trailing bars scanned"),
      ParamMeta::ratio(
        "decline_pct",
        0.05,
        (0.02, 0.30, 0.01),
        "Minimum decline-stage net drop",
      ),
      ParamMeta::period("decline_min_len", 3.0, (2.0, 10.0, 1.0), "Minimum decline sessions"),
      ParamMeta::ratio(
        "consolidation_range",
        0.03,
        (0.01, 0.08, 0.005),
        "Per-bar range/close ceiling in consolidations",
      ),
      ParamMeta::period(
        "consolidation_min_len",
        4.0,
        (3.0, 30.0, 1.0),
        "Minimum consolidation sessions",
      ),
      ParamMeta::ratio("limit_up_pct", 0.10, (0.05, 0.20, 0.01), "Daily price-move cap"),
      ParamMeta::ratio(
        "limit_up_tolerance",
        0.005,
        (0.0, 0.02, 0.001),
        "Allowed deviation from the exact cap",
      ),
      ParamMeta::ratio(
        "limit_up_body_min",
        0.5,
        (0.0, 1.0, 0.05),
        "Minimum limit-up body/range ratio",
      ),
      ParamMeta::period("pullback_min_len", 2.0, (1.0, 10.0, 1.0), "Minimum pullback sessions"),
      ParamMeta::period(
        "volume_avg_window",
        5.0,
        (3.0, 20.0, 1.0),
        "Trailing average-volume window",
      ),
      ParamMeta::ratio(
        "volume_expand_ratio",
        1.5,
        (1.0, 4.0, 0.1),
        "Breakout volume multiple of trailing average",
      ),
    ];
    META
  }

  /// Build from an override map; missing keys use defaults.
  pub fn with_params(params: &HashMap<&str, f64>) -> Result<Self, ConfigError> {
    let d = Self::default();
    let built = Self {
      scan_window: lookup(params, "scan_window", d.scan_window as f64) as usize,
      decline_pct: lookup(params, "decline_pct", d.decline_pct),
      decline_min_len: lookup(params, "decline_min_len", d.decline_min_len as f64) as usize,
      consolidation_range: lookup(params, "consolidation_range", d.consolidation_range),
      consolidation_min_len: lookup(params, "consolidation_min_len", d.consolidation_min_len as f64)
        as usize,
      limit_up_pct: lookup(params, "limit_up_pct", d.limit_up_pct),
      limit_up_tolerance: lookup(params, "limit_up_tolerance", d.limit_up_tolerance),
      limit_up_body_min: lookup(params, "limit_up_body_min", d.limit_up_body_min),
      pullback_min_len: lookup(params, "pullback_min_len", d.pullback_min_len as f64) as usize,
      volume_avg_window: lookup(params, "volume_avg_window", d.volume_avg_window as f64) as usize,
      volume_expand_ratio: lookup(params, "volume_expand_ratio", d.volume_expand_ratio),
    };
    built.validate()?;
    Ok(built)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    in_range("decline_pct", self.decline_pct, 0.0, 1.0)?;
    in_range("consolidation_range", self.consolidation_range, 0.0, 1.0)?;
    in_range("limit_up_pct", self.limit_up_pct, 0.0, 0.5)?;
    in_range("limit_up_tolerance", self.limit_up_tolerance, 0.0, 0.1)?;
    in_range("limit_up_body_min", self.limit_up_body_min, 0.0, 1.0)?;
    in_range("volume_expand_ratio", self.volume_expand_ratio, 0.0, 100.0)?;
    for value in [
      self.scan_window,
      self.decline_min_len,
      self.consolidation_min_len,
      self.pullback_min_len,
      self.volume_avg_window,
    ] {
      if value == 0 {
        return Err(ConfigError::Invalid("stage windows must be > 0"));
      }
    }
    Ok(())
  }
}

// ============================================================
// SHRINK-VOLUME BREAKOUT
// ============================================================

/// Thresholds for the shrink-volume breakout strategy: decline →
/// consolidation → limit-up → second consolidation with drying volume →
/// modest-volume breakout.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ShrinkBreakoutParams {
  /// Trailing bars scanned for the five-stage sequence
  pub scan_window: usize,
  /// Minimum net close-to-close decline over the decline stage
  pub decline_pct: f64,
  /// Minimum sessions in the decline stage
  pub decline_min_len: usize,
  /// Per-bar (high-low)/close ceiling inside both consolidations
  pub consolidation_range: f64,
  /// Minimum sessions in the first consolidation
  pub consolidation_min_len: usize,
  /// Regulatory daily price-move cap modelled by the limit-up bar
  pub limit_up_pct: f64,
  /// Allowed deviation of the limit-up close from prior_close*(1+limit_up_pct)
  pub limit_up_tolerance: f64,
  /// Minimum sessions in the second consolidation
  pub consolidation2_min_len: usize,
  /// Every second-consolidation bar's volume must stay below this multiple
  /// of the trailing average
  pub volume_shrink_ratio: f64,
  /// Trailing window for average-volume baselines
  pub volume_avg_window: usize,
}

impl Default for ShrinkBreakoutParams {
  fn default() -> Self {
    Self {
      scan_window: 40,
      decline_pct: 0.05,
      decline_min_len: 3,
      consolidation_range: 0.03,
      consolidation_min_len: 4,
      limit_up_pct: 0.10,
      limit_up_tolerance: 0.005,
      consolidation2_min_len: 3,
      volume_shrink_ratio: 0.8,
      volume_avg_window: 5,
    }
  }
}

impl ShrinkBreakoutParams {
  pub fn param_meta() -> &'static [ParamMeta] {
    const META: &[ParamMeta] = &[
      ParamMeta::period("scan_window", 40.0, (20.0, 60.0, 5.0), "Trailing bars scanned"),
      ParamMeta::ratio(
        "decline_pct",
        0.05,
        (0.02, 0.30, 0.01),
        "Minimum decline-stage net drop",
      ),
      ParamMeta::period("decline_min_len", 3.0, (2.0, 10.0, 1.0), "Minimum decline sessions"),
      ParamMeta::ratio(
        "consolidation_range",
        0.03,
        (0.01, 0.08, 0.005),
        "Per-bar range/close ceiling in consolidations",
      ),
      ParamMeta::period(
        "consolidation_min_len",
        4.0,
        (3.0, 30.0, 1.0),
        "Minimum first-consolidation sessions",
      ),
      ParamMeta::ratio("limit_up_pct", 0.10, (0.05, 0.20, 0.01), "Daily price-move cap"),
      ParamMeta::ratio(
        "limit_up_tolerance",
        0.005,
        (0.0, 0.02, 0.001),
        "Allowed deviation from the exact cap",
      ),
      ParamMeta::period(
        "consolidation2_min_len",
        3.0,
        (2.0, 15.0, 1.0),
        "Minimum second-consolidation sessions",
      ),
      ParamMeta::ratio(
        "volume_shrink_ratio",
        0.8,
        (0.3, 1.0, 0.05),
        "Volume ceiling multiple during the second consolidation",
      ),
      ParamMeta::period(
        "volume_avg_window",
        5.0,
        (3.0, 20.0, 1.0),
        "Trailing average-volume window",
      ),
    ];
    META
  }

  /// Build from an override map; missing keys use defaults.
  pub fn with_params(params: &HashMap<&str, f64>) -> Result<Self, ConfigError> {
    let d = Self::default();
    let built = Self {
      scan_window: lookup(params, "scan_window", d.scan_window as f64) as usize,
      decline_pct: lookup(params, "decline_pct", d.decline_pct),
      decline_min_len: lookup(params, "decline_min_len", d.decline_min_len as f64) as usize,
      consolidation_range: lookup(params, "consolidation_range", d.consolidation_range),
      consolidation_min_len: lookup(params, "consolidation_min_len", d.consolidation_min_len as f64)
        as usize,
      limit_up_pct: lookup(params, "limit_up_pct", d.limit_up_pct),
      limit_up_tolerance: lookup(params, "limit_up_tolerance", d.limit_up_tolerance),
      consolidation2_min_len: lookup(
        params,
        "consolidation2_min_len",
        d.consolidation2_min_len as f64,
      ) as usize,
      volume_shrink_ratio: lookup(params, "volume_shrink_ratio", d.volume_shrink_ratio),
      volume_avg_window: lookup(params, "volume_avg_window", d.volume_avg_window as f64) as usize,
    };
    built.validate()?;
    Ok(built)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    in_range("decline_pct", self.decline_pct, 0.0, 1.0)?;
    in_range("consolidation_range", self.consolidation_range, 0.0, 1.0)?;
    in_range("limit_up_pct", self.limit_up_pct, 0.0, 0.5)?;
    in_range("limit_up_tolerance", self.limit_up_tolerance, 0.0, 0.1)?;
    in_range("volume_shrink_ratio", self.volume_shrink_ratio, 0.0, 1.0)?;
    for value in [
      self.scan_window,
      self.decline_min_len,
      self.consolidation_min_len,
      self.consolidation2_min_len,
      self.volume_avg_window,
    ] {
      if value == 0 {
        return Err(ConfigError::Invalid("stage windows must be > 0"));
      }
    }
    Ok(())
  }
}

// ============================================================
// COMBINED CONFIG
// ============================================================

/// All three strategies' thresholds, supplied once per screening run.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PatternConfig {
  pub reversal: ReversalParams,
  pub volume_breakout: VolumeBreakoutParams,
  pub shrink_breakout: ShrinkBreakoutParams,
}

impl PatternConfig {
  /// Validate every threshold; called by the screener before any fetch.
  pub fn validate(&self) -> Result<(), ConfigError> {
    self.reversal.validate()?;
    self.volume_breakout.validate()?;
    self.shrink_breakout.validate()?;
    Ok(())
  }
}

fn in_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
  if value.is_nan() || value < min || value > max {
    return Err(ConfigError::OutOfRange { field, value, min, max });
  }
  Ok(())
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_are_valid() {
    assert!(PatternConfig::default().validate().is_ok());
  }

  #[test]
  fn test_negative_ratio_rejected() {
    let mut cfg = PatternConfig::default();
    cfg.volume_breakout.volume_expand_ratio = -1.0;
    assert!(matches!(
      cfg.validate(),
      Err(ConfigError::OutOfRange { field: "volume_expand_ratio", .. })
    ));
  }

  #[test]
  fn test_zero_window_rejected() {
    let mut cfg = PatternConfig::default();
    cfg.shrink_breakout.scan_window = 0;
    assert!(cfg.validate().is_err());
  }

  #[test]
  fn test_nan_rejected() {
    let mut cfg = PatternConfig::default();
    cfg.reversal.small_body_ratio = f64::NAN;
    assert!(cfg.validate().is_err());
  }

  #[test]
  fn test_with_params_override() {
    let mut overrides = HashMap::new();
    overrides.insert("volume_expand_ratio", 2.0);
    let params = VolumeBreakoutParams::with_params(&overrides).unwrap();
    assert_eq!(params.volume_expand_ratio, 2.0);
    assert_eq!(params.scan_window, VolumeBreakoutParams::default().scan_window);
  }

  #[test]
  fn test_with_params_rejects_bad_override() {
    let mut overrides = HashMap::new();
    overrides.insert("volume_shrink_ratio", 3.0);
    assert!(ShrinkBreakoutParams::with_params(&overrides).is_err());
  }

  #[test]
  fn test_param_meta_defaults_match_struct_defaults() {
    let d = ReversalParams::default();
    for meta in ReversalParams::param_meta() {
      let actual = match meta.name {
        "small_body_ratio" => d.small_body_ratio,
        "large_decline_pct" => d.large_decline_pct,
        "bull_close_min" => d.bull_close_min,
        "max_upper_shadow" => d.max_upper_shadow,
        "prior_trend_bars" => d.prior_trend_bars as f64,
        "prior_decline_min" => d.prior_decline_min,
        other => panic!("unknown param {other}"),
      };
      assert_eq!(meta.default, actual, "{} default drifted", meta.name);
    }
  }

  #[test]
  fn test_generate_grid() {
    let meta = ParamMeta::ratio("test", 0.5, (0.3, 0.7, 0.2), "Test");
    let grid = meta.generate_grid();
    assert_eq!(grid.len(), 3);
    assert!((grid[0] - 0.3).abs() < f64::EPSILON);
    assert!((grid[2] - 0.7).abs() < f64::EPSILON);
  }

  #[test]
  fn test_meta_validate_period() {
    let meta = ParamMeta::period("test", 5.0, (2.0, 10.0, 1.0), "Test");
    assert!(meta.validate(5.0).is_ok());
    assert!(meta.validate(5.5).is_err());
    assert!(meta.validate(1.0).is_err());
    assert!(meta.validate(12.0).is_err());
  }

  #[test]
  fn test_serde_partial_override() {
    let json = r#"{ "volume_breakout": { "volume_expand_ratio": 2.5 } }"#;
    let cfg: PatternConfig = serde_json::from_str(json).unwrap();
    assert_eq!(cfg.volume_breakout.volume_expand_ratio, 2.5);
    assert_eq!(cfg.reversal, ReversalParams::default());
  }
}
