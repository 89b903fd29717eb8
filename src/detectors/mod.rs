//! Strategy detectors
//!
//! Each detector classifies a [`BarSeries`](crate::BarSeries) at its most
//! recent bar and returns a [`PatternMatch`](crate::PatternMatch) when the
//! strategy's complete stage sequence is present.
//!
//! # Strategies
//!
//! - **Three-day reversal**: small bearish bar, larger bearish bar, gap-down
//!   bar closing bullish back above the second close, after a net decline.
//! - **Volume breakout**: decline → consolidation → limit-up → low-volume
//!   pullback → breakout on expanding volume.
//! - **Shrink-volume breakout**: decline → consolidation → limit-up → second
//!   consolidation with drying volume → breakout on merely average volume.

pub mod helpers;
pub mod reversal;
pub mod shrink_breakout;
pub mod stages;
pub mod volume_breakout;

// Re-export the detectors for convenience
pub use reversal::ThreeDayReversalDetector;
pub use shrink_breakout::ShrinkVolumeBreakoutDetector;
pub use stages::{ScanState, StagePrefix};
pub use volume_breakout::VolumeBreakoutDetector;
