// SPDX-License-Identifier: MIT OR Apache-2.0
//! Observer hooks and progress scaling.
//!
//! A [`RunObserver`] receives log lines, scaled progress, and finished
//! results without the orchestrator knowing anything about the caller (GUI,
//! CLI, test harness). All methods default to no-ops.

use drx_core::{DutyResult, Mawb};

/// Callbacks fired during a batch run.
pub trait RunObserver: Send + Sync {
    /// A free-form log line attributed to one MAWB.
    fn on_log(&self, mawb: &Mawb, message: &str) {
        let _ = (mawb, message);
    }

    /// Overall batch progress, `percent` in `0..=100`.
    fn on_progress(&self, message: &str, percent: u8) {
        let _ = (message, percent);
    }

    /// One item finished (success or failure).
    fn on_result(&self, result: &DutyResult) {
        let _ = result;
    }

    /// Name used in diagnostics.
    fn name(&self) -> &str;
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl RunObserver for NullObserver {
    fn name(&self) -> &str {
        "null"
    }
}

/// Maps a per-stage fraction to overall batch percent.
///
/// Overall percent is `floor((index + stage_fraction) / total · 100)`.
#[derive(Debug, Clone, Copy)]
pub struct ProgressScale {
    /// 0-based index of the item in flight.
    pub index: usize,
    /// Total items in the batch.
    pub total: usize,
}

impl ProgressScale {
    /// Scale a stage fraction (`0.0..=1.0`) into overall percent.
    #[must_use]
    pub fn percent(&self, stage_fraction: f64) -> u8 {
        let total = self.total.max(1) as f64;
        let fraction = stage_fraction.clamp(0.0, 1.0);
        (((self.index as f64 + fraction) / total) * 100.0).floor() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_floored() {
        let scale = ProgressScale { index: 0, total: 3 };
        assert_eq!(scale.percent(0.0), 0);
        assert_eq!(scale.percent(0.5), 16);
        assert_eq!(scale.percent(1.0), 33);
    }

    #[test]
    fn last_item_completes_at_hundred() {
        let scale = ProgressScale { index: 2, total: 3 };
        assert_eq!(scale.percent(1.0), 100);
    }

    #[test]
    fn fraction_is_clamped() {
        let scale = ProgressScale { index: 0, total: 1 };
        assert_eq!(scale.percent(2.0), 100);
        assert_eq!(scale.percent(-1.0), 0);
    }

    #[test]
    fn zero_total_does_not_divide_by_zero() {
        let scale = ProgressScale { index: 0, total: 0 };
        assert_eq!(scale.percent(0.5), 50);
    }

    #[test]
    fn null_observer_has_a_name() {
        assert_eq!(NullObserver.name(), "null");
    }
}
