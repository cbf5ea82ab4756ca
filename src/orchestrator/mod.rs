//! Rotation orchestration.
//!
//! For each configured repository the runner resolves the default branch,
//! reads the ownership file and the stored rotation state, derives the next
//! selection, renders the file and commits the change: file first, state
//! second. Failures are isolated per repository and collected in a
//! [`RunReport`].

pub mod report;
pub mod runner;

pub use report::{RepositoryReport, RotationOutcome, RunReport};
pub use runner::{Orchestrator, RotationSettings};

use chrono::{DateTime, Utc};

const SECONDS_PER_DAY: i64 = 86_400;

/// Knobs for a single invocation.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Compute and report, never write.
    pub dry_run: bool,
    /// Advance the selection even if this epoch already rotated.
    pub force: bool,
    pub now: DateTime<Utc>,
}

impl RunOptions {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            dry_run: false,
            force: false,
            now,
        }
    }
}

/// Rotation epoch containing `now`: whole `interval_days` periods since the
/// Unix epoch. A zero interval is treated as one day.
pub fn rotation_epoch(now: DateTime<Utc>, interval_days: u32) -> i64 {
    let period = SECONDS_PER_DAY * i64::from(interval_days.max(1));
    now.timestamp().div_euclid(period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_epoch_is_stable_within_a_day() {
        let morning = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 1).unwrap();
        let night = Utc.with_ymd_and_hms(2026, 3, 2, 23, 59, 59).unwrap();
        let next = Utc.with_ymd_and_hms(2026, 3, 3, 0, 0, 0).unwrap();
        assert_eq!(rotation_epoch(morning, 1), rotation_epoch(night, 1));
        assert_eq!(rotation_epoch(next, 1), rotation_epoch(night, 1) + 1);
    }

    #[test]
    fn test_epoch_spans_interval() {
        let start = Utc.timestamp_opt(0, 0).unwrap();
        let six_days = Utc.timestamp_opt(6 * SECONDS_PER_DAY, 0).unwrap();
        let seven_days = Utc.timestamp_opt(7 * SECONDS_PER_DAY, 0).unwrap();
        assert_eq!(rotation_epoch(start, 7), 0);
        assert_eq!(rotation_epoch(six_days, 7), 0);
        assert_eq!(rotation_epoch(seven_days, 7), 1);
    }

    #[test]
    fn test_epoch_zero_interval_means_daily() {
        let t = Utc.timestamp_opt(3 * SECONDS_PER_DAY, 0).unwrap();
        assert_eq!(rotation_epoch(t, 0), 3);
    }
}
