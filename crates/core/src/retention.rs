//! Retention window arithmetic for archived instances.

use chrono::Duration;
use serde::Serialize;

use crate::error::CoreError;
use crate::types::Timestamp;

/// Default number of days an archived instance's data is kept on disk.
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Deletion reason recorded when the caller does not supply one.
pub const DEFAULT_DELETION_REASON: &str = "manual";

/// Compute the data-retention deadline for an instance deleted at
/// `deleted_at`.
///
/// The deadline is never earlier than the deletion time; negative windows
/// are rejected.
pub fn retention_deadline(deleted_at: Timestamp, retention_days: i64) -> Result<Timestamp, CoreError> {
    if retention_days < 0 {
        return Err(CoreError::Validation(format!(
            "Retention days must not be negative, got {retention_days}"
        )));
    }
    let window = Duration::try_days(retention_days).ok_or_else(|| {
        CoreError::Validation(format!("Retention window of {retention_days} days is too large"))
    })?;
    deleted_at
        .checked_add_signed(window)
        .ok_or_else(|| CoreError::Validation("Retention deadline overflows".into()))
}

/// Convert a byte count into whole megabytes, rounding down.
pub fn bytes_to_mb(bytes: u64) -> i64 {
    i64::try_from(bytes / (1024 * 1024)).unwrap_or(i64::MAX)
}

/// Outcome of one retention sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    /// Expired records found with data still on disk.
    pub examined: usize,
    /// Records whose data was removed and flag flipped.
    pub purged: usize,
    /// Records whose data directory could not be removed this run.
    pub failed: usize,
    /// Sum of the recorded sizes of purged records, in MB.
    pub reclaimed_mb: i64,
}

/// Human-readable size for a megabyte count.
pub fn format_megabytes(mb: i64) -> String {
    const GB: f64 = 1024.0;
    const TB: f64 = GB * 1024.0;

    let m = mb as f64;
    if m >= TB {
        format!("{:.2} TB", m / TB)
    } else if m >= GB {
        format!("{:.2} GB", m / GB)
    } else {
        format!("{mb} MB")
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn default_deadline_is_thirty_days_out() {
        let deleted = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let deadline = retention_deadline(deleted, DEFAULT_RETENTION_DAYS).unwrap();
        assert_eq!(deadline, Utc.with_ymd_and_hms(2026, 1, 31, 12, 0, 0).unwrap());
    }

    #[test]
    fn zero_day_window_equals_deletion_time() {
        let deleted = Utc::now();
        assert_eq!(retention_deadline(deleted, 0).unwrap(), deleted);
    }

    #[test]
    fn negative_window_rejected() {
        assert_matches!(
            retention_deadline(Utc::now(), -1),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn megabytes() {
        assert_eq!(bytes_to_mb(0), 0);
        assert_eq!(bytes_to_mb(1_048_575), 0);
        assert_eq!(bytes_to_mb(5 * 1_048_576), 5);
        assert_eq!(format_megabytes(512), "512 MB");
        assert_eq!(format_megabytes(2048), "2.00 GB");
        assert_eq!(format_megabytes(1_048_576), "1.00 TB");
    }
}
