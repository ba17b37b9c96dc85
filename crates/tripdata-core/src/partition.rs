//! Partition keys: one (year, month) pair per monthly source file.

use std::fmt;

use chrono::{DateTime, Datelike, Utc};

use crate::error::CoreError;

/// 2000-01-01T00:00:00Z. Timestamps before this are rejected before any I/O.
pub const MIN_TIMESTAMP_MS: i64 = 946_684_800_000;
/// 2100-01-01T00:00:00Z, inclusive upper bound.
pub const MAX_TIMESTAMP_MS: i64 = 4_102_444_800_000;

/// Identifies exactly one source file and one cache slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    pub year: i32,
    pub month: u32,
}

impl PartitionKey {
    pub fn new(year: i32, month: u32) -> Self {
        debug_assert!((1..=12).contains(&month));
        Self { year, month }
    }

    /// Resolve the owning (year, month) in UTC for a millisecond timestamp.
    pub fn from_millis(millis: i64) -> Result<Self, CoreError> {
        if !(MIN_TIMESTAMP_MS..=MAX_TIMESTAMP_MS).contains(&millis) {
            return Err(CoreError::InvalidTimestamp {
                millis,
                min: MIN_TIMESTAMP_MS,
                max: MAX_TIMESTAMP_MS,
            });
        }
        let utc = DateTime::<Utc>::from_timestamp_millis(millis).ok_or(
            CoreError::InvalidTimestamp {
                millis,
                min: MIN_TIMESTAMP_MS,
                max: MAX_TIMESTAMP_MS,
            },
        )?;
        Ok(Self {
            year: utc.year(),
            month: utc.month(),
        })
    }

    /// File name of the raw partition, both remotely and in the local store.
    pub fn file_name(&self) -> String {
        format!("yellow_tripdata_{}-{:02}.parquet", self.year, self.month)
    }

    /// True when a millisecond pickup timestamp falls inside this partition's
    /// own month. Used by the loader to drop misfiled boundary rows.
    pub fn contains_millis(&self, millis: i64) -> bool {
        DateTime::<Utc>::from_timestamp_millis(millis)
            .map(|utc| utc.year() == self.year && utc.month() == self.month)
            .unwrap_or(false)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}
