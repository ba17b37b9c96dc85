//! Row and partition shapes shared across the pipeline.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::partition::PartitionKey;

/// One trip, normalized at load time. Timestamps are millisecond epoch;
/// `fare_amount` may be negative (source data adjustments are kept as-is).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripRow {
    pub pickup_ms: i64,
    pub dropoff_ms: i64,
    pub trip_distance: f64,
    pub fare_amount: f64,
}

/// The parsed, month-filtered, sorted in-memory form of one partition.
/// Read-only after construction; the cache hands out shared references.
#[derive(Debug)]
pub struct LoadedPartition {
    pub key: PartitionKey,
    /// Sorted ascending by `pickup_ms`.
    pub rows: Vec<TripRow>,
}

impl LoadedPartition {
    /// Rows with pickup timestamp strictly greater than `from_ms`.
    ///
    /// `rows` is sorted, so this is a binary search for the page start rather
    /// than a scan of the whole month.
    pub fn rows_after(&self, from_ms: i64) -> &[TripRow] {
        let start = self.rows.partition_point(|row| row.pickup_ms <= from_ms);
        &self.rows[start..]
    }
}

/// API-facing shape of one trip. Field names follow the source dataset; the
/// derived `tpep_pickup_datetime_ms` doubles as the pagination cursor.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TripResult {
    pub tpep_pickup_datetime: String,
    pub tpep_dropoff_datetime: String,
    pub trip_distance: f64,
    pub fare_amount: f64,
    pub tpep_pickup_datetime_ms: i64,
}

impl From<&TripRow> for TripResult {
    fn from(row: &TripRow) -> Self {
        Self {
            tpep_pickup_datetime: rfc3339_utc(row.pickup_ms),
            tpep_dropoff_datetime: rfc3339_utc(row.dropoff_ms),
            trip_distance: row.trip_distance,
            fare_amount: row.fare_amount,
            tpep_pickup_datetime_ms: row.pickup_ms,
        }
    }
}

fn rfc3339_utc(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|utc| utc.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| millis.to_string())
}
