//! Error taxonomy for the partition pipeline.
//!
//! Variants carry string payloads instead of error sources so the enum stays
//! `Clone`: the cache broadcasts one load result to every waiter of a
//! single-flight load, failures included.

use thiserror::Error;

use crate::partition::PartitionKey;

#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// Caller error, rejected before any I/O.
    #[error("timestamp {millis} ms is outside the supported range ({min} ..= {max})")]
    InvalidTimestamp { millis: i64, min: i64, max: i64 },

    /// Remote archive unreachable, timed out, or returned non-success.
    #[error("fetch failed for partition {key}: {reason}")]
    FetchFailed { key: PartitionKey, reason: String },

    /// No local file for this partition. Callers fall back to a remote fetch.
    #[error("no cached file for partition {key}")]
    PartitionNotCached { key: PartitionKey },

    /// Local file exists but could not be read back.
    #[error("read failed for partition {key}: {reason}")]
    ReadFailed { key: PartitionKey, reason: String },

    /// Local persistence failed.
    #[error("write failed for partition {key}: {reason}")]
    WriteFailed { key: PartitionKey, reason: String },

    /// The partition file is missing required columns or a required column
    /// has an incompatible type. Fatal for the whole partition, not retried.
    #[error("schema mismatch in partition {key}: {detail}")]
    SchemaMismatch { key: PartitionKey, detail: String },

    /// The partition file could not be decoded at all.
    #[error("failed to load partition {key}: {reason}")]
    LoadFailed { key: PartitionKey, reason: String },

    /// The pipeline could not produce a loaded partition for a valid key.
    /// This is the engine-boundary error; the layers above render it as an
    /// empty result rather than a crash.
    #[error("data unavailable for partition {key}: {reason}")]
    DataUnavailable { key: PartitionKey, reason: String },
}
