// tripdata-core - partition cache and retrieval pipeline
//
// Monthly trip-data partitions are fetched on demand from a remote archive,
// persisted to a local cache directory, decoded into a sorted in-memory form
// exactly once, and served through a timestamp-paginated query engine.
//
// Layout mirrors the flow of a query:
// - partition: (year, month) key resolution from millisecond timestamps
// - source:    remote archive client (one GET per partition, bounded timeout)
// - store:     local durable parquet files, one per partition
// - loader:    parquet bytes -> sorted, month-filtered TripRow table
// - cache:     bounded FIFO cache with single-flight loads
// - engine:    ties the pipeline together and serves one page of results

pub mod cache;
pub mod engine;
pub mod error;
pub mod loader;
pub mod partition;
pub mod source;
pub mod store;
pub mod types;

pub use cache::PartitionCache;
pub use engine::TripEngine;
pub use error::CoreError;
pub use partition::{PartitionKey, MAX_TIMESTAMP_MS, MIN_TIMESTAMP_MS};
pub use source::SourceClient;
pub use store::PartitionStore;
pub use types::{LoadedPartition, TripResult, TripRow};
