//! Query engine: resolves a timestamp to a partition, guarantees it is
//! cached, and serves one filtered, sorted, paginated page of results.
//!
//! A page never spans into the next month: when fewer than `n_results` rows
//! remain after `from_ms`, the page is short rather than spilling into the
//! following partition. Callers paginate with the returned cursor.

use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::PartitionCache;
use crate::error::CoreError;
use crate::loader;
use crate::partition::PartitionKey;
use crate::source::SourceClient;
use crate::store::PartitionStore;
use crate::types::{LoadedPartition, TripResult};

pub struct TripEngine {
    cache: Arc<PartitionCache>,
    store: Arc<PartitionStore>,
    source: Arc<SourceClient>,
}

impl TripEngine {
    pub fn new(
        cache: Arc<PartitionCache>,
        store: Arc<PartitionStore>,
        source: Arc<SourceClient>,
    ) -> Self {
        Self {
            cache,
            store,
            source,
        }
    }

    /// Trips with pickup timestamp strictly after `from_ms`, ascending, at
    /// most `n_results`. An empty page for a valid period is success;
    /// `DataUnavailable` means the pipeline could not produce the partition.
    pub async fn get_trips(
        &self,
        from_ms: i64,
        n_results: usize,
    ) -> Result<Vec<TripResult>, CoreError> {
        let key = PartitionKey::from_millis(from_ms)?;
        info!(%key, from_ms, n_results, "resolving trips query");

        let partition = self
            .cache
            .get_or_load(key, || self.load_pipeline(key))
            .await
            .map_err(|err| {
                warn!(%key, error = %err, "partition pipeline failed");
                CoreError::DataUnavailable {
                    key,
                    reason: err.to_string(),
                }
            })?;

        let page: Vec<TripResult> = partition
            .rows_after(from_ms)
            .iter()
            .take(n_results)
            .map(TripResult::from)
            .collect();

        info!(%key, returned = page.len(), "trips query served");
        Ok(page)
    }

    /// Cache-miss pipeline: local read, falling back to remote fetch plus
    /// persist, then parquet decode. Decoding is blocking work and runs on
    /// the blocking pool, never on the async workers or under a cache lock.
    async fn load_pipeline(&self, key: PartitionKey) -> Result<LoadedPartition, CoreError> {
        let bytes = match self.store.read(key).await {
            Ok(bytes) => bytes,
            Err(CoreError::PartitionNotCached { .. }) => {
                let bytes = self.source.fetch(key).await?;
                self.store.write(key, &bytes).await?;
                bytes
            }
            Err(other) => return Err(other),
        };

        tokio::task::spawn_blocking(move || loader::load(key, bytes))
            .await
            .map_err(|err| CoreError::LoadFailed {
                key,
                reason: format!("partition decode task failed: {err}"),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, TimestampMicrosecondArray};
    use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::arrow_writer::ArrowWriter;
    use std::time::Duration;

    // 2023-01-01T00:00:00Z
    const JAN_2023_MS: i64 = 1_672_531_200_000;

    fn engine_for(dir: &std::path::Path) -> TripEngine {
        // Loopback port 9 refuses connections, so any fetch fails fast.
        let source = SourceClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        TripEngine::new(
            Arc::new(PartitionCache::new(4)),
            Arc::new(PartitionStore::new(dir).unwrap()),
            Arc::new(source),
        )
    }

    fn partition_file(pickups_ms: &[i64]) -> Vec<u8> {
        let schema = Arc::new(Schema::new(vec![
            Field::new(
                "tpep_pickup_datetime",
                DataType::Timestamp(TimeUnit::Microsecond, None),
                true,
            ),
            Field::new(
                "tpep_dropoff_datetime",
                DataType::Timestamp(TimeUnit::Microsecond, None),
                true,
            ),
            Field::new("trip_distance", DataType::Float64, true),
            Field::new("fare_amount", DataType::Float64, true),
        ]));
        let pickups_us: Vec<i64> = pickups_ms.iter().map(|ms| ms * 1000).collect();
        let dropoffs_us: Vec<i64> = pickups_ms.iter().map(|ms| (ms + 60_000) * 1000).collect();
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(TimestampMicrosecondArray::from(pickups_us)),
                Arc::new(TimestampMicrosecondArray::from(dropoffs_us)),
                Arc::new(Float64Array::from(vec![1.5; pickups_ms.len()])),
                Arc::new(Float64Array::from(vec![12.0; pickups_ms.len()])),
            ],
        )
        .unwrap();

        let mut buf = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buf, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
        buf
    }

    async fn seed_january(dir: &std::path::Path, pickups_ms: &[i64]) {
        let store = PartitionStore::new(dir).unwrap();
        store
            .write(PartitionKey::new(2023, 1), &partition_file(pickups_ms))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn serves_a_sorted_strictly_after_page() {
        let dir = tempfile::tempdir().unwrap();
        seed_january(
            dir.path(),
            &[JAN_2023_MS + 300, JAN_2023_MS + 100, JAN_2023_MS + 200],
        )
        .await;
        let engine = engine_for(dir.path());

        let page = engine.get_trips(JAN_2023_MS + 100, 10).await.unwrap();
        let pickups: Vec<i64> = page.iter().map(|t| t.tpep_pickup_datetime_ms).collect();
        // Strictly greater than from_ms, ascending.
        assert_eq!(pickups, vec![JAN_2023_MS + 200, JAN_2023_MS + 300]);
    }

    #[tokio::test]
    async fn page_length_is_bounded_and_cursor_chains() {
        let dir = tempfile::tempdir().unwrap();
        let pickups: Vec<i64> = (1..=5).map(|i| JAN_2023_MS + i * 1_000).collect();
        seed_january(dir.path(), &pickups).await;
        let engine = engine_for(dir.path());

        let first = engine.get_trips(JAN_2023_MS, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        let cursor = first.last().unwrap().tpep_pickup_datetime_ms;
        assert_eq!(cursor, JAN_2023_MS + 2_000);

        let second = engine.get_trips(cursor, 2).await.unwrap();
        let pickups: Vec<i64> = second.iter().map(|t| t.tpep_pickup_datetime_ms).collect();
        assert_eq!(pickups, vec![JAN_2023_MS + 3_000, JAN_2023_MS + 4_000]);
    }

    #[tokio::test]
    async fn identical_queries_return_identical_results() {
        let dir = tempfile::tempdir().unwrap();
        seed_january(dir.path(), &[JAN_2023_MS + 100, JAN_2023_MS + 200]).await;
        let engine = engine_for(dir.path());

        let first = engine.get_trips(JAN_2023_MS, 10).await.unwrap();
        let second = engine.get_trips(JAN_2023_MS, 10).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn past_end_of_month_data_is_an_empty_success() {
        let dir = tempfile::tempdir().unwrap();
        seed_january(dir.path(), &[JAN_2023_MS + 100]).await;
        let engine = engine_for(dir.path());

        let page = engine.get_trips(JAN_2023_MS + 100, 10).await.unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn failed_fetch_surfaces_as_data_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_for(dir.path());

        // Nothing seeded locally, remote unreachable.
        let err = engine.get_trips(JAN_2023_MS, 10).await.unwrap_err();
        assert!(matches!(err, CoreError::DataUnavailable { .. }));
    }

    #[tokio::test]
    async fn invalid_timestamp_is_rejected_before_any_io() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine_for(dir.path());

        let err = engine.get_trips(1, 10).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidTimestamp { .. }));
        // No partition file was fetched or written.
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(entries.is_empty());
    }
}
