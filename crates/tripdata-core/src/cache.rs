//! Bounded in-memory partition cache with FIFO eviction and single-flight
//! loads.
//!
//! Locking discipline: the entry map and the insertion-order record are only
//! touched under short mutex holds; the fetch-and-load pipeline always runs
//! outside them. Concurrent callers for the same missing key share one
//! pipeline execution: the leader publishes its result on a watch channel and
//! every waiter receives the same success or the same failure. A failed load
//! leaves the key absent so a later call may retry.
//!
//! Eviction is FIFO by insertion order, not LRU: monthly partitions have low
//! reuse locality across arbitrary query patterns, and insertion order needs
//! no bookkeeping on reads. The order is an explicit `VecDeque`, not an
//! incidental property of map iteration.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::error::CoreError;
use crate::partition::PartitionKey;
use crate::types::LoadedPartition;

type LoadResult = Result<Arc<LoadedPartition>, CoreError>;

struct CacheState {
    entries: HashMap<PartitionKey, Arc<LoadedPartition>>,
    /// Keys in insertion order; front is evicted first.
    order: VecDeque<PartitionKey>,
}

pub struct PartitionCache {
    capacity: usize,
    state: Mutex<CacheState>,
    /// One watch receiver per key currently being loaded.
    inflight: Mutex<HashMap<PartitionKey, watch::Receiver<Option<LoadResult>>>>,
}

enum Flight {
    Leader(watch::Sender<Option<LoadResult>>),
    Waiter(watch::Receiver<Option<LoadResult>>),
}

impl PartitionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: PartitionKey) -> bool {
        self.state.lock().entries.contains_key(&key)
    }

    fn get(&self, key: PartitionKey) -> Option<Arc<LoadedPartition>> {
        self.state.lock().entries.get(&key).cloned()
    }

    /// Return the cached partition, running `load` at most once per key under
    /// concurrency. The pipeline future executes outside the cache locks.
    pub async fn get_or_load<F, Fut>(&self, key: PartitionKey, load: F) -> LoadResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<LoadedPartition, CoreError>>,
    {
        let mut load = Some(load);
        loop {
            if let Some(hit) = self.get(key) {
                return Ok(hit);
            }

            let flight = {
                let mut inflight = self.inflight.lock();
                // A load may have completed between the two lock holds.
                if let Some(hit) = self.get(key) {
                    return Ok(hit);
                }
                match inflight.get(&key) {
                    Some(rx) => Flight::Waiter(rx.clone()),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        inflight.insert(key, rx);
                        Flight::Leader(tx)
                    }
                }
            };

            match flight {
                Flight::Leader(tx) => {
                    // The guard clears the in-flight marker even if this
                    // future is dropped mid-load; waiters then see a closed
                    // channel and retry instead of hanging.
                    let guard = InflightGuard { cache: self, key };
                    let pipeline = match load.take() {
                        Some(load) => load(),
                        None => {
                            // A previous leader for this call failed and the
                            // one-shot pipeline is spent; surface that the
                            // retry loop cannot continue.
                            return Err(CoreError::DataUnavailable {
                                key,
                                reason: "load pipeline already consumed".to_string(),
                            });
                        }
                    };
                    let result = match pipeline.await {
                        Ok(partition) => {
                            let shared = Arc::new(partition);
                            self.insert(key, shared.clone());
                            Ok(shared)
                        }
                        Err(err) => Err(err),
                    };
                    drop(guard);
                    // Waiters that grabbed a receiver before the marker was
                    // cleared still get the broadcast.
                    let _ = tx.send(Some(result.clone()));
                    return result;
                }
                Flight::Waiter(mut rx) => loop {
                    let published = rx.borrow_and_update().clone();
                    if let Some(result) = published {
                        return result;
                    }
                    if rx.changed().await.is_err() {
                        debug!(%key, "partition load leader dropped; retrying");
                        break;
                    }
                },
            }
        }
    }

    /// Insert under the capacity bound, evicting the oldest-inserted key
    /// first. Never touches entries for other keys beyond the single evictee.
    fn insert(&self, key: PartitionKey, partition: Arc<LoadedPartition>) {
        let mut state = self.state.lock();
        if state.entries.contains_key(&key) {
            state.entries.insert(key, partition);
            return;
        }
        while state.entries.len() >= self.capacity {
            match state.order.pop_front() {
                Some(oldest) => {
                    state.entries.remove(&oldest);
                    debug!(evicted = %oldest, inserted = %key, "evicted oldest cached partition");
                }
                None => break,
            }
        }
        state.order.push_back(key);
        state.entries.insert(key, partition);
    }
}

struct InflightGuard<'a> {
    cache: &'a PartitionCache,
    key: PartitionKey,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.cache.inflight.lock().remove(&self.key);
    }
}
