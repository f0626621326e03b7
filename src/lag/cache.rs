use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use lazy_static::lazy_static;

use crate::config;

// Global singleton cache shared by every distributor in the process.
lazy_static! {
    static ref GLOBAL_CACHE: Arc<LagCache> = Arc::new(LagCache::new(Arc::new(MemoryStore::new())));
}

/// One observed replication delay for one replica.
#[derive(Debug, Clone)]
pub struct LagMeasurement {
    /// Identity of the replica the measurement was taken against.
    pub replica: String,
    /// Observed replication delay.
    pub lag: Duration,
    /// When the measurement was taken.
    pub observed_at: Instant,
}

impl LagMeasurement {
    pub fn new(replica: &str, lag: Duration) -> Self {
        Self {
            replica: replica.to_string(),
            lag,
            observed_at: Instant::now(),
        }
    }

    /// Whether the measurement is still usable under `ttl`.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.observed_at.elapsed() <= ttl
    }
}

/// Pluggable backing store for lag measurements.
///
/// The in-memory [`MemoryStore`] is the reference implementation; a shared
/// external store is a valid alternative when several processes should agree
/// on a measurement. Writes are last-writer-wins per replica, so stores need
/// no coordination beyond their own interior locking.
pub trait LagStore: Send + Sync {
    fn get(&self, replica: &str) -> Option<LagMeasurement>;
    fn put(&self, measurement: LagMeasurement);
    fn clear(&self);
    fn len(&self) -> usize;
}

/// In-memory lag store.
///
/// Size is bounded by the number of distinct replica identities, which is
/// small and static, so there is no eviction beyond TTL and [`LagStore::clear`].
pub struct MemoryStore {
    entries: RwLock<HashMap<String, LagMeasurement>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LagStore for MemoryStore {
    fn get(&self, replica: &str) -> Option<LagMeasurement> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(replica)
            .cloned()
    }

    fn put(&self, measurement: LagMeasurement) {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(measurement.replica.clone(), measurement);
    }

    fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// TTL-aware memo of replica lag, keyed by replica identity.
///
/// Avoids re-querying replica lag on every routing decision. Expired entries
/// are filtered on read and overwritten on the next measurement; `clear()`
/// drops everything at once so tests and operators can force a re-check.
pub struct LagCache {
    store: RwLock<Arc<dyn LagStore>>,
    /// Per-instance TTL override; `None` follows the process-wide setting.
    ttl: Option<Duration>,
}

impl LagCache {
    /// The process-wide cache used by [`Distributor::new`](crate::Distributor::new).
    pub fn global() -> &'static Arc<LagCache> {
        &GLOBAL_CACHE
    }

    pub fn new(store: Arc<dyn LagStore>) -> Self {
        Self {
            store: RwLock::new(store),
            ttl: None,
        }
    }

    /// Cache with a fixed TTL, independent of the process-wide setting.
    pub fn with_ttl(store: Arc<dyn LagStore>, ttl: Duration) -> Self {
        Self {
            store: RwLock::new(store),
            ttl: Some(ttl),
        }
    }

    /// Swap the backing store. Existing entries are discarded with the old
    /// store.
    pub fn configure(&self, store: Arc<dyn LagStore>) {
        *self
            .store
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = store;
    }

    /// A still-fresh measurement for `replica`, if one is cached.
    pub fn fetch(&self, replica: &str) -> Option<LagMeasurement> {
        let measurement = self.store().get(replica)?;
        measurement.is_fresh(self.ttl()).then_some(measurement)
    }

    /// Record a fresh measurement for `replica`. Last writer wins.
    pub fn record(&self, replica: &str, lag: Duration) -> LagMeasurement {
        let measurement = LagMeasurement::new(replica, lag);
        self.store().put(measurement.clone());
        measurement
    }

    /// Drop every cached measurement.
    pub fn clear(&self) {
        self.store().clear();
    }

    /// Number of cached measurements, fresh or not.
    pub fn len(&self) -> usize {
        self.store().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn store(&self) -> Arc<dyn LagStore> {
        Arc::clone(
            &self
                .store
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    fn ttl(&self) -> Duration {
        self.ttl.unwrap_or_else(config::lag_cache_ttl)
    }
}
