//! Collaborator seam towards the physical connection pool.
//!
//! The policy layer never opens connections itself. It asks the pool two
//! questions per decision and publishes its answer through
//! [`current_read_target`](crate::current_read_target), which the pool reads
//! back per statement.

use std::time::Duration;

use async_trait::async_trait;

use crate::core::Result;

/// What the distribution engine needs from a primary/replica connection pool.
#[async_trait]
pub trait ReplicaPool: Send + Sync {
    /// Stable identity of the replica lag is measured against, used as the
    /// lag-cache key. For a pool that rotates between replicas this should
    /// identify the replica set, not an individual host.
    fn replica_identity(&self) -> &str;

    /// Whether any replica is currently usable. Queried fresh on every
    /// decision; the policy layer never caches availability.
    fn is_replica_available(&self) -> bool;

    /// Measure the current replication delay. One round trip to the replica.
    async fn query_lag(&self) -> Result<Duration>;
}
