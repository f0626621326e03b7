// ============================================================================
// replica-reads
// ============================================================================
//
// Policy layer that lets application code mark a unit of work as
// read-distributable: its reads are served from a replica connection instead
// of the primary, subject to a replication-lag budget and a
// replica-availability failover policy. Sits above a connection pool that
// routes individual statements; the pool reads `current_read_target()` per
// statement to honor the decision made here.

pub mod config;
pub mod core;
pub mod engine;
pub mod job;
pub mod lag;
pub mod pool;
pub mod scope;

pub use core::{DistributeError, Result};
pub use engine::{DistributeOptions, Distributor, ReadOutcome};
pub use lag::{LagCache, LagMeasurement, LagStore, MemoryStore};
pub use pool::ReplicaPool;
pub use scope::ReadTarget;

pub use config::{default_to_primary, lag_cache_ttl, set_default_to_primary, set_lag_cache_ttl};

/// The read target for the calling task, as published by the innermost
/// active distribution scope. This is what a connection pool consults per
/// statement.
pub fn current_read_target() -> ReadTarget {
    scope::current()
}
