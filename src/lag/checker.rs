use std::time::Duration;

use crate::core::{DistributeError, Result};
use crate::lag::cache::LagCache;
use crate::pool::ReplicaPool;

/// Check the current replica's replication delay against `max_lag`.
///
/// Uses a cached measurement when one is still fresh; otherwise issues a
/// single lag query through the pool and caches the result. Fails with
/// [`DistributeError::TooMuchLag`] iff the measured lag exceeds the budget.
/// Units are whatever the caller supplied; nothing is rounded.
pub(crate) async fn check(
    pool: &dyn ReplicaPool,
    cache: &LagCache,
    max_lag: Duration,
) -> Result<()> {
    let replica = pool.replica_identity();

    let lag = match cache.fetch(replica) {
        Some(measurement) => measurement.lag,
        None => {
            let lag = pool.query_lag().await?;
            cache.record(replica, lag).lag
        }
    };

    if lag > max_lag {
        Err(DistributeError::TooMuchLag { lag, max_lag })
    } else {
        Ok(())
    }
}
