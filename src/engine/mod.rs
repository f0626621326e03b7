//! Distribution engine: the orchestrator behind `distribute`.
//!
//! Given a unit of work and per-call options, decides primary vs replica,
//! applies the lag and availability failover policy, and runs the work inside
//! the resolved read scope.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::{DistributeError, Result};
use crate::lag::{LagCache, checker};
use crate::pool::ReplicaPool;
use crate::scope::{self, ReadTarget};

/// Per-invocation routing options.
///
/// Immutable once built; construct one per `distribute` call.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use replica_reads::DistributeOptions;
///
/// let options = DistributeOptions::new()
///     .max_lag(Duration::from_secs(1))
///     .lag_failover(true);
/// assert!(options.failover);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributeOptions {
    /// Replication-lag budget. `None` means no bound is enforced and no lag
    /// query is issued.
    pub max_lag: Option<Duration>,
    /// Fall back to the primary when no replica is usable, instead of
    /// failing with [`DistributeError::NoReplicasAvailable`].
    pub failover: bool,
    /// Fall back to the primary when lag exceeds the budget, instead of
    /// failing with [`DistributeError::TooMuchLag`].
    pub lag_failover: bool,
}

impl DistributeOptions {
    pub fn new() -> Self {
        Self {
            max_lag: None,
            failover: true,
            lag_failover: false,
        }
    }

    /// Set the replication-lag budget.
    pub fn max_lag(mut self, max_lag: Duration) -> Self {
        self.max_lag = Some(max_lag);
        self
    }

    /// Enable or disable primary failover on replica unavailability.
    pub fn failover(mut self, failover: bool) -> Self {
        self.failover = failover;
        self
    }

    /// Enable or disable primary failover on a blown lag budget.
    pub fn lag_failover(mut self, lag_failover: bool) -> Self {
        self.lag_failover = lag_failover;
        self
    }
}

impl Default for DistributeOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// What a distributed unit of work hands back.
///
/// `Deferred` tags a producer that will be evaluated after the scope has
/// ended (a lazy relation, a stream, an unexecuted query object). Evaluation
/// outside the scope will not honor the routing chosen here, so the engine
/// emits an advisory diagnostic for `Deferred` values; the value itself is
/// returned unchanged either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome<T> {
    /// Result already materialized inside the scope.
    Value(T),
    /// Producer that evaluates on demand, after the scope has ended.
    Deferred(T),
}

impl<T> ReadOutcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            ReadOutcome::Value(value) | ReadOutcome::Deferred(value) => value,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, ReadOutcome::Deferred(_))
    }
}

/// Decides, per unit of work, whether reads may be served from a replica.
///
/// Holds the pool collaborator and a lag cache; the routing decision itself
/// lives in the task-local scope for the duration of the work, where the
/// pool reads it back per statement.
pub struct Distributor {
    pool: Arc<dyn ReplicaPool>,
    cache: Arc<LagCache>,
}

impl Distributor {
    /// Distributor backed by the process-wide lag cache.
    pub fn new(pool: Arc<dyn ReplicaPool>) -> Self {
        Self::with_cache(pool, Arc::clone(LagCache::global()))
    }

    /// Distributor with its own lag cache.
    ///
    /// Useful for tests and for applications routing against several
    /// independent replica sets.
    pub fn with_cache(pool: Arc<dyn ReplicaPool>, cache: Arc<LagCache>) -> Self {
        Self { pool, cache }
    }

    /// Run `work` with reads distributed to a replica, policy permitting.
    ///
    /// See [`try_distribute`](Self::try_distribute) for the full contract;
    /// this is the same call with the work always present.
    pub async fn distribute<T, F, Fut>(&self, options: DistributeOptions, work: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ReadOutcome<T>>,
    {
        self.try_distribute(options, Some(work)).await
    }

    /// Run an eagerly-evaluated `work` with reads distributed to a replica.
    pub async fn read<T, F, Fut>(&self, options: DistributeOptions, work: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.distribute(options, move || async move {
            ReadOutcome::Value(work().await)
        })
        .await
    }

    /// Run an optionally-supplied `work` with reads distributed to a replica.
    ///
    /// Decision order:
    /// 1. No work supplied fails with [`DistributeError::MissingWork`].
    /// 2. No replica usable: with `options.failover` (the default) the work
    ///    silently runs on the primary; otherwise the call fails with
    ///    [`DistributeError::NoReplicasAvailable`] and the work never runs.
    /// 3. With `options.max_lag` set, the replica's lag is checked (one
    ///    cached query per TTL window). Over budget: with
    ///    `options.lag_failover` the work runs on the primary; otherwise the
    ///    call fails with [`DistributeError::TooMuchLag`] and the work never
    ///    runs. A cached over-budget measurement is kept until it expires,
    ///    so a failover storm does not turn into a lag-probe storm.
    /// 4. The work runs inside a scope for the resolved target. The scope is
    ///    released on every exit path; whatever the work produces, including
    ///    an inner error, passes through unchanged.
    ///
    /// A [`ReadOutcome::Deferred`] result additionally emits one advisory
    /// diagnostic, since evaluation after the scope ends will not honor the
    /// routing chosen here.
    pub async fn try_distribute<T, F, Fut>(
        &self,
        options: DistributeOptions,
        work: Option<F>,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ReadOutcome<T>>,
    {
        let Some(work) = work else {
            return Err(DistributeError::MissingWork);
        };

        let target = self.resolve_target(&options).await?;
        let outcome = scope::scoped(target, work()).await;

        if outcome.is_deferred() {
            warn!(
                target: "replica_reads",
                "deferred result will be evaluated outside the read scope and will not honor {} routing",
                target,
            );
        }

        Ok(outcome.into_inner())
    }

    async fn resolve_target(&self, options: &DistributeOptions) -> Result<ReadTarget> {
        if !self.pool.is_replica_available() {
            if !options.failover {
                return Err(DistributeError::NoReplicasAvailable);
            }
            debug!(target: "replica_reads", "no replicas available, serving reads from primary");
            return Ok(ReadTarget::Primary);
        }

        if let Some(max_lag) = options.max_lag {
            match checker::check(self.pool.as_ref(), &self.cache, max_lag).await {
                Ok(()) => {}
                Err(DistributeError::TooMuchLag { lag, max_lag }) if options.lag_failover => {
                    warn!(
                        target: "replica_reads",
                        lag_ms = lag.as_millis() as u64,
                        budget_ms = max_lag.as_millis() as u64,
                        "replica lag over budget, serving reads from primary",
                    );
                    return Ok(ReadTarget::Primary);
                }
                Err(err) => return Err(err),
            }
        }

        Ok(ReadTarget::Replica)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lag::MemoryStore;
    use async_trait::async_trait;
    use std::future::Ready;

    struct HealthyPool;

    #[async_trait]
    impl ReplicaPool for HealthyPool {
        fn replica_identity(&self) -> &str {
            "engine-unit"
        }

        fn is_replica_available(&self) -> bool {
            true
        }

        async fn query_lag(&self) -> Result<Duration> {
            Ok(Duration::ZERO)
        }
    }

    fn distributor() -> Distributor {
        Distributor::with_cache(
            Arc::new(HealthyPool),
            Arc::new(LagCache::with_ttl(
                Arc::new(MemoryStore::new()),
                Duration::from_secs(60),
            )),
        )
    }

    #[test]
    fn options_defaults_match_the_contract() {
        let options = DistributeOptions::default();
        assert_eq!(options.max_lag, None);
        assert!(options.failover);
        assert!(!options.lag_failover);
    }

    #[test]
    fn options_builder_sets_every_field() {
        let options = DistributeOptions::new()
            .max_lag(Duration::from_secs(2))
            .failover(false)
            .lag_failover(true);
        assert_eq!(options.max_lag, Some(Duration::from_secs(2)));
        assert!(!options.failover);
        assert!(options.lag_failover);
    }

    #[tokio::test]
    async fn missing_work_fails_before_any_decision() {
        let distributor = distributor();

        let err = distributor
            .try_distribute(
                DistributeOptions::new(),
                None::<fn() -> Ready<ReadOutcome<()>>>,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DistributeError::MissingWork));
    }

    #[tokio::test]
    async fn deferred_outcome_is_returned_unchanged() {
        let distributor = distributor();

        let rows = distributor
            .distribute(DistributeOptions::new(), || async {
                ReadOutcome::Deferred(vec![1, 2, 3])
            })
            .await
            .unwrap();

        assert_eq!(rows, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn work_errors_pass_through_unchanged() {
        let distributor = distributor();

        let inner = distributor
            .read(DistributeOptions::new(), || async {
                Err::<i64, &str>("query exploded")
            })
            .await
            .unwrap();

        assert_eq!(inner, Err("query exploded"));
    }

    #[test]
    fn read_outcome_accessors() {
        assert!(ReadOutcome::Deferred(1).is_deferred());
        assert!(!ReadOutcome::Value(1).is_deferred());
        assert_eq!(ReadOutcome::Deferred(7).into_inner(), 7);
        assert_eq!(ReadOutcome::Value(7).into_inner(), 7);
    }
}
