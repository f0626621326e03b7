//! Execution-scoped read-target context.
//!
//! The routing decision made by the distribution engine has to be visible to
//! every statement issued inside the distributed block, including nested
//! calls, without leaking into unrelated work on the same runtime. The
//! current target lives in a `tokio::task_local!` binding: each logical task
//! sees exactly one value, nested scopes shadow the outer one, and the outer
//! value is restored when the scoped future completes, fails, or is dropped
//! mid-flight. Connection pools read [`current`] per statement to pick a
//! physical connection.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::config;

/// Where reads issued by the current execution should be served from.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadTarget {
    /// Reads are forced to the primary.
    Primary,
    /// Reads may be served from a replica.
    Replica,
}

impl ReadTarget {
    /// Returns `true` if reads may leave the primary.
    pub const fn is_replica(self) -> bool {
        matches!(self, ReadTarget::Replica)
    }

    /// Target for execution outside any distribution scope, per the
    /// process-wide `default_to_primary` flag.
    pub(crate) fn process_default() -> Self {
        if config::default_to_primary() {
            ReadTarget::Primary
        } else {
            ReadTarget::Replica
        }
    }
}

impl fmt::Display for ReadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReadTarget::Primary => "primary",
            ReadTarget::Replica => "replica",
        })
    }
}

tokio::task_local! {
    static READ_TARGET: ReadTarget;
}

/// The read target for the calling task.
///
/// Resolves to the innermost active scope, or to the process default when no
/// scope is active. This is the value a connection pool consults per
/// statement; a datastore transaction layer that must write should ignore a
/// `Replica` answer and pin to the primary itself.
pub fn current() -> ReadTarget {
    READ_TARGET
        .try_with(|target| *target)
        .unwrap_or_else(|_| ReadTarget::process_default())
}

/// Run `work` with `target` as the current read target.
///
/// Scopes nest: entering a scope while another is active makes the inner
/// value current for the extent of `work` only, after which the outer value
/// is current again. Restoration holds on normal return, on error values, on
/// panic, and when the returned future is dropped before completion, so a
/// routing decision can never leak into later work on a reused task.
///
/// # Examples
///
/// ```
/// use replica_reads::scope::{self, ReadTarget};
///
/// # tokio_test::block_on(async {
/// let inside = scope::scoped(ReadTarget::Replica, async { scope::current() }).await;
/// assert_eq!(inside, ReadTarget::Replica);
/// # });
/// ```
pub fn scoped<F>(target: ReadTarget, work: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    READ_TARGET.scope(target, work)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{self, test_guard};
    use std::time::Duration;

    #[test]
    fn display_is_stable() {
        assert_eq!(ReadTarget::Primary.to_string(), "primary");
        assert_eq!(ReadTarget::Replica.to_string(), "replica");
        assert!(ReadTarget::Replica.is_replica());
        assert!(!ReadTarget::Primary.is_replica());
    }

    #[tokio::test]
    async fn no_scope_resolves_through_process_default() {
        let _guard = test_guard();
        assert_eq!(current(), ReadTarget::Primary);

        config::set_default_to_primary(false);
        assert_eq!(current(), ReadTarget::Replica);
        config::set_default_to_primary(true);
    }

    #[tokio::test]
    async fn nested_scopes_unwind_to_the_enclosing_value() {
        let _guard = test_guard();
        assert_eq!(current(), ReadTarget::Primary);

        scoped(ReadTarget::Replica, async {
            assert_eq!(current(), ReadTarget::Replica);

            scoped(ReadTarget::Primary, async {
                assert_eq!(current(), ReadTarget::Primary);
            })
            .await;

            assert_eq!(current(), ReadTarget::Replica);
        })
        .await;

        assert_eq!(current(), ReadTarget::Primary);
    }

    #[tokio::test]
    async fn error_exit_still_restores_outer_scope() {
        let _guard = test_guard();

        let outcome: Result<(), &str> = scoped(ReadTarget::Replica, async {
            scoped(ReadTarget::Primary, async { Err::<(), _>("boom") }).await?;
            Ok(())
        })
        .await;

        assert!(outcome.is_err());
        assert_eq!(current(), ReadTarget::Primary);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_inner_scope_restores_outer_scope() {
        let _guard = test_guard();

        scoped(ReadTarget::Replica, async {
            let stuck = scoped(ReadTarget::Primary, std::future::pending::<()>());
            let cancelled = tokio::time::timeout(Duration::from_millis(5), stuck).await;
            assert!(cancelled.is_err());
            assert_eq!(current(), ReadTarget::Replica);
        })
        .await;
    }

    #[tokio::test]
    async fn scope_does_not_cross_task_boundaries() {
        let _guard = test_guard();

        scoped(ReadTarget::Replica, async {
            let spawned = tokio::spawn(async { current() }).await.unwrap();
            assert_eq!(spawned, ReadTarget::Primary);
            assert_eq!(current(), ReadTarget::Replica);
        })
        .await;
    }
}
