//! Job-boundary adapter.
//!
//! A routing scope is a call-stack concept; it does not survive
//! serialization through a job queue, and must not be assumed to. The
//! job-execution runtime wraps each dequeued unit in [`perform`] so the unit
//! starts from the process default regardless of what scope was active where
//! it was enqueued, or around an inline execution.

use std::future::Future;

use crate::scope::{self, ReadTarget};

/// Run one deferred unit of work under a fresh default read scope.
///
/// The default is sampled when the unit starts, so flipping
/// [`set_default_to_primary`](crate::set_default_to_primary) between enqueue
/// and execution is honored. A `distribute` call inside the unit scopes
/// itself as usual.
///
/// # Examples
///
/// ```
/// use replica_reads::{current_read_target, job};
///
/// # tokio_test::block_on(async {
/// let target = job::perform(async { current_read_target() }).await;
/// assert_eq!(target.to_string(), "primary");
/// # });
/// ```
pub async fn perform<F>(unit: F) -> F::Output
where
    F: Future,
{
    scope::scoped(ReadTarget::process_default(), unit).await
}
