//! Running the proof-of-work search from async code
//!
//! The search is CPU bound, so it runs on tokio's blocking pool. When the
//! timeout fires the workers are told to stop; nothing is left running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::warn;

use deploy_core::{ParallelSolver, PowChallenge, Solution};

/// Solve `challenge` on the blocking pool, giving up after `timeout`
///
/// Returns `Ok(None)` when the search was abandoned.
pub async fn solve_with_timeout(
    solver: ParallelSolver,
    challenge: PowChallenge,
    timeout: Option<Duration>,
) -> Result<Option<Solution>> {
    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);

    let mut handle = tokio::task::spawn_blocking(move || {
        solver.solve_until(&challenge, &worker_cancel)
    });

    let Some(timeout) = timeout else {
        return Ok(handle.await?);
    };

    match tokio::time::timeout(timeout, &mut handle).await {
        Ok(joined) => Ok(joined?),
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs_f64(), "proof-of-work search timed out");
            cancel.store(true, Ordering::SeqCst);
            // Workers notice the flag within a few hundred attempts. A nonce
            // found just before the flag was raised is still returned.
            Ok(handle.await?)
        }
    }
}
