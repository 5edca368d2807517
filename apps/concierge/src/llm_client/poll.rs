//! Bounded status polling for long-running remote jobs.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

/// Fixed-interval, fixed-budget polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Total number of status checks, including the first one.
    pub max_attempts: u32,
}

#[derive(Debug)]
pub enum PollOutcome<T> {
    /// The last fetched value satisfied the stop condition.
    Finished(T),
    /// The attempt budget ran out; holds the last value seen.
    GaveUp(T),
}

impl<T> PollOutcome<T> {
    pub fn is_finished(&self) -> bool {
        matches!(self, PollOutcome::Finished(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            PollOutcome::Finished(v) | PollOutcome::GaveUp(v) => v,
        }
    }
}

/// Calls `fetch` until `is_done` accepts the result or the budget is spent,
/// sleeping `policy.interval` between checks. A fetch error stops the loop
/// immediately and is returned.
pub async fn poll_until<T, E, F, Fut, D>(
    policy: PollPolicy,
    mut fetch: F,
    is_done: D,
) -> Result<PollOutcome<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    D: Fn(&T) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let value = fetch().await?;
        if is_done(&value) {
            return Ok(PollOutcome::Finished(value));
        }
        if attempt >= max_attempts {
            warn!("Giving up after {} status checks", attempt);
            return Ok(PollOutcome::GaveUp(value));
        }
        info!(
            "Waiting {} seconds before checking again ({}/{})...",
            policy.interval.as_secs(),
            attempt,
            max_attempts
        );
        tokio::time::sleep(policy.interval).await;
        attempt += 1;
    }
}
