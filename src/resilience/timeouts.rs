//! Per-attempt timeout enforcement.
//!
//! # Responsibilities
//! - Run one attempt of an operation under its deadline
//! - Abort the attempt immediately when the caller cancels
//! - Sleep between attempts, also cancellable
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - The deadline applies to each attempt, never cumulatively
//! - A timed-out attempt is dropped; no partial result is kept

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Outcome of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    Pending,
    Success,
    Failure,
    Timeout,
}

/// One invocation of the operation inside a call.
#[derive(Debug, Clone)]
pub struct CallAttempt {
    pub attempt_number: u32,
    pub started_at: Instant,
    pub status: AttemptStatus,
}

impl CallAttempt {
    pub fn start(attempt_number: u32) -> Self {
        Self {
            attempt_number,
            started_at: Instant::now(),
            status: AttemptStatus::Pending,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// What running an attempt produced.
#[derive(Debug)]
pub enum AttemptResult<T, E> {
    Completed(Result<T, E>),
    TimedOut,
    Cancelled,
}

/// Run `future` until it completes, the deadline passes, or `cancel` fires.
pub async fn run_attempt<T, E, Fut>(
    future: Fut,
    deadline: Duration,
    cancel: &CancellationToken,
) -> AttemptResult<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => AttemptResult::Cancelled,
        result = tokio::time::timeout(deadline, future) => match result {
            Ok(completed) => AttemptResult::Completed(completed),
            Err(_) => AttemptResult::TimedOut,
        },
    }
}

/// Sleep for `delay`. Returns `false` if cancelled first.
pub async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
