//! Patience loop: several deadline windows for one pending task.
//!
//! A task that misses its deadline is not restarted. The loop keeps waiting on
//! the same pending future for up to `max_checkpoints + 1` consecutive windows,
//! notifying the observer each time a window expires. Only when the last
//! window expires is the task abandoned with a [`TimeoutError`].
//!
//! Abandoning a task drops its future, which cancels the underlying work at
//! its next suspension point.

use std::fmt;
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use super::checkpoint::{CheckpointObserver, CheckpointRecord};
use super::{race, Raced, TimeoutError};
use crate::parallel::{Outcome, Rejection};

/// Drives one task through a bounded number of deadline windows.
#[derive(Clone)]
pub struct PatienceLoop {
    /// Length of each deadline window.
    deadline: Duration,
    /// Extra windows granted after the first timeout.
    max_checkpoints: u32,
    /// Receives a record every time a window expires.
    observer: Option<Arc<dyn CheckpointObserver>>,
    /// Also notify the observer when the task fails with its own error.
    notify_on_failure: bool,
}

impl PatienceLoop {
    /// Creates a loop with a single window of `deadline` and no observer.
    pub fn new(deadline: Duration) -> Self {
        Self {
            deadline,
            max_checkpoints: 0,
            observer: None,
            notify_on_failure: false,
        }
    }

    /// Sets how many extra windows a task gets after its first timeout.
    pub fn with_max_checkpoints(mut self, max_checkpoints: u32) -> Self {
        self.max_checkpoints = max_checkpoints;
        self
    }

    /// Sets the observer notified at each checkpoint.
    pub fn with_observer(mut self, observer: Option<Arc<dyn CheckpointObserver>>) -> Self {
        self.observer = observer;
        self
    }

    /// Also notify the observer once when the task fails with its own error.
    pub fn with_notify_on_failure(mut self, notify: bool) -> Self {
        self.notify_on_failure = notify;
        self
    }

    /// Total number of deadline windows a task can receive.
    pub fn max_attempts(&self) -> u32 {
        self.max_checkpoints.saturating_add(1)
    }

    /// Returns the length of each deadline window.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Waits on `task` until it settles or its last window expires.
    ///
    /// `task_index` only identifies the task in checkpoint records and logs.
    pub async fn run<F, T, E>(&self, task_index: usize, task: F) -> Outcome<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let mut task = pin!(task);
        let max_attempts = self.max_attempts();
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            match race(&mut task, self.deadline).await {
                Raced::Settled(Ok(value)) => {
                    debug!(task_index, attempt, "task settled within deadline");
                    return Outcome::Fulfilled(value);
                }
                Raced::Settled(Err(err)) => {
                    if self.notify_on_failure {
                        self.notify(task_index, attempt);
                    }
                    debug!(task_index, attempt, "task failed; no further checkpoints");
                    return Outcome::Rejected(Rejection::Task(err));
                }
                Raced::TimedOut => {
                    self.notify(task_index, attempt);

                    if attempt >= max_attempts {
                        let waited = started.elapsed();
                        warn!(
                            task_index,
                            attempts = attempt,
                            waited_ms = waited.as_millis() as u64,
                            "task abandoned after final deadline window"
                        );
                        return Outcome::Rejected(Rejection::Timeout(TimeoutError {
                            attempts: attempt,
                            waited,
                        }));
                    }

                    warn!(
                        task_index,
                        attempt,
                        max_attempts,
                        deadline_ms = self.deadline.as_millis() as u64,
                        "deadline window expired; extending patience"
                    );
                }
            }
        }
    }

    fn notify(&self, task_index: usize, attempt: u32) {
        if let Some(observer) = self.observer.as_ref() {
            observer.on_checkpoint(&CheckpointRecord::new(task_index, attempt));
        }
    }
}

impl fmt::Debug for PatienceLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatienceLoop")
            .field("deadline", &self.deadline)
            .field("max_checkpoints", &self.max_checkpoints)
            .field("observer", &self.observer.is_some())
            .field("notify_on_failure", &self.notify_on_failure)
            .finish()
    }
}
