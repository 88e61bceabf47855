//! Deadline racing for in-flight tasks.
//!
//! This module races a pending task against a one-shot timer, and builds on
//! that to give slow tasks several consecutive deadline windows (checkpoints)
//! before they are abandoned.

pub mod checkpoint;
pub mod patience;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

// Re-export checkpoint types for convenient access
pub use checkpoint::{ChannelObserver, CheckpointObserver, CheckpointRecord};
pub use patience::PatienceLoop;

/// Result of racing a task against a deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Raced<R> {
    /// The task settled (successfully or not) before the timer fired.
    Settled(R),
    /// The timer fired first. The task was not consumed and is still pending.
    TimedOut,
}

impl<R> Raced<R> {
    /// Returns true if the timer won the race.
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Raced::TimedOut)
    }
}

/// A task that did not settle within its final deadline window.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("task did not settle within {attempts} deadline window(s) ({waited:?} elapsed)")]
pub struct TimeoutError {
    /// Number of deadline windows the task was given.
    pub attempts: u32,
    /// Total time spent waiting on the task.
    pub waited: Duration,
}

/// Races `task` against a timer that starts now and fires after `deadline`.
///
/// The task is borrowed, not consumed: when the timer wins, the same pending
/// task can be raced again against a fresh window. When the task wins, the
/// timer is dropped.
pub async fn race<F>(task: &mut F, deadline: Duration) -> Raced<F::Output>
where
    F: Future + Unpin,
{
    match tokio::time::timeout(deadline, task).await {
        Ok(output) => Raced::Settled(output),
        Err(_elapsed) => Raced::TimedOut,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::pin;

    #[tokio::test(start_paused = true)]
    async fn test_race_task_wins() {
        let mut task = pin!(async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            42
        });

        let raced = race(&mut task, Duration::from_millis(500)).await;
        assert_eq!(raced, Raced::Settled(42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_timer_wins() {
        let mut task = pin!(std::future::pending::<u32>());

        let raced = race(&mut task, Duration::from_millis(50)).await;
        assert!(raced.is_timed_out());
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_error_is_settled_not_timeout() {
        let mut task = pin!(async { Err::<u32, &str>("boom") });

        let raced = race(&mut task, Duration::from_millis(50)).await;
        assert_eq!(raced, Raced::Settled(Err("boom")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_same_task_across_windows() {
        let start = tokio::time::Instant::now();
        let mut task = pin!(async {
            tokio::time::sleep(Duration::from_millis(120)).await;
            "done"
        });

        assert!(race(&mut task, Duration::from_millis(50)).await.is_timed_out());
        assert!(race(&mut task, Duration::from_millis(50)).await.is_timed_out());
        // The sleep keeps its original start time, so the third window sees it finish
        assert_eq!(
            race(&mut task, Duration::from_millis(50)).await,
            Raced::Settled("done")
        );
        assert!(start.elapsed() < Duration::from_millis(150));
    }

    #[test]
    fn test_timeout_error_display() {
        let err = TimeoutError {
            attempts: 3,
            waited: Duration::from_millis(150),
        };
        let message = err.to_string();
        assert!(message.contains("3 deadline window(s)"));
        assert!(message.contains("150ms"));
    }
}
