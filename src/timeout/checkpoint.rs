//! Checkpoint notifications.
//!
//! Every time a deadline window expires on a still-pending task, the patience
//! loop builds a [`CheckpointRecord`] and hands it to the configured
//! [`CheckpointObserver`]. Observers are called synchronously from inside the
//! loop, so they should return quickly.

use std::fmt;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::debug;

/// A single checkpoint fired for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointRecord {
    /// Position of the task in the submitted batch.
    pub task_index: usize,
    /// Deadline window that just expired, starting at 1.
    pub attempt: u32,
    /// Wall-clock time the checkpoint fired.
    pub fired_at: DateTime<Utc>,
}

impl CheckpointRecord {
    /// Creates a record stamped with the current time.
    pub fn new(task_index: usize, attempt: u32) -> Self {
        Self {
            task_index,
            attempt,
            fired_at: Utc::now(),
        }
    }
}

/// Receives checkpoint notifications from the patience loop.
///
/// Implemented for any `Fn(&CheckpointRecord)` closure, so most callers can
/// pass a closure directly.
pub trait CheckpointObserver: Send + Sync {
    /// Called once per expired deadline window. The return value is ignored.
    fn on_checkpoint(&self, record: &CheckpointRecord);
}

impl<F> CheckpointObserver for F
where
    F: Fn(&CheckpointRecord) + Send + Sync,
{
    fn on_checkpoint(&self, record: &CheckpointRecord) {
        self(record)
    }
}

/// Observer that forwards checkpoint records through a bounded channel.
///
/// Sending never blocks the patience loop: when the channel is full or the
/// receiver is gone, the record is dropped and a debug event is logged.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use simple_llm::timeout::ChannelObserver;
///
/// let (observer, mut receiver) = ChannelObserver::new(16);
/// let config = ExecutorConfig::new()
///     .with_deadline(Duration::from_secs(30))
///     .with_max_checkpoints(2)
///     .with_observer(Arc::new(observer));
///
/// while let Some(record) = receiver.recv().await {
///     println!("task {} still waiting (attempt {})", record.task_index, record.attempt);
/// }
/// ```
#[derive(Clone)]
pub struct ChannelObserver {
    sender: mpsc::Sender<CheckpointRecord>,
}

impl ChannelObserver {
    /// Creates an observer and the receiver its records are delivered to.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<CheckpointRecord>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl fmt::Debug for ChannelObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelObserver")
            .field("capacity", &self.sender.max_capacity())
            .finish()
    }
}

impl CheckpointObserver for ChannelObserver {
    fn on_checkpoint(&self, record: &CheckpointRecord) {
        if let Err(err) = self.sender.try_send(record.clone()) {
            debug!(
                task_index = record.task_index,
                attempt = record.attempt,
                "checkpoint record dropped: {}",
                err
            );
        }
    }
}
