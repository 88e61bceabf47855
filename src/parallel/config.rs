//! Executor configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::timeout::{CheckpointObserver, PatienceLoop};

/// Default number of tasks admitted at once.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Default number of extra deadline windows after the first timeout.
pub const DEFAULT_MAX_CHECKPOINTS: u32 = 0;

/// How a batch is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One task at a time, in input order.
    Series,
    /// Every task admitted at once.
    Parallel,
    /// At most this many tasks at once.
    Limit(usize),
}

impl ExecutionMode {
    /// Concurrency this mode maps to.
    pub fn concurrency(&self) -> usize {
        match self {
            ExecutionMode::Series => 1,
            ExecutionMode::Parallel => usize::MAX,
            ExecutionMode::Limit(limit) => *limit,
        }
    }
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Limit(DEFAULT_CONCURRENCY)
    }
}

/// Configuration for a batch run.
///
/// Built with the `with_*` methods and validated by
/// [`Executor::new`](super::Executor::new).
#[derive(Clone)]
pub struct ExecutorConfig {
    /// Maximum number of tasks running at once.
    /// Default: 3
    pub concurrency: usize,

    /// Length of each deadline window. `None` disables deadlines entirely and
    /// tasks run until they settle.
    /// Default: None
    pub deadline: Option<Duration>,

    /// Extra deadline windows a task gets after its first timeout.
    /// Default: 0
    pub max_checkpoints: u32,

    /// Notified every time a deadline window expires.
    /// Default: None
    pub observer: Option<Arc<dyn CheckpointObserver>>,

    /// Also notify the observer once when a task fails with its own error.
    /// Default: false
    pub notify_on_failure: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            deadline: None,
            max_checkpoints: DEFAULT_MAX_CHECKPOINTS,
            observer: None,
            notify_on_failure: false,
        }
    }
}

impl ExecutorConfig {
    /// Creates a new ExecutorConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the concurrency limit.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the concurrency limit from an execution mode.
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.concurrency = mode.concurrency();
        self
    }

    /// Enables deadlines with windows of the given length.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Enables deadlines with windows of `millis` milliseconds.
    pub fn with_deadline_millis(self, millis: u64) -> Self {
        self.with_deadline(Duration::from_millis(millis))
    }

    /// Sets how many extra deadline windows a task gets.
    pub fn with_max_checkpoints(mut self, max_checkpoints: u32) -> Self {
        self.max_checkpoints = max_checkpoints;
        self
    }

    /// Sets the checkpoint observer.
    pub fn with_observer(mut self, observer: Arc<dyn CheckpointObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Also notify the observer when a task fails with its own error.
    pub fn with_notify_on_failure(mut self, notify: bool) -> Self {
        self.notify_on_failure = notify;
        self
    }

    /// Checks the configuration before any task starts.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.concurrency == 0 {
            return Err(ConfigurationError::ZeroConcurrency(self.concurrency));
        }
        if self.deadline.is_some_and(|deadline| deadline.is_zero()) {
            return Err(ConfigurationError::ZeroDeadline);
        }
        Ok(())
    }

    /// Builds the patience loop, if a deadline is configured.
    pub fn patience(&self) -> Option<PatienceLoop> {
        self.deadline.map(|deadline| {
            PatienceLoop::new(deadline)
                .with_max_checkpoints(self.max_checkpoints)
                .with_observer(self.observer.clone())
                .with_notify_on_failure(self.notify_on_failure)
        })
    }
}

impl fmt::Debug for ExecutorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorConfig")
            .field("concurrency", &self.concurrency)
            .field("deadline", &self.deadline)
            .field("max_checkpoints", &self.max_checkpoints)
            .field("observer", &self.observer.is_some())
            .field("notify_on_failure", &self.notify_on_failure)
            .finish()
    }
}
