//! Admission control for concurrently running tasks.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Semaphore;
use tracing::debug;

/// Admits at most `capacity` tasks at a time.
///
/// Tasks beyond the limit wait for a permit in strict FIFO order (tokio's
/// semaphore is fair). A permit is held until the admitted task finishes and
/// is then handed straight to the next waiter. Running tasks are never
/// preempted.
#[derive(Debug)]
pub struct ConcurrencyGate {
    /// Semaphore for limiting concurrent tasks.
    permits: Semaphore,
    /// Number of permits the gate was created with.
    capacity: usize,
    /// Tasks submitted but not yet admitted.
    waiting: AtomicUsize,
}

impl ConcurrencyGate {
    /// Creates a gate with `capacity` permits.
    ///
    /// The capacity is clamped to `1..=Semaphore::MAX_PERMITS`; callers are
    /// expected to have validated it already.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            permits: Semaphore::new(capacity),
            capacity,
            waiting: AtomicUsize::new(0),
        }
    }

    /// Maximum number of tasks admitted at once.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of tasks currently admitted and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }

    /// Number of tasks waiting for a permit.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Waits for a permit, then runs `task` to completion while holding it.
    ///
    /// `task` is not polled before it is admitted, so a queued task does no
    /// work. The gate never alters the task's output.
    pub async fn admit<F>(&self, task: F) -> F::Output
    where
        F: Future,
    {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let permit = self.permits.acquire().await;
        self.waiting.fetch_sub(1, Ordering::SeqCst);

        // Hold the permit until the task completes (RAII). The semaphore is
        // never closed, so acquisition cannot fail.
        let _permit = permit.ok();
        debug!(
            in_flight = self.in_flight(),
            capacity = self.capacity,
            waiting = self.waiting(),
            "task admitted"
        );

        let output = task.await;
        debug!(in_flight = self.in_flight().saturating_sub(1), "task released");
        output
    }
}
