//! Bounded-concurrency batch executor

use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::Instant;
use tracing::{debug, info};

use super::config::ExecutorConfig;
use super::gate::ConcurrencyGate;
use super::settled::{Outcome, SettledAggregator};
use crate::error::ConfigurationError;
use crate::timeout::PatienceLoop;

/// Runs a batch of independent tasks under one configuration.
///
/// Each task is admitted through a [`ConcurrencyGate`], raced against its
/// deadline windows when a deadline is configured, and settled into an
/// [`Outcome`]. A failing or hanging task never aborts its siblings.
///
/// All admitted tasks are polled on the caller's task; nothing is spawned, so
/// tasks may borrow from the caller and need not be `Send` or `'static`.
///
/// # Example
///
/// ```ignore
/// use simple_llm::parallel::{Executor, ExecutorConfig};
///
/// let executor = Executor::new(
///     ExecutorConfig::new()
///         .with_concurrency(2)
///         .with_deadline_millis(30_000)
///         .with_max_checkpoints(1),
/// )?;
///
/// let outcomes = executor
///     .run(prompts.iter().map(|prompt| client.complete(prompt)))
///     .await;
///
/// for outcome in &outcomes {
///     println!("{}", outcome.status());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Executor {
    /// Validated configuration.
    config: ExecutorConfig,
    /// Deadline handling, present only when a deadline is configured.
    patience: Option<PatienceLoop>,
}

impl Executor {
    /// Validates `config` and creates an executor.
    ///
    /// This is the only place a batch can fail as a whole.
    pub fn new(config: ExecutorConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let patience = config.patience();
        Ok(Self { config, patience })
    }

    /// Returns the executor configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Runs every task and returns their outcomes in input order.
    ///
    /// Tasks are admitted in input order. Each outcome sits at the index of
    /// the task that produced it, whatever order the tasks settled in.
    pub async fn run<I, F, T, E>(&self, tasks: I) -> Vec<Outcome<T, E>>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = Result<T, E>>,
    {
        let tasks: Vec<F> = tasks.into_iter().collect();
        let total = tasks.len();
        if total == 0 {
            return Vec::new();
        }

        // No point holding more permits than there are tasks
        let gate = ConcurrencyGate::new(self.config.concurrency.min(total));
        let patience = self.patience.as_ref();
        let started = Instant::now();

        info!(
            tasks = total,
            concurrency = gate.capacity(),
            deadline_ms = self.config.deadline.map(|d| d.as_millis() as u64),
            max_checkpoints = self.config.max_checkpoints,
            "starting batch"
        );

        let mut pending: FuturesUnordered<_> = tasks
            .into_iter()
            .enumerate()
            .map(|(index, task)| {
                let gate = &gate;
                async move {
                    let outcome = gate
                        .admit(async move {
                            match patience {
                                Some(patience) => patience.run(index, task).await,
                                None => Outcome::from(task.await),
                            }
                        })
                        .await;
                    (index, outcome)
                }
            })
            .collect();

        let mut aggregator = SettledAggregator::new(total);
        while let Some((index, outcome)) = pending.next().await {
            debug!(task_index = index, status = outcome.status(), "task settled");
            aggregator.record(index, outcome);
        }
        drop(pending);

        let summary = aggregator.summary();
        info!(
            tasks = summary.total,
            fulfilled = summary.fulfilled,
            rejected = summary.rejected,
            timed_out = summary.timed_out,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch settled"
        );

        // Every pushed future yields its own index exactly once
        match aggregator.finish() {
            Ok(outcomes) => outcomes,
            Err(err) => unreachable!("batch drained without settling every task: {}", err),
        }
    }
}

/// Validates `config`, then runs `tasks` with it.
///
/// Fails only with a [`ConfigurationError`], before any task is polled.
/// Otherwise every task gets an [`Outcome`] at its input index.
pub async fn run<I, F, T, E>(
    tasks: I,
    config: ExecutorConfig,
) -> Result<Vec<Outcome<T, E>>, ConfigurationError>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    let executor = Executor::new(config)?;
    Ok(executor.run(tasks).await)
}
