//! Executor behavior through the public API.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use simple_llm::parallel::{ExecutionMode, Executor, SettledSummary};
use simple_llm::timeout::ChannelObserver;
use simple_llm::{run, ConfigurationError, ExecutorConfig, Outcome, Rejection};

type BoxedTask = Pin<Box<dyn Future<Output = Result<&'static str, String>> + Send>>;

fn after(millis: u64, result: Result<&'static str, String>) -> BoxedTask {
    Box::pin(async move {
        tokio::time::sleep(Duration::from_millis(millis)).await;
        result
    })
}

#[tokio::test(start_paused = true)]
async fn test_mixed_batch_settles_every_task() {
    let (observer, mut records) = ChannelObserver::new(16);
    let config = ExecutorConfig::new()
        .with_concurrency(2)
        .with_deadline_millis(50)
        .with_max_checkpoints(1)
        .with_observer(Arc::new(observer));

    let tasks = vec![
        after(10, Ok("fast")),
        after(5, Err("refused".to_string())),
        Box::pin(std::future::pending::<Result<&'static str, String>>()) as BoxedTask,
        after(70, Ok("slow")),
    ];

    let outcomes = run(tasks, config).await.unwrap();

    assert_eq!(outcomes[0], Outcome::Fulfilled("fast"));
    assert_eq!(
        outcomes[1],
        Outcome::Rejected(Rejection::Task("refused".to_string()))
    );
    assert_eq!(
        outcomes[2]
            .reason()
            .and_then(Rejection::timeout)
            .map(|t| t.attempts),
        Some(2)
    );
    assert_eq!(outcomes[3], Outcome::Fulfilled("slow"));

    let summary = SettledSummary::of(&outcomes);
    assert_eq!(summary.fulfilled, 2);
    assert_eq!(summary.rejected, 2);
    assert_eq!(summary.timed_out, 1);

    // Hanging task: two windows. Slow task: one window expired before it settled.
    let mut seen = Vec::new();
    while let Ok(record) = records.try_recv() {
        seen.push((record.task_index, record.attempt));
    }
    seen.sort();
    assert_eq!(seen, vec![(2, 1), (2, 2), (3, 1)]);
}

#[tokio::test(start_paused = true)]
async fn test_series_mode_keeps_one_task_running() {
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..4)
        .map(|index| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, String>(index)
            }
        })
        .collect();

    let executor = Executor::new(ExecutorConfig::new().with_mode(ExecutionMode::Series)).unwrap();
    let outcomes = executor.run(tasks).await;

    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(
        outcomes.into_iter().filter_map(|o| o.into_result().ok()).collect::<Vec<_>>(),
        vec![0, 1, 2, 3]
    );
}

#[tokio::test]
async fn test_invalid_configuration_runs_nothing() {
    let started = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&started);
    let tasks = vec![async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok::<_, String>(())
    }];

    let err = run(tasks, ExecutorConfig::new().with_concurrency(0))
        .await
        .unwrap_err();

    assert_eq!(err, ConfigurationError::ZeroConcurrency(0));
    assert_eq!(started.load(Ordering::SeqCst), 0);
}
