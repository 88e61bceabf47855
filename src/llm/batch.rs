//! Running many prompts through the executor.

use tracing::info;

use super::client::{Completion, CompletionProvider};
use super::error::LlmError;
use crate::error::ConfigurationError;
use crate::parallel::{Executor, ExecutorConfig, Outcome, SettledSummary};

/// Completes every prompt under `config`, one task per prompt.
///
/// Outcomes line up with `prompts`. A failed request only rejects its own
/// outcome; the call as a whole fails only on invalid configuration, before
/// any request is sent.
pub async fn run_many<P, S>(
    provider: &P,
    prompts: &[S],
    config: ExecutorConfig,
) -> Result<Vec<Outcome<Completion, LlmError>>, ConfigurationError>
where
    P: CompletionProvider + ?Sized,
    S: AsRef<str>,
{
    let executor = Executor::new(config)?;
    let outcomes = executor
        .run(prompts.iter().map(|prompt| provider.complete(prompt.as_ref())))
        .await;

    let summary = SettledSummary::of(&outcomes);
    info!(
        prompts = summary.total,
        fulfilled = summary.fulfilled,
        rejected = summary.rejected,
        "prompts completed"
    );

    Ok(outcomes)
}
