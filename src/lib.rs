//! simple-llm: run batches of chat completion prompts with bounded
//! concurrency, deadline checkpoints and fail-open results.
//!
//! The core is [`parallel::Executor`], which runs any batch of futures and
//! reports one [`parallel::Outcome`] per task in input order. The [`llm`]
//! module builds prompts, calls the chat completion API and merges results.

pub mod error;
pub mod llm;
pub mod parallel;
pub mod settings;
pub mod timeout;

pub use error::ConfigurationError;
pub use parallel::{run, ExecutionMode, Executor, ExecutorConfig, Outcome, Rejection};
pub use settings::{Settings, SettingsError};
pub use timeout::{CheckpointObserver, CheckpointRecord, TimeoutError};
