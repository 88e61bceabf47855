//! Chat completion collaborators for the batch executor.
//!
//! - [`prompt`]: builds prompts from a task and a field schema
//! - [`client`]: sends prompts to OpenAI or Azure OpenAI
//! - [`repair`]: recovers JSON from malformed model output
//! - [`batch`]: runs many prompts through [`crate::parallel::Executor`]
//! - [`combine`]: merges fulfilled results, ignoring failures

pub mod batch;
pub mod client;
pub mod combine;
pub mod error;
pub mod prompt;
pub mod repair;

pub use batch::run_many;
pub use client::{
    text_length, Analytics, Completion, CompletionProvider, ContextSize, LlmClient, Provider,
};
pub use combine::{combine, Combined};
pub use error::{LlmError, LlmResult};
pub use prompt::{normalize_whitespace, Field, FieldSpec, PromptBuilder, PromptOptions, Schema};
pub use repair::{parse_lenient, RepairError};
