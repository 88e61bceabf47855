//! Bounded-concurrency batch execution.
//!
//! This module runs a batch of independent tasks without letting one failing
//! or hanging task take the rest of the batch down with it.
//!
//! # Overview
//!
//! The executor consists of:
//! - **ConcurrencyGate**: Admits at most `concurrency` tasks at once, FIFO
//! - **PatienceLoop**: Gives slow tasks several deadline windows (see [`crate::timeout`])
//! - **SettledAggregator**: Collects every outcome in input order
//! - **Executor**: Wires the above together per [`ExecutorConfig`]
//!
//! # Example
//!
//! ```ignore
//! use simple_llm::parallel::{run, ExecutorConfig, Outcome};
//!
//! let config = ExecutorConfig::new()
//!     .with_concurrency(2)
//!     .with_deadline_millis(50)
//!     .with_max_checkpoints(2);
//!
//! let outcomes = run(tasks, config).await?;
//! for (index, outcome) in outcomes.iter().enumerate() {
//!     if let Outcome::Rejected(reason) = outcome {
//!         eprintln!("task {} failed: {}", index, reason);
//!     }
//! }
//! ```

pub mod config;
pub mod gate;
pub mod scheduler;
pub mod settled;

pub use config::{ExecutionMode, ExecutorConfig, DEFAULT_CONCURRENCY, DEFAULT_MAX_CHECKPOINTS};
pub use gate::ConcurrencyGate;
pub use scheduler::{run, Executor};
pub use settled::{Outcome, Rejection, SettleError, SettledAggregator, SettledSummary};
