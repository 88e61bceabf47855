//! Integration tests for simple-llm.

mod batch;
mod cli;
mod executor;
