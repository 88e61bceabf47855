//! Errors raised before a batch starts.

use thiserror::Error;

/// Invalid executor configuration.
///
/// This is the only error that fails a whole `run` call. Every per-task
/// failure is reported as that task's [`Outcome`](crate::parallel::Outcome)
/// instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// `concurrency` must admit at least one task.
    #[error("concurrency must be at least 1, got {0}")]
    ZeroConcurrency(usize),

    /// A configured deadline must be a positive duration.
    #[error("deadline must be greater than zero")]
    ZeroDeadline,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ConfigurationError::ZeroConcurrency(0).to_string(),
            "concurrency must be at least 1, got 0"
        );
        assert_eq!(
            ConfigurationError::ZeroDeadline.to_string(),
            "deadline must be greater than zero"
        );
    }
}
