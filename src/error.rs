//! Error types for the agent and its learned models.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Size mismatch in {context}: expected {expected}, got {got}")]
    SizeMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Observation {index} out of range: {value} not in [-1, 1]")]
    ObservationOutOfRange { index: usize, value: f64 },

    #[error("Mentor feedback out of range: {0} not in [0, 1]")]
    FeedbackOutOfRange(f64),

    #[error("Population size must be at least 2, got {0}")]
    PopulationTooSmall(usize),

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Fails with `SizeMismatch` unless `got == expected`.
#[inline]
pub(crate) fn check_len(context: &'static str, expected: usize, got: usize) -> AgentResult<()> {
    if expected == got {
        Ok(())
    } else {
        Err(AgentError::SizeMismatch {
            context,
            expected,
            got,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_len_accepts_equal() {
        assert!(check_len("test", 3, 3).is_ok());
    }

    #[test]
    fn test_check_len_reports_context() {
        let err = check_len("forward", 3, 2).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Size mismatch in forward: expected 3, got 2"
        );
    }
}
