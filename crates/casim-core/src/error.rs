//! Unified error types for the casim ecosystem
//!
//! This module provides a common error type [`SimError`] that can represent
//! errors from any part of the simulator. Domain-specific error types can be
//! converted to `SimError` for uniform error handling at API boundaries.

use thiserror::Error;

/// Unified error type for all simulator operations.
///
/// Configuration errors are raised before any simulation work starts and
/// name the offending field; trace errors cover windows that run past the
/// available carbon rows.
#[derive(Error, Debug)]
pub enum SimError {
    /// I/O errors (file access, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration errors (unknown policy names, bad combinations)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Carbon or job trace errors (short windows, missing columns)
    #[error("Trace error: {0}")]
    Trace(String),

    /// Solver/planner errors
    #[error("Solver error: {0}")]
    Solver(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using SimError.
pub type SimResult<T> = Result<T, SimError>;

impl From<anyhow::Error> for SimError {
    fn from(err: anyhow::Error) -> Self {
        SimError::Other(err.to_string())
    }
}

impl From<String> for SimError {
    fn from(s: String) -> Self {
        SimError::Other(s)
    }
}

impl From<&str> for SimError {
    fn from(s: &str) -> Self {
        SimError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SimError::Config("unknown scheduling policy 'zonal'".into());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("zonal"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let sim_err: SimError = io_err.into();
        assert!(matches!(sim_err, SimError::Io(_)));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> SimResult<()> {
            Err(SimError::Trace("window past end of series".into()))
        }

        fn outer() -> SimResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
