//! Error types for the library
//!
//! Every fallible operation returns [`Result`]. Arguments are validated before
//! anything is mutated, so an `Err` leaves weights, gradient accumulators and
//! optimiser state exactly as they were.

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, NetError>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum NetError {
    /// Bad sizes, out-of-range hyperparameters, mismatched shapes or unknown names
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Objective/transfer pair without a derived gradient at the pre-activation
    #[error("Unsupported combination: objective '{objective}' cannot be used with transfer '{transfer}'")]
    UnsupportedCombination {
        objective: &'static str,
        transfer: &'static str,
    },

    /// Backprop requested while no batch is open
    #[error("Batch not started: {0}")]
    NotStarted(String),

    /// A value of the wrong kind, e.g. a layer record restored as an optimiser
    #[error("Type error: {0}")]
    Type(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NetError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        NetError::InvalidArgument(msg.into())
    }
}

/// Fails with `InvalidArgument` unless `actual == expected`.
pub(crate) fn check_len(what: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(NetError::invalid(format!(
            "{} has {} elements, expected {}",
            what, actual, expected
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_len() {
        assert!(check_len("input", 3, 3).is_ok());
        let err = check_len("input", 2, 3).unwrap_err();
        assert!(matches!(err, NetError::InvalidArgument(_)));
        assert_eq!(
            err.to_string(),
            "Invalid argument: input has 2 elements, expected 3"
        );
    }

    #[test]
    fn test_unsupported_combination_message() {
        let err = NetError::UnsupportedCombination {
            objective: "logloss",
            transfer: "relu",
        };
        assert!(err.to_string().contains("'logloss'"));
        assert!(err.to_string().contains("'relu'"));
    }
}
