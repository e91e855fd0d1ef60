//! Error types for exact sampling.
//!
//! Every error here is raised instead of returning an approximate result:
//! malformed parameters are rejected before the first bit is drawn, and a
//! broken approximation oracle is surfaced as soon as it is observed.

use thiserror::Error;

/// Errors reported by the sampling algorithms.
///
/// # Examples
///
/// ```
/// use exact_rand::error::Error;
///
/// let err = Error::InvalidArgument("denominator must be positive".to_string());
/// assert_eq!(err.to_string(), "Invalid argument: denominator must be positive");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed probability, coefficient or exponent.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An oracle bound (or degree schedule) broke the monotone narrowing
    /// contract of the general factory-function simulator.
    #[error("Internal consistency violation: {0}")]
    InternalConsistency(String),

    /// Two PSRNs with different digit bases were combined.
    #[error("PSRN base mismatch: {left} vs {right}")]
    BaseMismatch { left: u32, right: u32 },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub(crate) fn inconsistent(msg: impl Into<String>) -> Self {
        Error::InternalConsistency(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn test_display() {
        let err = Error::inconsistent("fbelow(2, 1) = 0 < 1/4");
        assert_eq!(
            err.to_string(),
            "Internal consistency violation: fbelow(2, 1) = 0 < 1/4"
        );

        let err = Error::BaseMismatch { left: 2, right: 10 };
        assert_eq!(err.to_string(), "PSRN base mismatch: 2 vs 10");
    }
}
