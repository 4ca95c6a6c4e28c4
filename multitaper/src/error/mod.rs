//! Crate-level error returned by the free functions.

use core::{error, fmt};

use crate::kernel::{ConfigError, ExecInvariantViolation};

/// Errors raised whilst estimating spectra.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Argument passed into a function was invalid.
    InvalidParameter {
        /// The invalid arg
        arg: String,
        /// Explaining why arg is invalid.
        reason: String,
    },
    /// Two operands that must agree in shape did not.
    ShapeMismatch {
        /// Explaining which shapes disagreed.
        reason: String,
    },
}

/// Category of an [`Error`], for callers that only need to branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`Error::InvalidParameter`].
    InvalidParameter,
    /// See [`Error::ShapeMismatch`].
    ShapeMismatch,
}

impl Error {
    pub(crate) fn invalid(arg: &str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            arg: arg.into(),
            reason: reason.into(),
        }
    }

    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            Error::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidParameter { arg, reason } => {
                write!(f, "Invalid argument `{arg}`: {reason}")
            }
            Error::ShapeMismatch { reason } => write!(f, "shape mismatch: {reason}"),
        }
    }
}

impl error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(value: ConfigError) -> Self {
        match value {
            ConfigError::EmptyInput { arg } => Error::invalid(arg, "input must be non-empty"),
            ConfigError::InvalidArgument { arg, reason } => Error::invalid(arg, reason),
            ConfigError::NonContiguous { arg } => {
                Error::invalid(arg, "input must be contiguous in memory")
            }
        }
    }
}

impl From<ExecInvariantViolation> for Error {
    fn from(value: ExecInvariantViolation) -> Self {
        match value {
            ExecInvariantViolation::InvalidState { reason } => Error::invalid("input", reason),
            ExecInvariantViolation::LengthMismatch { arg, expected, got } => Error::invalid(
                arg,
                format!("expected length {expected}, got {got}"),
            ),
            ExecInvariantViolation::ShapeMismatch { arg, expected, got } => Error::ShapeMismatch {
                reason: format!("`{arg}` expected {expected:?}, got {got:?}"),
            },
            ExecInvariantViolation::Config(err) => err.into(),
        }
    }
}
