//! Error types for load-balancer reconciliation.
//!
//! Errors are categorized so the CLI can print appropriate feedback. Note that
//! a resource being absent is never an error: the reconciler reports it as
//! [`Outcome::NotFound`](crate::Outcome::NotFound).

use crate::types::Operation;
use std::fmt;

/// Result type alias for lbkit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of lbkit errors for user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing credentials, missing request fields or unparsable values.
    Configuration,
    /// A remote call failed (network, auth, timeout or non-success status).
    Transport,
    /// The API answered with something we could not decode.
    Format,
    /// A load balancer name matched more than one record.
    Ambiguous,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Configuration => "Invalid configuration",
            Self::Transport => "Remote API call failed",
            Self::Format => "Unexpected API response",
            Self::Ambiguous => "Ambiguous load balancer name",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Configuration => {
                "Set CLC_V2_API_TOKEN, or CLC_V2_API_USERNAME and CLC_V2_API_PASSWD, and check the request fields"
            }
            Self::Transport => {
                "Check connectivity and credentials; changes applied before the failure are not rolled back"
            }
            Self::Format => "The API may have changed; rerun with -vv to see the failing call",
            Self::Ambiguous => "Rename or delete the duplicate load balancers before reconciling",
        }
    }

    /// Process exit code the CLI uses for this category.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration => 2,
            Self::Transport | Self::Format => 1,
            Self::Ambiguous => 3,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while reconciling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or inconsistent configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A value could not be parsed.
    #[error("invalid {field}: {value:?}")]
    InvalidValue {
        /// Name of the field being parsed.
        field: &'static str,
        /// The rejected input.
        value: String,
    },

    /// A remote call failed.
    #[error("{operation} failed: {message}")]
    Transport {
        /// The remote operation that failed.
        operation: Operation,
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// The API returned a body that does not decode.
    #[error("invalid response from {operation}: {message}")]
    InvalidResponse {
        /// The remote operation whose response was rejected.
        operation: Operation,
        /// Decoder message.
        message: String,
    },

    /// More than one load balancer carries the requested name.
    #[error("load balancer name {name:?} matches {count} load balancers")]
    AmbiguousName {
        /// The requested name.
        name: String,
        /// How many records matched.
        count: usize,
    },
}

impl Error {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an invalid value error.
    pub fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            value: value.into(),
        }
    }

    /// Create a transport error for an operation.
    pub fn transport(operation: Operation, message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Transport {
            operation,
            message: message.into(),
            status,
        }
    }

    /// Convert a `ureq` error raised while performing `operation`.
    pub fn from_ureq(operation: Operation, err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::transport(operation, format!("HTTP {code}"), Some(code)),
            ureq::Error::Json(e) => Self::InvalidResponse {
                operation,
                message: e.to_string(),
            },
            other => Self::transport(operation, other.to_string(), None),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidValue { .. } => ErrorCategory::Configuration,
            Error::Transport { .. } => ErrorCategory::Transport,
            Error::InvalidResponse { .. } => ErrorCategory::Format,
            Error::AmbiguousName { .. } => ErrorCategory::Ambiguous,
        }
    }

    /// The remote operation involved, if any.
    #[must_use]
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Error::Transport { operation, .. } | Error::InvalidResponse { operation, .. } => {
                Some(*operation)
            }
            _ => None,
        }
    }
}
