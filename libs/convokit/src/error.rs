use std::fmt;

use convokit_errors::VendorProblem;
use convokit_http::HttpError;
use convokit_schema::Violations;
use http::StatusCode;
use thiserror::Error;

use crate::auth::TokenError;

/// Which side of a call failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStage {
    Input,
    Output,
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Input => "input",
            Self::Output => "output",
        })
    }
}

/// Every failure a pipeline call can report.
///
/// `operation` is the diagnostic name of the call, e.g. `users.create`.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ClientError {
    /// Input or output did not match its schema. Input failures happen before
    /// any network I/O.
    #[error("{operation}: invalid {stage}: {violations}")]
    Validation {
        operation: String,
        stage: ValidationStage,
        violations: Violations,
    },

    /// A required argument for the chosen mode is missing or unusable.
    #[error("{operation}: {message}")]
    Precondition { operation: String, message: String },

    /// The HTTP exchange itself failed (network, TLS, timeout).
    #[error("{operation}: {source}")]
    Transport {
        operation: String,
        #[source]
        source: HttpError,
    },

    /// The API answered with a status outside 200/201/204.
    /// `message` is the translated vendor error or the raw body.
    #[error("{message}")]
    Remote {
        operation: String,
        status: StatusCode,
        message: String,
        problem: Option<VendorProblem>,
    },

    #[error("{operation}: failed to obtain bearer token: {source}")]
    Token {
        operation: String,
        #[source]
        source: TokenError,
    },
}

impl ClientError {
    pub(crate) fn precondition(operation: &str, message: impl Into<String>) -> Self {
        Self::Precondition {
            operation: operation.to_owned(),
            message: message.into(),
        }
    }

    pub(crate) fn validation(
        operation: &str,
        stage: ValidationStage,
        violations: Violations,
    ) -> Self {
        Self::Validation {
            operation: operation.to_owned(),
            stage,
            violations,
        }
    }

    #[must_use]
    pub fn operation(&self) -> &str {
        match self {
            Self::Validation { operation, .. }
            | Self::Precondition { operation, .. }
            | Self::Transport { operation, .. }
            | Self::Remote { operation, .. }
            | Self::Token { operation, .. } => operation,
        }
    }

    /// HTTP status for [`ClientError::Remote`].
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn violations(&self) -> Option<&Violations> {
        match self {
            Self::Validation { violations, .. } => Some(violations),
            _ => None,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use convokit_schema::ViolationCode;

    #[test]
    fn remote_error_displays_translated_message_only() {
        let err = ClientError::Remote {
            operation: "users.find".to_owned(),
            status: StatusCode::NOT_FOUND,
            message: "Vonage Error: Not Found | user:error:not-found | missing".to_owned(),
            problem: None,
        };
        assert_eq!(err.to_string(), "Vonage Error: Not Found | user:error:not-found | missing");
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.operation(), "users.find");
    }

    #[test]
    fn validation_error_names_stage_and_fields() {
        let err = ClientError::validation(
            "users.create",
            ValidationStage::Input,
            Violations::single("name", "required", ViolationCode::Required),
        );
        assert_eq!(err.to_string(), "users.create: invalid input: invalid value: name: required");
        assert_eq!(err.violations().unwrap().len(), 1);
        assert!(err.status().is_none());
    }
}
