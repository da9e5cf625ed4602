use std::fmt;

use http::StatusCode;
use thiserror::Error as ThisError;

/// Errors raised by the authorization pipeline.
///
/// The three decision-related variants are kept apart so an outer handler
/// can map them to distinct responses: [`AuthenticationMissing`] means
/// "challenge for credentials", [`AccessDenied`] means "forbidden", and
/// [`PolicyEvaluation`] is a fatal failure of the policy itself.
///
/// [`AuthenticationMissing`]: Error::AuthenticationMissing
/// [`AccessDenied`]: Error::AccessDenied
/// [`PolicyEvaluation`]: Error::PolicyEvaluation
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum Error {
    /// No principal could be resolved when a policy asked for one.
    #[error("authentication required: {0}")]
    AuthenticationMissing(String),

    /// A principal was resolved but the policy denied the request.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The authorization manager failed for reasons unrelated to the decision.
    #[error("policy evaluation failed: {0}")]
    PolicyEvaluation(String),

    /// Invalid matcher pattern, expression or configuration value.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The downstream handler failed.
    #[error("handler failed: {0}")]
    Handler(String),
}

impl Error {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::AuthenticationMissing(_) => ErrorKind::AuthenticationMissing,
            Error::AccessDenied(_) => ErrorKind::AccessDenied,
            Error::PolicyEvaluation(_) => ErrorKind::PolicyEvaluation,
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Handler(_) => ErrorKind::Handler,
        }
    }

    /// The response status class this error maps to.
    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::AuthenticationMissing => StatusCode::UNAUTHORIZED,
            ErrorKind::AccessDenied => StatusCode::FORBIDDEN,
            ErrorKind::PolicyEvaluation | ErrorKind::Configuration | ErrorKind::Handler => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Human-readable message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Error::AuthenticationMissing(m)
            | Error::AccessDenied(m)
            | Error::PolicyEvaluation(m)
            | Error::Configuration(m)
            | Error::Handler(m) => m,
        }
    }

    pub(crate) fn credentials_not_found() -> Self {
        Error::AuthenticationMissing(
            "an authenticated principal was not found in the security context".to_string(),
        )
    }

    pub(crate) fn access_denied() -> Self {
        Error::AccessDenied("Access Denied".to_string())
    }
}

/// The kind of an [`Error`], without its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Authentication is required but missing
    AuthenticationMissing,
    /// The policy denied the request
    AccessDenied,
    /// The policy itself failed
    PolicyEvaluation,
    /// Invalid configuration
    Configuration,
    /// Downstream handler failure
    Handler,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::AuthenticationMissing => write!(f, "authentication_missing"),
            ErrorKind::AccessDenied => write!(f, "access_denied"),
            ErrorKind::PolicyEvaluation => write!(f, "policy_evaluation"),
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::Handler => write!(f, "handler"),
        }
    }
}
