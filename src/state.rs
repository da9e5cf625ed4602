//! Per-dispatch evaluation state of the authorization filter.
//!
//! ```text
//! Unevaluated --> Evaluating --> Granted
//!                            --> Denied
//!                            --> AuthenticationMissing
//!                            --> Failed
//! ```
//!
//! `Granted` hands the request to downstream processing. The other
//! terminal states short-circuit it.

use std::fmt;

use crate::error::Error;

/// Where a single dispatch is in the authorization state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvaluationState {
    /// No evaluation has started
    Unevaluated,
    /// The manager is being consulted
    Evaluating,
    /// Decision granted, or absent and permitted
    Granted,
    /// Decision denied, or absent and denied by default
    Denied,
    /// A policy needed a principal and none was present
    AuthenticationMissing,
    /// The manager failed (fail-closed)
    Failed,
}

impl EvaluationState {
    /// True for states that end the evaluation.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EvaluationState::Granted
                | EvaluationState::Denied
                | EvaluationState::AuthenticationMissing
                | EvaluationState::Failed
        )
    }

    /// True if downstream processing may run.
    pub fn permits_downstream(self) -> bool {
        self == EvaluationState::Granted
    }

    /// Moves to `next`, rejecting transitions the state machine does not allow.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PolicyEvaluation`] for an illegal transition.
    pub fn transition(self, next: EvaluationState) -> Result<EvaluationState, Error> {
        let legal = match (self, next) {
            (EvaluationState::Unevaluated, EvaluationState::Evaluating) => true,
            (EvaluationState::Evaluating, n) => n.is_terminal(),
            _ => false,
        };
        if legal {
            Ok(next)
        } else {
            Err(Error::PolicyEvaluation(format!(
                "illegal evaluation transition {self} -> {next}"
            )))
        }
    }

    /// The terminal state an evaluation error leads to.
    pub(crate) fn from_error(err: &Error) -> EvaluationState {
        match err {
            Error::AuthenticationMissing(_) => EvaluationState::AuthenticationMissing,
            Error::AccessDenied(_) => EvaluationState::Denied,
            _ => EvaluationState::Failed,
        }
    }
}

impl fmt::Display for EvaluationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationState::Unevaluated => write!(f, "unevaluated"),
            EvaluationState::Evaluating => write!(f, "evaluating"),
            EvaluationState::Granted => write!(f, "granted"),
            EvaluationState::Denied => write!(f, "denied"),
            EvaluationState::AuthenticationMissing => write!(f, "authentication_missing"),
            EvaluationState::Failed => write!(f, "failed"),
        }
    }
}
