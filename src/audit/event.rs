use std::fmt;

use serde::Serialize;

use crate::decision::AuthorizationDecision;
use crate::principal::DeferredPrincipal;
use crate::request::{DispatcherType, Request};

/// What the decision amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    /// Access granted
    Granted,
    /// Access denied by policy
    Denied,
    /// No policy applied
    Abstained,
}

impl AuditOutcome {
    /// Classifies a manager result.
    pub fn of(decision: Option<&AuthorizationDecision>) -> Self {
        match decision {
            Some(d) if d.is_granted() => AuditOutcome::Granted,
            Some(_) => AuditOutcome::Denied,
            None => AuditOutcome::Abstained,
        }
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Granted => write!(f, "granted"),
            AuditOutcome::Denied => write!(f, "denied"),
            AuditOutcome::Abstained => write!(f, "abstained"),
        }
    }
}

/// One authorization decision, as recorded for audit.
///
/// The principal name is present only if evaluation actually resolved a
/// principal; building the event never triggers a lookup.
///
/// # Example
///
/// ```
/// use http::Method;
/// use request_authz::audit::{AuditOutcome, AuthorizationEvent};
/// use request_authz::{AuthorizationDecision, DeferredPrincipal, Request};
///
/// let request = Request::new(Method::GET, "/admin").with_request_id("req-123");
/// let decision = AuthorizationDecision::denied().with_reason("denyAll");
///
/// let event = AuthorizationEvent::new(&request, &DeferredPrincipal::ready(None), Some(&decision));
/// assert_eq!(event.request_id(), "req-123");
/// assert_eq!(event.outcome(), AuditOutcome::Denied);
/// assert!(!event.is_granted());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationEvent {
    request_id: String,
    principal: Option<String>,
    method: String,
    path: String,
    dispatcher_type: DispatcherType,
    outcome: AuditOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl AuthorizationEvent {
    /// Describes `decision` for `request`.
    pub fn new(
        request: &Request,
        principal: &DeferredPrincipal<'_>,
        decision: Option<&AuthorizationDecision>,
    ) -> Self {
        Self {
            request_id: request.request_id().to_string(),
            principal: principal.peek().map(|p| p.name().to_string()),
            method: request.method().to_string(),
            path: request.path().to_string(),
            dispatcher_type: request.dispatcher_type(),
            outcome: AuditOutcome::of(decision),
            reason: decision.and_then(|d| d.reason()).map(str::to_string),
        }
    }

    /// Returns the request identifier.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the principal name, if one was resolved.
    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the dispatcher type.
    pub fn dispatcher_type(&self) -> DispatcherType {
        self.dispatcher_type
    }

    /// Returns the outcome.
    pub fn outcome(&self) -> AuditOutcome {
        self.outcome
    }

    /// True only for an explicit grant.
    pub fn is_granted(&self) -> bool {
        self.outcome == AuditOutcome::Granted
    }

    /// Returns the decision reason, if any.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

impl fmt::Display for AuthorizationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AuthorizationEvent[outcome={}, request_id={}, principal={}, {} {} ({})",
            self.outcome,
            self.request_id,
            self.principal.as_deref().unwrap_or("<none>"),
            self.method,
            self.path,
            self.dispatcher_type,
        )?;
        if let Some(reason) = &self.reason {
            write!(f, ", reason={}", reason)?;
        }
        write!(f, "]")
    }
}
