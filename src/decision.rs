use std::fmt;

/// Result of evaluating a policy.
///
/// Managers return `Option<AuthorizationDecision>`: `None` means no policy
/// applied (abstain), which is different from an explicit denial.
///
/// # Examples
///
/// ```
/// use request_authz::AuthorizationDecision;
///
/// let denied = AuthorizationDecision::denied().with_reason("denyAll");
/// assert!(!denied.is_granted());
/// assert_eq!(denied.reason(), Some("denyAll"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationDecision {
    granted: bool,
    reason: Option<String>,
}

impl AuthorizationDecision {
    /// Creates a decision.
    pub fn new(granted: bool) -> Self {
        Self {
            granted,
            reason: None,
        }
    }

    /// A granting decision.
    pub fn granted() -> Self {
        Self::new(true)
    }

    /// A denying decision.
    pub fn denied() -> Self {
        Self::new(false)
    }

    /// Attaches a diagnostic reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Whether access was granted.
    pub fn is_granted(&self) -> bool {
        self.granted
    }

    /// The diagnostic reason, if any.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

impl From<bool> for AuthorizationDecision {
    fn from(granted: bool) -> Self {
        Self::new(granted)
    }
}

impl fmt::Display for AuthorizationDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.granted { "granted" } else { "denied" };
        match &self.reason {
            Some(reason) => write!(f, "{verdict} ({reason})"),
            None => write!(f, "{verdict}"),
        }
    }
}
