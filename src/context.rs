use std::sync::Arc;

use crate::error::Error;
use crate::principal::Principal;

/// Holder for at most one [`Principal`] during a request.
///
/// A context starts empty and is populated once per request, either from a
/// previously saved context (see
/// [`SecurityContextRepository`](crate::SecurityContextRepository)) or
/// from an explicit login. Cloning is cheap: the principal is shared.
///
/// An empty context is not the same as an authenticated one:
/// [`require_principal`](Self::require_principal) fails on it.
///
/// # Examples
///
/// ```
/// use request_authz::{ErrorKind, Principal, SecurityContext};
///
/// let empty = SecurityContext::empty();
/// assert_eq!(
///     empty.require_principal().unwrap_err().kind(),
///     ErrorKind::AuthenticationMissing
/// );
///
/// let ctx = SecurityContext::with_principal(Principal::new("user").with_role("USER"));
/// assert_eq!(ctx.require_principal().unwrap().name(), "user");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityContext {
    principal: Option<Arc<Principal>>,
}

impl SecurityContext {
    /// Creates a context with no principal.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a context holding `principal`.
    pub fn with_principal(principal: Principal) -> Self {
        Self {
            principal: Some(Arc::new(principal)),
        }
    }

    /// Creates a context from an already shared principal.
    pub fn from_shared(principal: Arc<Principal>) -> Self {
        Self {
            principal: Some(principal),
        }
    }

    /// Returns the principal, if any.
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_deref()
    }

    /// Returns the shared principal handle, if any.
    pub fn shared_principal(&self) -> Option<Arc<Principal>> {
        self.principal.clone()
    }

    /// Returns the principal or fails because none was ever set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthenticationMissing`] for an empty context.
    pub fn require_principal(&self) -> Result<&Principal, Error> {
        self.principal().ok_or_else(Error::credentials_not_found)
    }

    /// True when no principal is held.
    pub fn is_empty(&self) -> bool {
        self.principal.is_none()
    }
}
