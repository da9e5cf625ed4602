use std::cell::OnceCell;
use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::secret::Secret;

/// Prefix that distinguishes role authorities from plain permissions.
pub const ROLE_PREFIX: &str = "ROLE_";

/// Name given to the principal attached to unauthenticated requests.
pub const ANONYMOUS_NAME: &str = "anonymousUser";

/// Authority carried by the anonymous principal.
pub const ANONYMOUS_AUTHORITY: &str = "ROLE_ANONYMOUS";

/// A role or permission string granted to a principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GrantedAuthority(String);

impl GrantedAuthority {
    /// Creates an authority from its string form.
    pub fn new(authority: impl Into<String>) -> Self {
        Self(authority.into())
    }

    /// Returns the authority string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GrantedAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GrantedAuthority {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The identity making a request.
///
/// A principal is immutable once built and is shared through the security
/// context behind an [`Arc`]. Credentials are optional and always redacted
/// in formatted output.
///
/// # Examples
///
/// ```
/// use request_authz::Principal;
///
/// let user = Principal::new("user").with_role("USER");
/// assert!(user.has_role("USER"));
/// assert!(user.has_authority("ROLE_USER"));
/// assert!(!user.is_anonymous());
/// ```
#[derive(Debug)]
pub struct Principal {
    name: String,
    authorities: Vec<GrantedAuthority>,
    anonymous: bool,
    credentials: Option<Secret<String>>,
}

impl Principal {
    /// Creates an authenticated principal with no authorities.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            authorities: Vec::new(),
            anonymous: false,
            credentials: None,
        }
    }

    /// Creates the anonymous principal used for unauthenticated requests.
    pub fn anonymous() -> Self {
        Self {
            name: ANONYMOUS_NAME.to_string(),
            authorities: vec![GrantedAuthority::new(ANONYMOUS_AUTHORITY)],
            anonymous: true,
            credentials: None,
        }
    }

    /// Adds an authority, ignoring duplicates.
    pub fn with_authority(mut self, authority: impl Into<GrantedAuthority>) -> Self {
        let authority = authority.into();
        if !self.authorities.contains(&authority) {
            self.authorities.push(authority);
        }
        self
    }

    /// Adds a role; `"USER"` becomes the authority `ROLE_USER`.
    pub fn with_role(self, role: &str) -> Self {
        self.with_authority(GrantedAuthority::new(format!("{ROLE_PREFIX}{role}")))
    }

    /// Attaches the credentials this principal authenticated with.
    pub fn with_credentials(mut self, credentials: impl Into<String>) -> Self {
        self.credentials = Some(Secret::new(credentials.into()));
        self
    }

    /// Drops any credentials held by this principal.
    pub fn erase_credentials(mut self) -> Self {
        self.credentials = None;
        self
    }

    /// Returns the principal name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the granted authorities in insertion order.
    pub fn authorities(&self) -> &[GrantedAuthority] {
        &self.authorities
    }

    /// Returns the credentials, if they have not been erased.
    pub fn credentials(&self) -> Option<&Secret<String>> {
        self.credentials.as_ref()
    }

    /// True for the principal created by [`Principal::anonymous`].
    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    /// True if the exact authority string was granted.
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a.as_str() == authority)
    }

    /// True if `ROLE_<role>` was granted.
    pub fn has_role(&self, role: &str) -> bool {
        self.authorities.iter().any(|a| {
            a.as_str()
                .strip_prefix(ROLE_PREFIX)
                .is_some_and(|r| r == role)
        })
    }
}

// Credentials are not part of identity.
impl PartialEq for Principal {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.anonymous == other.anonymous
            && self.authorities == other.authorities
    }
}

impl Eq for Principal {}

/// Deferred lookup of the current principal.
///
/// The lookup runs at most once, and only when a policy asks for the
/// principal. Policies that never ask (for example `permitAll`) never pay
/// for it.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use request_authz::{DeferredPrincipal, ErrorKind, Principal};
///
/// let present = DeferredPrincipal::new(|| Some(Arc::new(Principal::new("user"))));
/// assert!(!present.is_resolved());
/// assert_eq!(present.get().unwrap().name(), "user");
/// assert!(present.is_resolved());
///
/// let missing = DeferredPrincipal::new(|| None);
/// assert_eq!(missing.get().unwrap_err().kind(), ErrorKind::AuthenticationMissing);
/// ```
pub struct DeferredPrincipal<'a> {
    lookup: Box<dyn Fn() -> Option<Arc<Principal>> + 'a>,
    resolved: OnceCell<Option<Arc<Principal>>>,
}

impl<'a> DeferredPrincipal<'a> {
    /// Wraps a lookup closure.
    pub fn new(lookup: impl Fn() -> Option<Arc<Principal>> + 'a) -> Self {
        Self {
            lookup: Box::new(lookup),
            resolved: OnceCell::new(),
        }
    }

    /// A supplier whose value is already known (explicit context passing).
    pub fn ready(principal: Option<Arc<Principal>>) -> Self {
        Self {
            lookup: Box::new(|| None),
            resolved: OnceCell::from(principal),
        }
    }

    /// Resolves the principal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthenticationMissing`] when the lookup yields nothing.
    pub fn get(&self) -> Result<&Principal, Error> {
        self.resolve()
            .as_deref()
            .ok_or_else(Error::credentials_not_found)
    }

    /// Resolves the principal as a shared handle.
    pub fn get_shared(&self) -> Option<Arc<Principal>> {
        self.resolve().clone()
    }

    /// The principal if the lookup already ran and found one. Never runs the lookup.
    pub fn peek(&self) -> Option<&Principal> {
        self.resolved.get().and_then(|p| p.as_deref())
    }

    /// Whether the lookup has already run.
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    fn resolve(&self) -> &Option<Arc<Principal>> {
        self.resolved.get_or_init(|| (self.lookup)())
    }
}

impl fmt::Debug for DeferredPrincipal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredPrincipal")
            .field("resolved", &self.resolved.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::cell::Cell;

    #[test]
    fn roles_are_prefixed_authorities() {
        let p = Principal::new("user").with_role("USER").with_authority("posts:write");

        assert!(p.has_role("USER"));
        assert!(p.has_authority("ROLE_USER"));
        assert!(p.has_authority("posts:write"));
        assert!(!p.has_role("posts:write"));
        assert!(!p.has_role("ADMIN"));
    }

    #[test]
    fn duplicate_authorities_are_ignored() {
        let p = Principal::new("user").with_role("USER").with_role("USER");
        assert_eq!(p.authorities().len(), 1);
    }

    #[test]
    fn anonymous_principal_is_flagged() {
        let anon = Principal::anonymous();
        assert!(anon.is_anonymous());
        assert_eq!(anon.name(), ANONYMOUS_NAME);
        assert!(anon.has_role("ANONYMOUS"));
    }

    #[test]
    fn credentials_are_redacted_and_erasable() {
        let p = Principal::new("alice").with_credentials("s3cret");
        let debug = format!("{:?}", p);
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("[REDACTED]"));

        let p = p.erase_credentials();
        assert!(p.credentials().is_none());
    }

    #[test]
    fn equality_ignores_credentials() {
        let a = Principal::new("alice").with_role("USER").with_credentials("x");
        let b = Principal::new("alice").with_role("USER");
        assert_eq!(a, b);
    }

    #[test]
    fn deferred_lookup_runs_once() {
        let calls = Cell::new(0);
        let deferred = DeferredPrincipal::new(|| {
            calls.set(calls.get() + 1);
            Some(Arc::new(Principal::new("user")))
        });

        assert_eq!(calls.get(), 0);
        assert!(deferred.get().is_ok());
        assert!(deferred.get().is_ok());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn deferred_missing_principal_is_authentication_missing() {
        let deferred = DeferredPrincipal::new(|| None);
        let err = deferred.get().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationMissing);
        assert!(deferred.is_resolved());
    }

    #[test]
    fn ready_supplier_is_already_resolved() {
        let deferred = DeferredPrincipal::ready(Some(Arc::new(Principal::new("bob"))));
        assert!(deferred.is_resolved());
        assert_eq!(deferred.get().unwrap().name(), "bob");
    }
}
