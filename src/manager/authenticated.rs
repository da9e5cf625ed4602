use crate::decision::AuthorizationDecision;
use crate::error::Error;
use crate::principal::DeferredPrincipal;
use crate::request::Request;

use super::AuthorizationManager;

/// Grants access to any principal that is present and not anonymous.
///
/// A missing principal is not a denial: evaluation fails with
/// [`Error::AuthenticationMissing`] so the caller can challenge for
/// credentials instead of answering "forbidden".
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthenticatedAuthorizationManager;

impl AuthenticatedAuthorizationManager {
    /// Creates the manager.
    pub fn new() -> Self {
        Self
    }
}

impl AuthorizationManager for AuthenticatedAuthorizationManager {
    fn check(
        &self,
        principal: &DeferredPrincipal<'_>,
        _request: &Request,
    ) -> Result<Option<AuthorizationDecision>, Error> {
        let principal = principal.get()?;
        Ok(Some(
            AuthorizationDecision::new(!principal.is_anonymous()).with_reason("authenticated"),
        ))
    }
}

/// Grants access only to the anonymous principal.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousAuthorizationManager;

impl AnonymousAuthorizationManager {
    /// Creates the manager.
    pub fn new() -> Self {
        Self
    }
}

impl AuthorizationManager for AnonymousAuthorizationManager {
    fn check(
        &self,
        principal: &DeferredPrincipal<'_>,
        _request: &Request,
    ) -> Result<Option<AuthorizationDecision>, Error> {
        let principal = principal.get()?;
        Ok(Some(
            AuthorizationDecision::new(principal.is_anonymous()).with_reason("anonymous"),
        ))
    }
}
