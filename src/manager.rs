//! Authorization managers: pluggable, read-only policy evaluators.
//!
//! A manager answers one question per request: given a deferred principal
//! and the request, is access granted, denied, or does no policy apply?
//!
//! - [`SingleResultAuthorizationManager`]: fixed answers (`permitAll`, `denyAll`)
//! - [`AuthenticatedAuthorizationManager`] / [`AnonymousAuthorizationManager`]
//! - [`AuthorityAuthorizationManager`]: role and authority checks
//! - [`AllAuthorizationManager`] / [`AnyAuthorizationManager`]: combinators
//! - [`RequestMatcherDelegatingAuthorizationManager`]: first matching rule decides
//! - [`ExpressionAuthorizationManager`]: the above, written as an expression
//!
//! Closures with the right signature are managers too.

mod authenticated;
mod authority;
mod composite;
mod delegating;
mod expression;

use std::sync::Arc;

use crate::decision::AuthorizationDecision;
use crate::error::Error;
use crate::principal::DeferredPrincipal;
use crate::request::Request;

pub use authenticated::{AnonymousAuthorizationManager, AuthenticatedAuthorizationManager};
pub use authority::AuthorityAuthorizationManager;
pub use composite::{AllAuthorizationManager, AnyAuthorizationManager};
pub use delegating::{
    RequestMatcherDelegatingAuthorizationManager, RequestMatcherDelegatingBuilder,
};
pub use expression::ExpressionAuthorizationManager;

/// A manager shared between rules, filters and threads.
pub type SharedAuthorizationManager = Arc<dyn AuthorizationManager>;

/// Evaluates a policy for one request.
///
/// Implementations must not mutate any state: evaluation is a predicate.
/// They may block (for example on a remote policy service); callers treat
/// `check` as an opaque synchronous call.
pub trait AuthorizationManager: Send + Sync {
    /// Returns the decision, or `None` when no policy applies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthenticationMissing`] when the policy needs a
    /// principal and none is present, and [`Error::PolicyEvaluation`] when
    /// the policy itself fails.
    fn check(
        &self,
        principal: &DeferredPrincipal<'_>,
        request: &Request,
    ) -> Result<Option<AuthorizationDecision>, Error>;

    /// Like [`check`](Self::check), but turns an explicit denial into
    /// [`Error::AccessDenied`]. Abstaining passes.
    fn verify(&self, principal: &DeferredPrincipal<'_>, request: &Request) -> Result<(), Error> {
        match self.check(principal, request)? {
            Some(decision) if !decision.is_granted() => Err(Error::access_denied()),
            _ => Ok(()),
        }
    }
}

impl<F> AuthorizationManager for F
where
    F: Fn(&DeferredPrincipal<'_>, &Request) -> Result<Option<AuthorizationDecision>, Error>
        + Send
        + Sync,
{
    fn check(
        &self,
        principal: &DeferredPrincipal<'_>,
        request: &Request,
    ) -> Result<Option<AuthorizationDecision>, Error> {
        self(principal, request)
    }
}

/// A manager that always returns the same decision and never looks at the
/// principal.
#[derive(Debug, Clone)]
pub struct SingleResultAuthorizationManager {
    decision: Option<AuthorizationDecision>,
}

impl SingleResultAuthorizationManager {
    /// Grants every request.
    pub fn permit_all() -> Self {
        Self {
            decision: Some(AuthorizationDecision::granted().with_reason("permitAll")),
        }
    }

    /// Denies every request.
    pub fn deny_all() -> Self {
        Self {
            decision: Some(AuthorizationDecision::denied().with_reason("denyAll")),
        }
    }

    /// Abstains on every request.
    pub fn abstain() -> Self {
        Self { decision: None }
    }
}

impl AuthorizationManager for SingleResultAuthorizationManager {
    fn check(
        &self,
        _principal: &DeferredPrincipal<'_>,
        _request: &Request,
    ) -> Result<Option<AuthorizationDecision>, Error> {
        Ok(self.decision.clone())
    }
}

/// Shorthand for [`SingleResultAuthorizationManager::permit_all`].
pub fn permit_all() -> SingleResultAuthorizationManager {
    SingleResultAuthorizationManager::permit_all()
}

/// Shorthand for [`SingleResultAuthorizationManager::deny_all`].
pub fn deny_all() -> SingleResultAuthorizationManager {
    SingleResultAuthorizationManager::deny_all()
}

/// Shorthand for [`AuthenticatedAuthorizationManager::new`].
pub fn authenticated() -> AuthenticatedAuthorizationManager {
    AuthenticatedAuthorizationManager::new()
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn permit_and_deny_all_never_resolve_the_principal() {
        let principal = DeferredPrincipal::new(|| panic!("lookup must not run"));
        let req = request();

        let granted = permit_all().check(&principal, &req).unwrap().unwrap();
        let denied = deny_all().check(&principal, &req).unwrap().unwrap();

        assert!(granted.is_granted());
        assert!(!denied.is_granted());
        assert!(!principal.is_resolved());
    }

    #[test]
    fn verify_maps_denial_to_access_denied() {
        let req = request();
        let err = deny_all().verify(&user(), &req).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);

        assert!(permit_all().verify(&user(), &req).is_ok());
        assert!(SingleResultAuthorizationManager::abstain()
            .verify(&user(), &req)
            .is_ok());
    }

    #[test]
    fn closures_are_managers() {
        let only_get = |_: &DeferredPrincipal<'_>,
                        req: &Request|
         -> Result<Option<AuthorizationDecision>, Error> {
            Ok(Some(AuthorizationDecision::new(
                req.method() == http::Method::GET,
            )))
        };
        let decision = only_get.check(&nobody(), &request()).unwrap().unwrap();
        assert!(decision.is_granted());
    }
}
