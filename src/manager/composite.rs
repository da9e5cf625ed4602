use crate::decision::AuthorizationDecision;
use crate::error::Error;
use crate::principal::DeferredPrincipal;
use crate::request::Request;

use super::{AuthorizationManager, SharedAuthorizationManager};

/// Grants only if no delegate denies.
///
/// Delegates are consulted in order. The first explicit denial stops
/// evaluation; abstentions are ignored. If every delegate abstains the
/// result is `None`.
pub struct AllAuthorizationManager {
    delegates: Vec<SharedAuthorizationManager>,
}

impl AllAuthorizationManager {
    /// Combines `delegates`.
    pub fn new(delegates: Vec<SharedAuthorizationManager>) -> Self {
        Self { delegates }
    }
}

impl AuthorizationManager for AllAuthorizationManager {
    fn check(
        &self,
        principal: &DeferredPrincipal<'_>,
        request: &Request,
    ) -> Result<Option<AuthorizationDecision>, Error> {
        let mut granted = None;
        for delegate in &self.delegates {
            match delegate.check(principal, request)? {
                Some(decision) if !decision.is_granted() => return Ok(Some(decision)),
                Some(decision) => granted = Some(decision),
                None => {}
            }
        }
        Ok(granted)
    }
}

/// Grants if any delegate grants.
///
/// The first grant stops evaluation. Otherwise the result is the last
/// denial seen, or `None` if every delegate abstained.
pub struct AnyAuthorizationManager {
    delegates: Vec<SharedAuthorizationManager>,
}

impl AnyAuthorizationManager {
    /// Combines `delegates`.
    pub fn new(delegates: Vec<SharedAuthorizationManager>) -> Self {
        Self { delegates }
    }
}

impl AuthorizationManager for AnyAuthorizationManager {
    fn check(
        &self,
        principal: &DeferredPrincipal<'_>,
        request: &Request,
    ) -> Result<Option<AuthorizationDecision>, Error> {
        let mut denied = None;
        for delegate in &self.delegates {
            match delegate.check(principal, request)? {
                Some(decision) if decision.is_granted() => return Ok(Some(decision)),
                Some(decision) => denied = Some(decision),
                None => {}
            }
        }
        Ok(denied)
    }
}
