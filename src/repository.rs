//! Where a security context lives between requests.

use crate::context::SecurityContext;
use crate::request::{Attribute, Request};

/// Default attribute key of [`RequestAttributeSecurityContextRepository`].
pub const DEFAULT_CONTEXT_ATTRIBUTE: &str = "request_authz.SECURITY_CONTEXT";

/// Loads and saves the security context of a request.
pub trait SecurityContextRepository: Send + Sync {
    /// The saved context, or an empty one when nothing was saved.
    fn load_context(&self, request: &Request) -> SecurityContext;

    /// Saves `context` for later dispatches of `request`.
    fn save_context(&self, context: SecurityContext, request: &mut Request);

    /// True if a context was saved for `request`.
    fn contains_context(&self, request: &Request) -> bool;
}

/// Stores the context as a request attribute.
///
/// The context therefore survives re-dispatches of the same request but is
/// never visible to any other request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestAttributeSecurityContextRepository {
    attribute: String,
}

impl RequestAttributeSecurityContextRepository {
    /// Uses [`DEFAULT_CONTEXT_ATTRIBUTE`].
    pub fn new() -> Self {
        Self::with_attribute(DEFAULT_CONTEXT_ATTRIBUTE)
    }

    /// Uses a custom attribute key.
    pub fn with_attribute(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
        }
    }

    /// The attribute key.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }
}

impl Default for RequestAttributeSecurityContextRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityContextRepository for RequestAttributeSecurityContextRepository {
    fn load_context(&self, request: &Request) -> SecurityContext {
        match request.attribute(&self.attribute) {
            Some(Attribute::SecurityContext(ctx)) => ctx.clone(),
            _ => SecurityContext::empty(),
        }
    }

    fn save_context(&self, context: SecurityContext, request: &mut Request) {
        request.set_attribute(self.attribute.clone(), Attribute::SecurityContext(context));
    }

    fn contains_context(&self, request: &Request) -> bool {
        matches!(
            request.attribute(&self.attribute),
            Some(Attribute::SecurityContext(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::Principal;
    use http::Method;

    fn request() -> Request {
        Request::new(Method::GET, "/")
    }

    #[test]
    fn save_then_load_returns_the_context() {
        let repo = RequestAttributeSecurityContextRepository::new();
        let mut req = request();
        let ctx = SecurityContext::with_principal(Principal::new("user").with_role("USER"));

        repo.save_context(ctx.clone(), &mut req);

        assert_eq!(repo.load_context(&req), ctx);
    }

    #[test]
    fn load_on_a_fresh_request_is_empty() {
        let repo = RequestAttributeSecurityContextRepository::new();
        let mut saved = request();
        repo.save_context(
            SecurityContext::with_principal(Principal::new("user")),
            &mut saved,
        );

        let other = request();
        assert!(repo.load_context(&other).is_empty());
    }

    #[test]
    fn contains_context_tracks_saves() {
        let repo = RequestAttributeSecurityContextRepository::new();
        let mut req = request();
        assert!(!repo.contains_context(&req));

        repo.save_context(SecurityContext::empty(), &mut req);
        assert!(repo.contains_context(&req));
    }

    #[test]
    fn custom_attribute_is_used() {
        let repo = RequestAttributeSecurityContextRepository::with_attribute("ctx");
        let mut req = request();
        repo.save_context(SecurityContext::empty(), &mut req);

        assert!(req.has_attribute("ctx"));
        assert!(!req.has_attribute(DEFAULT_CONTEXT_ATTRIBUTE));
        assert!(!RequestAttributeSecurityContextRepository::new().contains_context(&req));
    }

    #[test]
    fn unrelated_attribute_values_are_ignored() {
        let repo = RequestAttributeSecurityContextRepository::new();
        let mut req = request();
        req.set_attribute(DEFAULT_CONTEXT_ATTRIBUTE, Attribute::Flag);

        assert!(!repo.contains_context(&req));
        assert!(repo.load_context(&req).is_empty());
    }
}
