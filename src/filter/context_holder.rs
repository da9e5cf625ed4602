use std::sync::Arc;

use crate::error::Error;
use crate::holder::SecurityContextHolder;
use crate::logging::RequestLog;
use crate::repository::{RequestAttributeSecurityContextRepository, SecurityContextRepository};
use crate::request::{Attribute, Request, Response};

use super::{Filter, Next};

const APPLIED_ATTRIBUTE: &str = "request_authz.SecurityContextHolderFilter.APPLIED";

/// Loads the saved context and binds it to [`SecurityContextHolder`] for
/// the rest of the chain.
///
/// The binding is released when the chain returns, fails or panics, so a
/// pooled worker never keeps the identity. A dispatch nested inside one
/// that already bound the context keeps the outer binding.
pub struct SecurityContextHolderFilter {
    repository: Arc<dyn SecurityContextRepository>,
}

impl SecurityContextHolderFilter {
    /// Loads contexts from `repository`.
    pub fn new(repository: impl SecurityContextRepository + 'static) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }

    /// Loads contexts from a shared repository.
    pub fn from_shared(repository: Arc<dyn SecurityContextRepository>) -> Self {
        Self { repository }
    }
}

impl Default for SecurityContextHolderFilter {
    fn default() -> Self {
        Self::new(RequestAttributeSecurityContextRepository::new())
    }
}

impl Filter for SecurityContextHolderFilter {
    fn name(&self) -> &str {
        "security_context_holder"
    }

    fn do_filter(
        &self,
        request: &mut Request,
        response: &mut Response,
        next: Next<'_>,
    ) -> Result<(), Error> {
        if request.has_attribute(APPLIED_ATTRIBUTE) {
            return next.proceed(request, response);
        }

        let context = self.repository.load_context(request);
        RequestLog::new(request, self.name()).trace(format_args!(
            "loaded {} security context",
            if context.is_empty() { "empty" } else { "saved" }
        ));

        request.set_attribute(APPLIED_ATTRIBUTE, Attribute::Flag);
        let result = {
            let _guard = SecurityContextHolder::scope(context);
            next.proceed(request, response)
        };
        request.remove_attribute(APPLIED_ATTRIBUTE);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SecurityContext;
    use crate::principal::Principal;
    use http::Method;

    fn observed_name(filter: &SecurityContextHolderFilter, request: &mut Request) -> Option<String> {
        let handler = |_: &mut Request, res: &mut Response| -> Result<(), Error> {
            let name = SecurityContextHolder::get_context()
                .principal()
                .map(|p| p.name().to_string())
                .unwrap_or_default();
            res.write_body(name);
            Ok(())
        };
        let mut response = Response::new();
        filter
            .do_filter(request, &mut response, Next::handler(&handler))
            .unwrap();
        Some(response.body().to_string()).filter(|name| !name.is_empty())
    }

    #[test]
    fn saved_context_is_bound_for_the_chain_then_released() {
        let repository = RequestAttributeSecurityContextRepository::new();
        let mut req = Request::new(Method::GET, "/");
        repository.save_context(
            SecurityContext::with_principal(Principal::new("saved")),
            &mut req,
        );

        let filter = SecurityContextHolderFilter::new(repository);
        assert_eq!(observed_name(&filter, &mut req).as_deref(), Some("saved"));
        assert!(!SecurityContextHolder::is_attached());
    }

    #[test]
    fn fresh_request_sees_an_empty_context() {
        let filter = SecurityContextHolderFilter::default();
        assert_eq!(observed_name(&filter, &mut Request::new(Method::GET, "/")), None);
        assert!(!SecurityContextHolder::is_attached());
    }

    #[test]
    fn binding_is_released_when_the_chain_fails() {
        let filter = SecurityContextHolderFilter::default();
        let failing = |_: &mut Request, _: &mut Response| -> Result<(), Error> {
            assert!(SecurityContextHolder::is_attached());
            Err(Error::Handler("boom".to_string()))
        };
        let mut req = Request::new(Method::GET, "/");
        let result = filter.do_filter(&mut req, &mut Response::new(), Next::handler(&failing));

        assert!(result.is_err());
        assert!(!SecurityContextHolder::is_attached());
        assert!(!req.has_attribute(APPLIED_ATTRIBUTE));
    }
}
