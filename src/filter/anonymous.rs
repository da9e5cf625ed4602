use std::sync::Arc;

use crate::context::SecurityContext;
use crate::error::Error;
use crate::holder::SecurityContextHolder;
use crate::logging::RequestLog;
use crate::principal::Principal;
use crate::request::{Request, Response};

use super::{Filter, Next};

/// Binds an anonymous principal when the holder has none.
///
/// Downstream policies then see "anonymous" instead of "unauthenticated":
/// `isAuthenticated()` denies (403, or a 401 challenge through
/// [`ExceptionTranslationFilter`](super::ExceptionTranslationFilter))
/// rather than failing with a missing principal.
pub struct AnonymousAuthenticationFilter {
    principal: Arc<Principal>,
}

impl AnonymousAuthenticationFilter {
    /// Uses [`Principal::anonymous`].
    pub fn new() -> Self {
        Self::with_principal(Principal::anonymous())
    }

    /// Uses a custom anonymous principal.
    pub fn with_principal(principal: Principal) -> Self {
        Self {
            principal: Arc::new(principal),
        }
    }
}

impl Default for AnonymousAuthenticationFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for AnonymousAuthenticationFilter {
    fn name(&self) -> &str {
        "anonymous_authentication"
    }

    fn do_filter(
        &self,
        request: &mut Request,
        response: &mut Response,
        next: Next<'_>,
    ) -> Result<(), Error> {
        if SecurityContextHolder::current_principal().is_some() {
            return next.proceed(request, response);
        }

        RequestLog::new(request, self.name()).trace(format_args!(
            "binding anonymous principal '{}'",
            self.principal.name()
        ));
        let _guard = SecurityContextHolder::scope(SecurityContext::from_shared(Arc::clone(
            &self.principal,
        )));
        next.proceed(request, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn run_and_observe() -> (bool, String) {
        let handler = |_: &mut Request, res: &mut Response| -> Result<(), Error> {
            let ctx = SecurityContextHolder::get_context();
            let principal = ctx.require_principal()?;
            res.write_body(format!("{}:{}", principal.name(), principal.is_anonymous()));
            Ok(())
        };
        let mut response = Response::new();
        AnonymousAuthenticationFilter::new()
            .do_filter(
                &mut Request::new(Method::GET, "/"),
                &mut response,
                Next::handler(&handler),
            )
            .unwrap();
        (SecurityContextHolder::is_attached(), response.body().to_string())
    }

    #[test]
    fn binds_anonymous_when_empty_and_releases_it() {
        SecurityContextHolder::clear_context();
        let (attached_after, body) = run_and_observe();
        assert_eq!(body, "anonymousUser:true");
        assert!(!attached_after);
    }

    #[test]
    fn keeps_an_existing_principal() {
        let _guard =
            SecurityContextHolder::scope(SecurityContext::with_principal(Principal::new("alice")));
        let (_, body) = run_and_observe();
        assert_eq!(body, "alice:false");
    }
}
