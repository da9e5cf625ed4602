use std::fmt;
use std::sync::Arc;

use http::Method;

use crate::decision::AuthorizationDecision;
use crate::error::Error;
use crate::logging::RequestLog;
use crate::matcher::{AnyRequestMatcher, PathPatternMatcher, RequestMatcher};
use crate::principal::DeferredPrincipal;
use crate::request::Request;

use super::{AuthorizationManager, SharedAuthorizationManager};

struct Rule {
    description: String,
    matcher: Arc<dyn RequestMatcher>,
    manager: SharedAuthorizationManager,
}

/// Routes each request to the manager of the first rule that matches it.
///
/// Rules are consulted in registration order. The first matching rule that
/// returns a decision decides; a matching rule that abstains lets the
/// search continue. When nothing decides the result is `None`, which the
/// filter resolves with its absent-decision policy.
///
/// With [`stop_at_first_match`](RequestMatcherDelegatingBuilder::stop_at_first_match)
/// the first matching rule's answer is returned as is, abstention included,
/// and later rules are never consulted.
///
/// # Examples
///
/// ```
/// use http::Method;
/// use request_authz::manager::{self, AuthorityAuthorizationManager};
/// use request_authz::{AuthorizationManager, DeferredPrincipal, Request};
/// use request_authz::RequestMatcherDelegatingAuthorizationManager;
///
/// let rules = RequestMatcherDelegatingAuthorizationManager::builder()
///     .path("/public/**", manager::permit_all())
///     .unwrap()
///     .path("/admin/**", AuthorityAuthorizationManager::has_role("ADMIN").unwrap())
///     .unwrap()
///     .any_request(manager::authenticated());
///
/// let nobody = DeferredPrincipal::ready(None);
/// let public = Request::new(Method::GET, "/public/logo.png");
/// assert!(rules.check(&nobody, &public).unwrap().unwrap().is_granted());
/// ```
pub struct RequestMatcherDelegatingAuthorizationManager {
    rules: Vec<Rule>,
    stop_at_first_match: bool,
}

impl RequestMatcherDelegatingAuthorizationManager {
    /// Starts an empty rule list.
    pub fn builder() -> RequestMatcherDelegatingBuilder {
        RequestMatcherDelegatingBuilder {
            rules: Vec::new(),
            stop_at_first_match: false,
        }
    }

    /// Number of registered rules, including a fallback.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True if no rules are registered.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rule descriptions in evaluation order.
    pub fn descriptions(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.description.as_str())
    }
}

impl AuthorizationManager for RequestMatcherDelegatingAuthorizationManager {
    fn check(
        &self,
        principal: &DeferredPrincipal<'_>,
        request: &Request,
    ) -> Result<Option<AuthorizationDecision>, Error> {
        let log = RequestLog::new(request, "request_matcher_delegating");
        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.matcher.matches(request) {
                continue;
            }
            log.trace(format_args!(
                "rule {} ({}) matched",
                index + 1,
                rule.description
            ));
            let decision = rule.manager.check(principal, request)?;
            if decision.is_some() || self.stop_at_first_match {
                return Ok(decision);
            }
        }
        log.trace(format_args!("no rule decided"));
        Ok(None)
    }
}

impl fmt::Debug for RequestMatcherDelegatingAuthorizationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.descriptions()).finish()
    }
}

/// Builds a [`RequestMatcherDelegatingAuthorizationManager`].
pub struct RequestMatcherDelegatingBuilder {
    rules: Vec<Rule>,
    stop_at_first_match: bool,
}

impl RequestMatcherDelegatingBuilder {
    /// Returns the first matching rule's answer even when it abstains.
    pub fn stop_at_first_match(mut self) -> Self {
        self.stop_at_first_match = true;
        self
    }

    /// Adds a rule for an arbitrary matcher.
    pub fn add(
        self,
        matcher: impl RequestMatcher + 'static,
        manager: impl AuthorizationManager + 'static,
    ) -> Self {
        self.add_shared("custom matcher", Arc::new(matcher), Arc::new(manager))
    }

    /// Adds a rule from shared parts.
    pub fn add_shared(
        mut self,
        description: impl Into<String>,
        matcher: Arc<dyn RequestMatcher>,
        manager: SharedAuthorizationManager,
    ) -> Self {
        self.rules.push(Rule {
            description: description.into(),
            matcher,
            manager,
        });
        self
    }

    /// Adds a rule for a path pattern, any method.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an invalid pattern.
    pub fn path(
        self,
        pattern: &str,
        manager: impl AuthorizationManager + 'static,
    ) -> Result<Self, Error> {
        let matcher = PathPatternMatcher::new(pattern)?;
        Ok(self.add_shared(pattern, Arc::new(matcher), Arc::new(manager)))
    }

    /// Adds a rule for a path pattern and one method.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an invalid pattern.
    pub fn method_path(
        self,
        method: Method,
        pattern: &str,
        manager: impl AuthorizationManager + 'static,
    ) -> Result<Self, Error> {
        let description = format!("{method} {pattern}");
        let matcher = PathPatternMatcher::new(pattern)?.with_method(method);
        Ok(self.add_shared(description, Arc::new(matcher), Arc::new(manager)))
    }

    /// Adds a final rule matching every request and finishes.
    pub fn any_request(
        self,
        manager: impl AuthorizationManager + 'static,
    ) -> RequestMatcherDelegatingAuthorizationManager {
        self.add_shared("any request", Arc::new(AnyRequestMatcher), Arc::new(manager))
            .build()
    }

    /// Finishes without a fallback.
    pub fn build(self) -> RequestMatcherDelegatingAuthorizationManager {
        RequestMatcherDelegatingAuthorizationManager {
            rules: self.rules,
            stop_at_first_match: self.stop_at_first_match,
        }
    }
}
