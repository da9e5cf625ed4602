//! Per-request authorization decisions and security-context propagation.
//!
//! The crate is the authorization core of a request pipeline:
//!
//! - [`SecurityContextHolder`]: the principal of the current request,
//!   bound to the executing thread by a scope guard and carried across
//!   workers with a [`ContextSnapshot`].
//! - [`AuthorizationManager`]: pluggable, read-only policy evaluators
//!   (roles, expressions, first-match rules, closures) returning granted,
//!   denied, or no decision.
//! - [`filter::AuthorizationFilter`]: the single per-request choke point
//!   that consults the manager, publishes an audit event and either
//!   continues the chain or fails with a typed [`Error`].
//!
//! A missing principal ([`Error::AuthenticationMissing`]) is always kept
//! apart from a denial ([`Error::AccessDenied`]), so the caller can answer
//! with a credentials challenge or a plain "forbidden".
//!
//! # Examples
//!
//! ```
//! use http::{Method, StatusCode};
//! use request_authz::filter::{
//!     AuthorizationFilter, ExceptionTranslationFilter, FilterChain, SecurityContextHolderFilter,
//! };
//! use request_authz::{
//!     AuthorizationConfig, Error, Principal, Request, RequestAttributeSecurityContextRepository,
//!     Response, SecurityContext, SecurityContextRepository,
//! };
//!
//! let config = AuthorizationConfig::from_json(r#"{
//!     "rules": [
//!         { "pattern": "/admin/**", "access": "hasRole('ADMIN')" },
//!         { "pattern": "/**", "access": "isAuthenticated()" }
//!     ]
//! }"#).unwrap();
//!
//! let chain = FilterChain::builder()
//!     .filter(SecurityContextHolderFilter::default())
//!     .filter(ExceptionTranslationFilter::new())
//!     .filter(config.build_filter().unwrap())
//!     .handler(|_: &mut Request, res: &mut Response| -> Result<(), Error> {
//!         res.write_body("welcome");
//!         Ok(())
//!     });
//!
//! // A user session saved by an earlier login.
//! let mut request = Request::new(Method::GET, "/admin/users");
//! RequestAttributeSecurityContextRepository::new().save_context(
//!     SecurityContext::with_principal(Principal::new("user").with_role("USER")),
//!     &mut request,
//! );
//!
//! let mut response = Response::new();
//! chain.dispatch(&mut request, &mut response).unwrap();
//! assert_eq!(response.status(), StatusCode::FORBIDDEN);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
mod config;
mod context;
mod decision;
mod error;
pub mod filter;
mod holder;
mod logging;
pub mod manager;
pub mod matcher;
mod principal;
mod repository;
mod request;
mod secret;
mod state;

pub use config::{AuthorizationConfig, RuleConfig};
pub use context::SecurityContext;
pub use decision::AuthorizationDecision;
pub use error::{Error, ErrorKind};
pub use holder::{ContextGuard, ContextSnapshot, SecurityContextHolder};
pub use manager::{
    AuthorityAuthorizationManager, AuthorizationManager, ExpressionAuthorizationManager,
    RequestMatcherDelegatingAuthorizationManager, SharedAuthorizationManager,
};
pub use matcher::{PathPattern, PathPatternMatcher, RequestMatcher};
pub use principal::{
    DeferredPrincipal, GrantedAuthority, Principal, ANONYMOUS_AUTHORITY, ANONYMOUS_NAME,
    ROLE_PREFIX,
};
pub use repository::{
    RequestAttributeSecurityContextRepository, SecurityContextRepository,
    DEFAULT_CONTEXT_ATTRIBUTE,
};
pub use request::{Attribute, DispatcherType, Request, Response};
pub use secret::Secret;
pub use state::EvaluationState;
