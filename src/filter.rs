//! The request pipeline: an ordered list of filters ending in a handler.
//!
//! ```text
//! SecurityContextHolderFilter   load context, bind it to the holder
//!   AnonymousAuthenticationFilter   fill in the anonymous principal
//!     ExceptionTranslationFilter    401 / 403 responses
//!       AuthorizationFilter         grant, deny, or fail
//!         Handler                   application code
//! ```
//!
//! Each stage receives the request, the response and a [`Next`] it may
//! consume to continue. Not calling it stops the dispatch.

mod anonymous;
mod authorization;
mod chain;
mod context_holder;
mod exception_translation;

pub use anonymous::AnonymousAuthenticationFilter;
pub use authorization::{
    AbsentDecision, AuthorizationFilter, HolderPrincipalLookup, PrincipalLookup,
    EVALUATION_STATE_ATTRIBUTE, FILTER_APPLIED_ATTRIBUTE,
};
pub use chain::{Filter, FilterChain, FilterChainBuilder, Handler, Next};
pub use context_holder::SecurityContextHolderFilter;
pub use exception_translation::{
    AccessDeniedHandler, AuthenticationEntryPoint, ErrorBody, ExceptionTranslationFilter,
    JsonAccessDeniedHandler, JsonAuthenticationEntryPoint,
};
