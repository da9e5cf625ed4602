//! Audit events for authorization decisions.
//!
//! The authorization filter describes every decision as an
//! [`AuthorizationEvent`] and hands it to an [`AuthorizationEventPublisher`].
//! Publishing is best-effort: a failing or panicking publisher is logged
//! and never changes the decision.
//!
//! Events carry only metadata (request id, principal name, method, path),
//! never credentials or bodies.

mod event;
mod publisher;
mod trail;

pub use event::{AuditOutcome, AuthorizationEvent};
pub use publisher::{
    AuthorizationEventPublisher, NoopEventPublisher, PublishError, TracingEventPublisher,
    AUDIT_TARGET,
};
pub use trail::AuditTrail;
