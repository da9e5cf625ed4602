use super::{AuditOutcome, AuthorizationEvent};

/// Tracing target of audit events.
pub const AUDIT_TARGET: &str = "authz_audit";

/// Error returned by a failing event sink.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to publish authorization event: {0}")]
pub struct PublishError(pub String);

/// Receives authorization events.
///
/// Called synchronously on the request path; slow sinks delay the
/// request. Errors are logged by the caller and otherwise ignored.
pub trait AuthorizationEventPublisher: Send + Sync {
    /// Publishes one event.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if the sink could not accept the event.
    fn publish(&self, event: &AuthorizationEvent) -> Result<(), PublishError>;
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventPublisher;

impl AuthorizationEventPublisher for NoopEventPublisher {
    fn publish(&self, _event: &AuthorizationEvent) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Emits each event as a structured `tracing` event on [`AUDIT_TARGET`].
///
/// Denials and abstentions are logged at `info`. Grants are frequent and
/// only logged (at `debug`) when enabled with
/// [`with_granted_events`](Self::with_granted_events).
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventPublisher {
    granted_events: bool,
}

impl TracingEventPublisher {
    /// Publisher that skips granted events.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also emit granted events.
    pub fn with_granted_events(mut self, enabled: bool) -> Self {
        self.granted_events = enabled;
        self
    }
}

impl AuthorizationEventPublisher for TracingEventPublisher {
    fn publish(&self, event: &AuthorizationEvent) -> Result<(), PublishError> {
        match event.outcome() {
            AuditOutcome::Granted if !self.granted_events => {}
            AuditOutcome::Granted => tracing::debug!(
                target: AUDIT_TARGET,
                request_id = %event.request_id(),
                principal = event.principal().unwrap_or("<none>"),
                method = %event.method(),
                path = %event.path(),
                dispatcher_type = %event.dispatcher_type(),
                outcome = %event.outcome(),
                reason = event.reason().unwrap_or(""),
                "authorization granted"
            ),
            _ => tracing::info!(
                target: AUDIT_TARGET,
                request_id = %event.request_id(),
                principal = event.principal().unwrap_or("<none>"),
                method = %event.method(),
                path = %event.path(),
                dispatcher_type = %event.dispatcher_type(),
                outcome = %event.outcome(),
                reason = event.reason().unwrap_or(""),
                "authorization {}",
                event.outcome()
            ),
        }
        Ok(())
    }
}
