//! In-memory audit trail recorder.

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{AuditOutcome, AuthorizationEvent, AuthorizationEventPublisher, PublishError};

/// In-memory recorder for authorization events.
///
/// Thread-safe, so one trail can be shared by every worker of a pipeline.
/// Mostly useful in tests; production deployments publish to a real sink.
///
/// # Example
///
/// ```
/// use http::Method;
/// use request_authz::audit::{AuditTrail, AuthorizationEvent, AuthorizationEventPublisher};
/// use request_authz::{DeferredPrincipal, Request};
///
/// let trail = AuditTrail::new();
/// let request = Request::new(Method::GET, "/");
///
/// trail
///     .publish(&AuthorizationEvent::new(&request, &DeferredPrincipal::ready(None), None))
///     .unwrap();
///
/// assert_eq!(trail.events().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct AuditTrail {
    events: Mutex<Vec<AuthorizationEvent>>,
}

impl AuditTrail {
    /// Creates a new empty audit trail.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<AuthorizationEvent>> {
        // A recorder that panicked mid-push still holds valid events.
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records an event.
    pub fn record(&self, event: AuthorizationEvent) {
        self.lock().push(event);
    }

    /// Returns a snapshot of all recorded events, oldest first.
    pub fn events(&self) -> Vec<AuthorizationEvent> {
        self.lock().clone()
    }

    /// Returns the events with the given outcome.
    pub fn with_outcome(&self, outcome: AuditOutcome) -> Vec<AuthorizationEvent> {
        self.lock()
            .iter()
            .filter(|e| e.outcome() == outcome)
            .cloned()
            .collect()
    }

    /// Returns the number of recorded events.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if no events have been recorded.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Clears all recorded events.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl AuthorizationEventPublisher for AuditTrail {
    fn publish(&self, event: &AuthorizationEvent) -> Result<(), PublishError> {
        self.record(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::decision::AuthorizationDecision;
    use crate::principal::DeferredPrincipal;
    use crate::request::Request;
    use http::Method;

    fn event(id: &str, granted: bool) -> AuthorizationEvent {
        let request = Request::new(Method::GET, "/").with_request_id(id);
        let decision = AuthorizationDecision::new(granted);
        AuthorizationEvent::new(&request, &DeferredPrincipal::ready(None), Some(&decision))
    }

    #[test]
    fn audit_trail_starts_empty() {
        let trail = AuditTrail::new();
        assert!(trail.is_empty());
        assert_eq!(trail.len(), 0);
    }

    #[test]
    fn audit_trail_records_in_order() {
        let trail = AuditTrail::new();
        trail.record(event("req-1", true));
        trail.publish(&event("req-2", false)).unwrap();

        let events = trail.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].request_id(), "req-1");
        assert_eq!(events[1].request_id(), "req-2");
        assert_eq!(trail.with_outcome(AuditOutcome::Denied).len(), 1);
    }

    #[test]
    fn audit_trail_can_be_cleared() {
        let trail = AuditTrail::new();
        trail.record(event("req-1", true));
        trail.clear();
        assert!(trail.is_empty());
    }

    #[test]
    fn audit_trail_is_shared_across_threads() {
        let trail = Arc::new(AuditTrail::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let trail = Arc::clone(&trail);
                thread::spawn(move || trail.record(event(&format!("req-{i}"), true)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(trail.len(), 4);
    }
}
