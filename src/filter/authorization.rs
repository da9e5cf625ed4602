use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::audit::{AuthorizationEvent, AuthorizationEventPublisher, NoopEventPublisher};
use crate::decision::AuthorizationDecision;
use crate::error::Error;
use crate::holder::SecurityContextHolder;
use crate::logging::RequestLog;
use crate::manager::{AuthorizationManager, SharedAuthorizationManager};
use crate::principal::{DeferredPrincipal, Principal};
use crate::request::{Attribute, DispatcherType, Request, Response};
use crate::state::EvaluationState;

use super::{Filter, Next};

/// Marks a request that is inside the authorization filter.
pub const FILTER_APPLIED_ATTRIBUTE: &str = "request_authz.AuthorizationFilter.APPLIED";

/// Holds the [`EvaluationState`] of the latest evaluated dispatch.
pub const EVALUATION_STATE_ATTRIBUTE: &str = "request_authz.AuthorizationFilter.STATE";

const NAME: &str = "authorization";

/// What to do when the manager returns no decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbsentDecision {
    /// Forward the request
    #[default]
    Permit,
    /// Treat it as a denial
    Deny,
}

/// Resolves the principal for a request, on demand.
pub trait PrincipalLookup: Send + Sync {
    /// The principal, or `None` if the request is unauthenticated.
    fn lookup(&self, request: &Request) -> Option<Arc<Principal>>;
}

impl<F> PrincipalLookup for F
where
    F: Fn(&Request) -> Option<Arc<Principal>> + Send + Sync,
{
    fn lookup(&self, request: &Request) -> Option<Arc<Principal>> {
        self(request)
    }
}

/// Reads the principal from [`SecurityContextHolder`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HolderPrincipalLookup;

impl PrincipalLookup for HolderPrincipalLookup {
    fn lookup(&self, _request: &Request) -> Option<Arc<Principal>> {
        SecurityContextHolder::current_principal()
    }
}

/// Enforces an [`AuthorizationManager`] decision on every dispatch.
///
/// Per dispatch:
///
/// 1. Async and error re-dispatches pass straight through unless
///    [`with_filter_all_dispatcher_types`](Self::with_filter_all_dispatcher_types)
///    is set.
/// 2. A dispatch nested inside one already being authorized passes through,
///    except a nested error dispatch when all dispatcher types are filtered.
/// 3. Otherwise the manager is consulted with a deferred principal and the
///    decision is published.
/// 4. A denial fails with [`Error::AccessDenied`]; a grant, or an absent
///    decision under [`AbsentDecision::Permit`], continues the chain once.
///
/// A manager error stops the dispatch. [`Error::AuthenticationMissing`] and
/// [`Error::AccessDenied`] propagate as they are; anything else becomes
/// [`Error::PolicyEvaluation`]. Nothing is published in that case.
///
/// The terminal [`EvaluationState`] is left on the request under
/// [`EVALUATION_STATE_ATTRIBUTE`].
pub struct AuthorizationFilter {
    manager: SharedAuthorizationManager,
    publisher: Arc<dyn AuthorizationEventPublisher>,
    lookup: Arc<dyn PrincipalLookup>,
    filter_all_dispatcher_types: bool,
    absent_decision: AbsentDecision,
}

impl AuthorizationFilter {
    /// Enforces `manager`.
    pub fn new(manager: impl AuthorizationManager + 'static) -> Self {
        Self::from_shared(Arc::new(manager))
    }

    /// Enforces a shared manager.
    pub fn from_shared(manager: SharedAuthorizationManager) -> Self {
        Self {
            manager,
            publisher: Arc::new(NoopEventPublisher),
            lookup: Arc::new(HolderPrincipalLookup),
            filter_all_dispatcher_types: false,
            absent_decision: AbsentDecision::default(),
        }
    }

    /// Publishes decisions to `publisher`.
    pub fn with_event_publisher(
        self,
        publisher: impl AuthorizationEventPublisher + 'static,
    ) -> Self {
        self.with_shared_event_publisher(Arc::new(publisher))
    }

    /// Publishes decisions to a shared publisher.
    pub fn with_shared_event_publisher(
        mut self,
        publisher: Arc<dyn AuthorizationEventPublisher>,
    ) -> Self {
        self.publisher = publisher;
        self
    }

    /// Resolves principals with `lookup` instead of the holder.
    pub fn with_principal_lookup(mut self, lookup: impl PrincipalLookup + 'static) -> Self {
        self.lookup = Arc::new(lookup);
        self
    }

    /// Also evaluates async and error re-dispatches.
    pub fn with_filter_all_dispatcher_types(mut self, enabled: bool) -> Self {
        self.filter_all_dispatcher_types = enabled;
        self
    }

    /// Sets the absent-decision policy.
    pub fn with_absent_decision(mut self, absent_decision: AbsentDecision) -> Self {
        self.absent_decision = absent_decision;
        self
    }

    /// The enforced manager.
    pub fn manager(&self) -> &SharedAuthorizationManager {
        &self.manager
    }

    /// Whether async and error re-dispatches are evaluated.
    pub fn filters_all_dispatcher_types(&self) -> bool {
        self.filter_all_dispatcher_types
    }

    /// The absent-decision policy.
    pub fn absent_decision(&self) -> AbsentDecision {
        self.absent_decision
    }

    /// The state recorded by the latest evaluated dispatch of `request`.
    pub fn last_state(request: &Request) -> Option<EvaluationState> {
        request.evaluation_state(EVALUATION_STATE_ATTRIBUTE)
    }

    fn skip_dispatch(&self, request: &Request) -> bool {
        !self.filter_all_dispatcher_types
            && matches!(
                request.dispatcher_type(),
                DispatcherType::Async | DispatcherType::Error
            )
    }

    fn authorize(
        &self,
        request: &mut Request,
        response: &mut Response,
        next: Next<'_>,
    ) -> Result<(), Error> {
        let evaluating = EvaluationState::Unevaluated.transition(EvaluationState::Evaluating)?;
        request.set_attribute(EVALUATION_STATE_ATTRIBUTE, Attribute::Evaluation(evaluating));

        let outcome = self.evaluate(request);
        let terminal = match &outcome {
            Ok(Some(decision)) if decision.is_granted() => EvaluationState::Granted,
            Ok(Some(_)) => EvaluationState::Denied,
            Ok(None) => match self.absent_decision {
                AbsentDecision::Permit => EvaluationState::Granted,
                AbsentDecision::Deny => EvaluationState::Denied,
            },
            Err(err) => EvaluationState::from_error(err),
        };
        let state = evaluating.transition(terminal)?;
        request.set_attribute(EVALUATION_STATE_ATTRIBUTE, Attribute::Evaluation(state));

        let log = RequestLog::new(request, NAME);
        match outcome {
            Err(err) => {
                if state == EvaluationState::Failed {
                    log.error(format_args!("authorization failed: {err}"));
                } else {
                    log.debug(format_args!("authorization stopped: {err}"));
                }
                Err(err)
            }
            Ok(_) if state.permits_downstream() => {
                log.trace(format_args!("authorization granted"));
                next.proceed(request, response)
            }
            Ok(decision) => {
                log.debug(format_args!(
                    "access denied ({})",
                    decision.map_or_else(|| "no decision".to_string(), |d| d.to_string())
                ));
                Err(Error::access_denied())
            }
        }
    }

    fn evaluate(&self, request: &Request) -> Result<Option<AuthorizationDecision>, Error> {
        let principal = DeferredPrincipal::new(|| self.lookup.lookup(request));
        let decision = match self.manager.check(&principal, request) {
            Ok(decision) => decision,
            Err(err @ (Error::AuthenticationMissing(_) | Error::AccessDenied(_))) => {
                return Err(err)
            }
            Err(err @ Error::PolicyEvaluation(_)) => return Err(err),
            Err(other) => return Err(Error::PolicyEvaluation(other.to_string())),
        };
        self.publish(request, &principal, decision.as_ref());
        Ok(decision)
    }

    fn publish(
        &self,
        request: &Request,
        principal: &DeferredPrincipal<'_>,
        decision: Option<&AuthorizationDecision>,
    ) {
        let event = AuthorizationEvent::new(request, principal, decision);
        let published = panic::catch_unwind(AssertUnwindSafe(|| self.publisher.publish(&event)));
        let log = RequestLog::new(request, NAME);
        match published {
            Ok(Ok(())) => {}
            Ok(Err(err)) => log.warn(format_args!("{err}")),
            Err(_) => log.warn(format_args!("authorization event publisher panicked")),
        }
    }
}

impl Filter for AuthorizationFilter {
    fn name(&self) -> &str {
        NAME
    }

    fn do_filter(
        &self,
        request: &mut Request,
        response: &mut Response,
        next: Next<'_>,
    ) -> Result<(), Error> {
        if self.skip_dispatch(request) {
            RequestLog::new(request, NAME).trace(format_args!(
                "skipping {} dispatch",
                request.dispatcher_type()
            ));
            return next.proceed(request, response);
        }

        if request.has_attribute(FILTER_APPLIED_ATTRIBUTE) {
            if request.dispatcher_type() == DispatcherType::Error {
                return self.authorize(request, response, next);
            }
            return next.proceed(request, response);
        }

        request.set_attribute(FILTER_APPLIED_ATTRIBUTE, Attribute::Flag);
        let result = self.authorize(request, response, next);
        request.remove_attribute(FILTER_APPLIED_ATTRIBUTE);
        result
    }
}

impl fmt::Debug for AuthorizationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationFilter")
            .field("filter_all_dispatcher_types", &self.filter_all_dispatcher_types)
            .field("absent_decision", &self.absent_decision)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::audit::{AuditOutcome, AuditTrail, PublishError};
    use crate::context::SecurityContext;
    use crate::error::ErrorKind;
    use crate::filter::{FilterChain, Handler};
    use crate::manager::{self, SingleResultAuthorizationManager};
    use http::Method;

    #[derive(Default)]
    struct CountingHandler {
        calls: AtomicUsize,
    }

    impl Handler for CountingHandler {
        fn handle(&self, _request: &mut Request, _response: &mut Response) -> Result<(), Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn run(filter: AuthorizationFilter, request: &mut Request) -> (Result<(), Error>, usize) {
        let handler = CountingHandler::default();
        let result = filter.do_filter(request, &mut Response::new(), Next::handler(&handler));
        (result, handler.calls.load(Ordering::SeqCst))
    }

    fn get() -> Request {
        Request::new(Method::GET, "/")
    }

    fn user() -> Option<Arc<Principal>> {
        Some(Arc::new(Principal::new("user").with_role("USER")))
    }

    #[test]
    fn grant_proceeds_once_and_records_state() {
        let filter = AuthorizationFilter::new(manager::authenticated())
            .with_principal_lookup(|_: &Request| user());
        let mut req = get();

        let (result, calls) = run(filter, &mut req);
        assert!(result.is_ok());
        assert_eq!(calls, 1);
        assert_eq!(
            AuthorizationFilter::last_state(&req),
            Some(EvaluationState::Granted)
        );
        assert!(!req.has_attribute(FILTER_APPLIED_ATTRIBUTE));
    }

    #[test]
    fn denial_stops_the_chain() {
        let (result, calls) = run(AuthorizationFilter::new(manager::deny_all()), &mut get());
        assert_eq!(result.unwrap_err().kind(), ErrorKind::AccessDenied);
        assert_eq!(calls, 0);
    }

    #[test]
    fn missing_principal_is_not_access_denied() {
        SecurityContextHolder::clear_context();
        let mut req = get();
        let (result, calls) = run(AuthorizationFilter::new(manager::authenticated()), &mut req);

        assert_eq!(result.unwrap_err().kind(), ErrorKind::AuthenticationMissing);
        assert_eq!(calls, 0);
        assert_eq!(
            AuthorizationFilter::last_state(&req),
            Some(EvaluationState::AuthenticationMissing)
        );
    }

    #[test]
    fn default_lookup_reads_the_holder() {
        let _guard = SecurityContextHolder::scope(SecurityContext::with_principal(
            Principal::new("held").with_role("USER"),
        ));
        let (result, calls) = run(AuthorizationFilter::new(manager::authenticated()), &mut get());
        assert!(result.is_ok());
        assert_eq!(calls, 1);
    }

    #[test]
    fn absent_decision_follows_policy() {
        let (permit, permit_calls) = run(
            AuthorizationFilter::new(SingleResultAuthorizationManager::abstain()),
            &mut get(),
        );
        assert!(permit.is_ok());
        assert_eq!(permit_calls, 1);

        let (deny, deny_calls) = run(
            AuthorizationFilter::new(SingleResultAuthorizationManager::abstain())
                .with_absent_decision(AbsentDecision::Deny),
            &mut get(),
        );
        assert_eq!(deny.unwrap_err().kind(), ErrorKind::AccessDenied);
        assert_eq!(deny_calls, 0);
    }

    #[test]
    fn manager_failure_is_fail_closed() {
        let trail = Arc::new(AuditTrail::new());
        let filter = AuthorizationFilter::new(
            |_: &DeferredPrincipal<'_>, _: &Request| -> Result<Option<AuthorizationDecision>, Error> {
                Err(Error::Configuration("unknown rule".to_string()))
            },
        )
        .with_shared_event_publisher(trail.clone());
        let mut req = get();

        let (result, calls) = run(filter, &mut req);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::PolicyEvaluation);
        assert_eq!(calls, 0);
        assert_eq!(
            AuthorizationFilter::last_state(&req),
            Some(EvaluationState::Failed)
        );
        assert!(trail.is_empty());
    }

    #[test]
    fn decisions_are_published() {
        let trail = Arc::new(AuditTrail::new());
        let filter = AuthorizationFilter::new(manager::deny_all())
            .with_shared_event_publisher(trail.clone());

        let (result, _) = run(filter, &mut get());
        assert!(result.is_err());

        let events = trail.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome(), AuditOutcome::Denied);
        assert_eq!(events[0].reason(), Some("denyAll"));
    }

    struct Failing;

    impl AuthorizationEventPublisher for Failing {
        fn publish(&self, _event: &AuthorizationEvent) -> Result<(), PublishError> {
            Err(PublishError("sink offline".to_string()))
        }
    }

    struct Panicking;

    impl AuthorizationEventPublisher for Panicking {
        fn publish(&self, _event: &AuthorizationEvent) -> Result<(), PublishError> {
            panic!("sink exploded")
        }
    }

    #[test]
    fn publisher_failures_do_not_change_the_decision() {
        let (failing, failing_calls) = run(
            AuthorizationFilter::new(manager::permit_all()).with_event_publisher(Failing),
            &mut get(),
        );
        assert!(failing.is_ok());
        assert_eq!(failing_calls, 1);

        let (panicking, panicking_calls) = run(
            AuthorizationFilter::new(manager::deny_all()).with_event_publisher(Panicking),
            &mut get(),
        );
        assert_eq!(panicking.unwrap_err().kind(), ErrorKind::AccessDenied);
        assert_eq!(panicking_calls, 0);
    }

    #[test]
    fn async_and_error_dispatches_skip_by_default() {
        for dispatcher_type in [DispatcherType::Async, DispatcherType::Error] {
            let mut req = get().with_dispatcher_type(dispatcher_type);
            let (result, calls) = run(AuthorizationFilter::new(manager::deny_all()), &mut req);
            assert!(result.is_ok());
            assert_eq!(calls, 1);
            assert_eq!(AuthorizationFilter::last_state(&req), None);
        }
    }

    #[test]
    fn forward_dispatch_is_evaluated_by_default() {
        let mut req = get().with_dispatcher_type(DispatcherType::Forward);
        let (result, _) = run(AuthorizationFilter::new(manager::deny_all()), &mut req);
        assert!(result.is_err());
    }

    #[test]
    fn filter_all_dispatcher_types_evaluates_redispatches() {
        let mut req = get().with_dispatcher_type(DispatcherType::Async);
        let (result, calls) = run(
            AuthorizationFilter::new(manager::deny_all()).with_filter_all_dispatcher_types(true),
            &mut req,
        );
        assert!(result.is_err());
        assert_eq!(calls, 0);
    }

    #[test]
    fn nested_dispatches_are_evaluated_once() {
        let counting = crate::manager::test_support::Counting::new(Some(true));
        let filter = Arc::new(AuthorizationFilter::from_shared(counting.clone()));
        let inner = FilterChain::builder()
            .shared_filter(filter.clone())
            .handler(|_: &mut Request, _: &mut Response| -> Result<(), Error> { Ok(()) });

        // The handler forwards the request through the same filter again.
        let outer = FilterChain::builder().shared_filter(filter).handler(
            move |req: &mut Request, res: &mut Response| -> Result<(), Error> {
                req.redispatch(DispatcherType::Forward);
                inner.dispatch(req, res)
            },
        );

        outer.dispatch(&mut get(), &mut Response::new()).unwrap();
        assert_eq!(counting.calls(), 1);
    }

    #[test]
    fn nested_error_dispatch_is_reevaluated_when_filtering_all() {
        let counting = crate::manager::test_support::Counting::new(Some(true));
        let filter = Arc::new(
            AuthorizationFilter::from_shared(counting.clone()).with_filter_all_dispatcher_types(true),
        );
        let error_page = FilterChain::builder()
            .shared_filter(filter.clone())
            .handler(|_: &mut Request, _: &mut Response| -> Result<(), Error> { Ok(()) });
        let outer = FilterChain::builder().shared_filter(filter).handler(
            move |req: &mut Request, res: &mut Response| -> Result<(), Error> {
                req.redispatch(DispatcherType::Error);
                error_page.dispatch(req, res)
            },
        );

        outer.dispatch(&mut get(), &mut Response::new()).unwrap();
        assert_eq!(counting.calls(), 2);
    }
}
