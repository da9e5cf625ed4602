//! Property tests for cross-module invariants.

use std::sync::Arc;

use http::Method;
use proptest::prelude::*;
use request_authz::filter::{AbsentDecision, AuthorizationFilter, FilterChain};
use request_authz::manager::{self, SingleResultAuthorizationManager};
use request_authz::{
    AuthorizationManager, DeferredPrincipal, Error, ErrorKind, ExpressionAuthorizationManager,
    PathPattern, Principal, Request, RequestAttributeSecurityContextRepository,
    RequestMatcherDelegatingAuthorizationManager, Response, SecurityContext,
    SecurityContextRepository,
};

// Strategy: path segments that are never wildcards
fn arb_segments() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(prop::string::string_regex("[a-z0-9]{1,8}").unwrap(), 0..5)
}

fn arb_path() -> impl Strategy<Value = String> {
    arb_segments().prop_map(|segments| format!("/{}", segments.join("/")))
}

fn arb_method() -> impl Strategy<Value = Method> {
    prop_oneof![
        Just(Method::GET),
        Just(Method::POST),
        Just(Method::PUT),
        Just(Method::DELETE),
    ]
}

// Strategy: Some(granted) or None
fn arb_decision() -> impl Strategy<Value = Option<bool>> {
    prop::option::of(any::<bool>())
}

fn fixed(decision: Option<bool>) -> SingleResultAuthorizationManager {
    match decision {
        Some(true) => manager::permit_all(),
        Some(false) => manager::deny_all(),
        None => SingleResultAuthorizationManager::abstain(),
    }
}

proptest! {
    /// Property: when two rules both match, the first one's denial always wins
    #[test]
    fn proptest_first_match_deny_beats_later_grant(path in arb_path(), method in arb_method()) {
        let rules = RequestMatcherDelegatingAuthorizationManager::builder()
            .path("/**", manager::deny_all())
            .unwrap()
            .any_request(manager::permit_all());

        let decision = rules
            .check(&DeferredPrincipal::ready(None), &Request::new(method, path))
            .unwrap()
            .unwrap();
        prop_assert!(!decision.is_granted());
    }

    /// Property: the chain runs exactly when the decision is a grant or absent-and-permitted
    #[test]
    fn proptest_chain_invoked_iff_permitted(decision in arb_decision(), deny_absent in any::<bool>()) {
        let absent = if deny_absent { AbsentDecision::Deny } else { AbsentDecision::Permit };
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let chain = FilterChain::builder()
            .filter(AuthorizationFilter::new(fixed(decision)).with_absent_decision(absent))
            .handler(move |_: &mut Request, _: &mut Response| -> Result<(), Error> {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            });

        let result = chain.dispatch(&mut Request::new(Method::GET, "/"), &mut Response::new());
        let permitted = decision.unwrap_or(!deny_absent);
        let invoked = calls.load(std::sync::atomic::Ordering::SeqCst);

        if permitted {
            prop_assert!(result.is_ok());
            prop_assert_eq!(invoked, 1);
        } else {
            prop_assert_eq!(result.unwrap_err().kind(), ErrorKind::AccessDenied);
            prop_assert_eq!(invoked, 0);
        }
    }

    /// Property: a context saved on one request never shows up on another
    #[test]
    fn proptest_context_isolation(name in "[a-z]{1,12}", path in arb_path()) {
        let repository = RequestAttributeSecurityContextRepository::new();
        let mut saved = Request::new(Method::GET, path.clone());
        repository.save_context(SecurityContext::with_principal(Principal::new(name.clone())), &mut saved);

        let fresh = Request::new(Method::GET, path);
        prop_assert!(repository.load_context(&fresh).is_empty());
        prop_assert_eq!(
            repository.load_context(&saved).principal().map(|p| p.name().to_string()),
            Some(name)
        );
    }

    /// Property: `/**` matches every path, and a literal pattern matches itself
    #[test]
    fn proptest_patterns_match_literal_paths(path in arb_path()) {
        prop_assert!(PathPattern::parse("/**").unwrap().matches(&path));
        prop_assert!(PathPattern::parse(&path).unwrap().matches(&path));
    }

    /// Property: `not X` is always the opposite of `X`
    #[test]
    fn proptest_expression_negation(role in "[A-Z]{1,8}", held in "[A-Z]{1,8}") {
        let principal = DeferredPrincipal::ready(Some(Arc::new(Principal::new("p").with_role(&held))));
        let request = Request::new(Method::GET, "/");
        let positive = ExpressionAuthorizationManager::parse(&format!("hasRole('{role}')")).unwrap();
        let negative = ExpressionAuthorizationManager::parse(&format!("not hasRole('{role}')")).unwrap();

        let p = positive.check(&principal, &request).unwrap().unwrap().is_granted();
        let n = negative.check(&principal, &request).unwrap().unwrap().is_granted();
        prop_assert_ne!(p, n);
        prop_assert_eq!(p, role == held);
    }
}
