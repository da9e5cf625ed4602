//! Declarative authorization rules.
//!
//! ```json
//! {
//!   "filterAllDispatcherTypes": false,
//!   "absentDecision": "deny",
//!   "rules": [
//!     { "pattern": "/public/**", "access": "permitAll" },
//!     { "pattern": "/admin/**", "method": "DELETE", "access": "hasRole('ADMIN')" },
//!     { "pattern": "/**", "access": "isAuthenticated()" }
//!   ]
//! }
//! ```
//!
//! Rules are evaluated in the order written; each `access` is an
//! [`ExpressionAuthorizationManager`] expression.

use http::Method;
use serde::{Deserialize, Serialize};

use crate::audit::TracingEventPublisher;
use crate::error::Error;
use crate::filter::{AbsentDecision, AuthorizationFilter};
use crate::manager::{
    ExpressionAuthorizationManager, RequestMatcherDelegatingAuthorizationManager,
    RequestMatcherDelegatingBuilder,
};

/// Settings of an [`AuthorizationFilter`] and its rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorizationConfig {
    /// Also evaluate async and error re-dispatches.
    #[serde(alias = "filterAllDispatcherTypes", alias = "shouldFilterAllDispatcherTypes")]
    pub filter_all_dispatcher_types: bool,

    /// What an absent decision means.
    #[serde(alias = "absentDecision")]
    pub absent_decision: AbsentDecision,

    /// Log granted decisions on the audit target too.
    #[serde(alias = "publishGrantedEvents")]
    pub publish_granted_events: bool,

    /// Ordered rules; the first match that decides wins.
    pub rules: Vec<RuleConfig>,
}

/// One `pattern [method] -> access` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// Ant-style path pattern.
    pub pattern: String,
    /// Restricts the rule to one HTTP method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Access expression.
    pub access: String,
}

impl AuthorizationConfig {
    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for malformed JSON or unknown fields.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json)
            .map_err(|e| Error::Configuration(format!("invalid authorization config: {e}")))
    }

    /// Builds the first-match rule manager.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the first invalid rule.
    pub fn build_manager(&self) -> Result<RequestMatcherDelegatingAuthorizationManager, Error> {
        self.rules
            .iter()
            .enumerate()
            .try_fold(
                RequestMatcherDelegatingAuthorizationManager::builder(),
                |builder, (index, rule)| {
                    rule.apply(builder).map_err(|e| {
                        Error::Configuration(format!(
                            "rule {} ({}): {}",
                            index + 1,
                            rule.pattern,
                            e.message()
                        ))
                    })
                },
            )
            .map(|builder| builder.build())
    }

    /// Builds the configured filter, publishing to [`TracingEventPublisher`].
    ///
    /// # Errors
    ///
    /// See [`build_manager`](Self::build_manager).
    pub fn build_filter(&self) -> Result<AuthorizationFilter, Error> {
        let filter = AuthorizationFilter::new(self.build_manager()?)
            .with_filter_all_dispatcher_types(self.filter_all_dispatcher_types)
            .with_absent_decision(self.absent_decision)
            .with_event_publisher(
                TracingEventPublisher::new().with_granted_events(self.publish_granted_events),
            );
        tracing::debug!(
            rules = self.rules.len(),
            filter_all_dispatcher_types = self.filter_all_dispatcher_types,
            absent_decision = ?self.absent_decision,
            "authorization filter configured"
        );
        Ok(filter)
    }
}

impl RuleConfig {
    fn apply(
        &self,
        builder: RequestMatcherDelegatingBuilder,
    ) -> Result<RequestMatcherDelegatingBuilder, Error> {
        let access = ExpressionAuthorizationManager::parse(&self.access)?;
        match &self.method {
            None => builder.path(&self.pattern, access),
            Some(method) => {
                let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                    .map_err(|_| Error::Configuration(format!("invalid HTTP method '{method}'")))?;
                builder.method_path(method, &self.pattern, access)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::ErrorKind;
    use crate::manager::AuthorizationManager;
    use crate::principal::{DeferredPrincipal, Principal};
    use crate::request::Request;

    const CONFIG: &str = r#"{
        "absentDecision": "deny",
        "filterAllDispatcherTypes": true,
        "rules": [
            { "pattern": "/public/**", "access": "permitAll" },
            { "pattern": "/admin/**", "method": "delete", "access": "hasRole('ADMIN')" },
            { "pattern": "/**", "access": "isAuthenticated()" }
        ]
    }"#;

    #[test]
    fn defaults_apply_to_an_empty_document() {
        let config = AuthorizationConfig::from_json("{}").unwrap();
        assert_eq!(config, AuthorizationConfig::default());
        assert!(!config.filter_all_dispatcher_types);
        assert_eq!(config.absent_decision, AbsentDecision::Permit);
    }

    #[test]
    fn camel_and_snake_case_are_accepted() {
        let camel = AuthorizationConfig::from_json(CONFIG).unwrap();
        let snake = AuthorizationConfig::from_json(
            r#"{ "absent_decision": "deny", "filter_all_dispatcher_types": true, "rules": [] }"#,
        )
        .unwrap();
        assert_eq!(camel.absent_decision, snake.absent_decision);
        assert_eq!(camel.filter_all_dispatcher_types, snake.filter_all_dispatcher_types);
        assert_eq!(camel.rules.len(), 3);
        assert_eq!(camel.rules[1].method.as_deref(), Some("delete"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = AuthorizationConfig::from_json(r#"{ "rulez": [] }"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn built_manager_applies_rules_in_order() {
        let manager = AuthorizationConfig::from_json(CONFIG)
            .unwrap()
            .build_manager()
            .unwrap();
        let user = DeferredPrincipal::ready(Some(Arc::new(Principal::new("u").with_role("USER"))));

        let delete = Request::new(Method::DELETE, "/admin/users/1");
        assert!(!manager.check(&user, &delete).unwrap().unwrap().is_granted());

        let get = Request::new(Method::GET, "/admin/users/1");
        assert!(manager.check(&user, &get).unwrap().unwrap().is_granted());

        let public = Request::new(Method::GET, "/public/a.css");
        let nobody = DeferredPrincipal::ready(None);
        assert!(manager.check(&nobody, &public).unwrap().unwrap().is_granted());
    }

    #[test]
    fn built_filter_carries_settings() {
        let filter = AuthorizationConfig::from_json(CONFIG)
            .unwrap()
            .build_filter()
            .unwrap();
        assert!(filter.filters_all_dispatcher_types());
        assert_eq!(filter.absent_decision(), AbsentDecision::Deny);
    }

    #[test]
    fn invalid_rules_name_the_rule() {
        for (rule, needle) in [
            (r#"{ "pattern": "admin", "access": "permitAll" }"#, "rule 1 (admin)"),
            (r#"{ "pattern": "/a", "access": "hasRole(" }"#, "rule 1 (/a)"),
            (r#"{ "pattern": "/a", "method": "GE T", "access": "permitAll" }"#, "invalid HTTP method"),
        ] {
            let json = format!(r#"{{ "rules": [{rule}] }}"#);
            let err = AuthorizationConfig::from_json(&json)
                .unwrap()
                .build_manager()
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration);
            assert!(err.to_string().contains(needle), "{err}");
        }
    }
}
