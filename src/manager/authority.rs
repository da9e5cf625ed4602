use crate::decision::AuthorizationDecision;
use crate::error::Error;
use crate::principal::{DeferredPrincipal, ROLE_PREFIX};
use crate::request::Request;

use super::AuthorizationManager;

/// Grants access when the principal holds at least one of a set of authorities.
///
/// Role constructors add the `ROLE_` prefix and reject roles that already
/// carry it, so `has_role("ROLE_ADMIN")` cannot silently check
/// `ROLE_ROLE_ADMIN`.
///
/// # Examples
///
/// ```
/// use request_authz::AuthorityAuthorizationManager;
///
/// let admins = AuthorityAuthorizationManager::has_role("ADMIN").unwrap();
/// assert_eq!(admins.authorities(), ["ROLE_ADMIN"]);
///
/// assert!(AuthorityAuthorizationManager::has_role("ROLE_ADMIN").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityAuthorizationManager {
    authorities: Vec<String>,
}

impl AuthorityAuthorizationManager {
    /// Requires `ROLE_<role>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `role` is empty or already starts with `ROLE_`.
    pub fn has_role(role: &str) -> Result<Self, Error> {
        Self::has_any_role(&[role])
    }

    /// Requires any of the given roles.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the list is empty or a role is
    /// empty or already prefixed.
    pub fn has_any_role(roles: &[&str]) -> Result<Self, Error> {
        let authorities = roles
            .iter()
            .map(|role| {
                if role.is_empty() {
                    Err(Error::Configuration("role name cannot be empty".to_string()))
                } else if role.starts_with(ROLE_PREFIX) {
                    Err(Error::Configuration(format!(
                        "role '{role}' should not start with '{ROLE_PREFIX}'; it is added automatically"
                    )))
                } else {
                    Ok(format!("{ROLE_PREFIX}{role}"))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_authorities(authorities)
    }

    /// Requires the exact authority.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `authority` is empty.
    pub fn has_authority(authority: &str) -> Result<Self, Error> {
        Self::has_any_authority(&[authority])
    }

    /// Requires any of the given authorities.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the list or an authority is empty.
    pub fn has_any_authority(authorities: &[&str]) -> Result<Self, Error> {
        Self::from_authorities(authorities.iter().map(|a| a.to_string()).collect())
    }

    fn from_authorities(authorities: Vec<String>) -> Result<Self, Error> {
        if authorities.is_empty() || authorities.iter().any(String::is_empty) {
            return Err(Error::Configuration(
                "at least one non-empty authority is required".to_string(),
            ));
        }
        Ok(Self { authorities })
    }

    /// The authorities any one of which grants access.
    pub fn authorities(&self) -> &[String] {
        &self.authorities
    }
}

impl AuthorizationManager for AuthorityAuthorizationManager {
    fn check(
        &self,
        principal: &DeferredPrincipal<'_>,
        _request: &Request,
    ) -> Result<Option<AuthorizationDecision>, Error> {
        let principal = principal.get()?;
        let granted = self
            .authorities
            .iter()
            .any(|required| principal.has_authority(required));
        Ok(Some(AuthorizationDecision::new(granted).with_reason(format!(
            "hasAnyAuthority[{}]",
            self.authorities.join(",")
        ))))
    }
}
