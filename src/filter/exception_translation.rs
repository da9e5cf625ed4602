use std::sync::Arc;

use http::header::{self, HeaderValue};
use http::StatusCode;
use serde::Serialize;

use crate::error::Error;
use crate::logging::RequestLog;
use crate::request::{Request, Response};

use super::authorization::{HolderPrincipalLookup, PrincipalLookup};
use super::{Filter, Next};

const JSON: &str = "application/json;charset=utf-8";

/// JSON body written for rejected requests: `{"status":401,"msg":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody<'a> {
    /// HTTP status code
    pub status: u16,
    /// Human-readable message
    pub msg: &'a str,
}

fn write_json(response: &mut Response, status: StatusCode, msg: &str) -> Result<(), Error> {
    let body = serde_json::to_string(&ErrorBody {
        status: status.as_u16(),
        msg,
    })
    .map_err(|e| Error::Handler(format!("cannot serialize error body: {e}")))?;
    response.set_status(status);
    response.set_header(header::CONTENT_TYPE, HeaderValue::from_static(JSON));
    response.write_body(body);
    Ok(())
}

/// Starts authentication: asks the client for credentials.
pub trait AuthenticationEntryPoint: Send + Sync {
    /// Writes the challenge for `error`.
    ///
    /// # Errors
    ///
    /// Returns an error if the response cannot be written.
    fn commence(&self, request: &Request, response: &mut Response, error: &Error)
        -> Result<(), Error>;
}

/// Writes the response for an authenticated principal that was denied.
pub trait AccessDeniedHandler: Send + Sync {
    /// Writes the rejection for `error`.
    ///
    /// # Errors
    ///
    /// Returns an error if the response cannot be written.
    fn handle(&self, request: &Request, response: &mut Response, error: &Error)
        -> Result<(), Error>;
}

/// `401 Unauthorized` with a JSON body and a `WWW-Authenticate` challenge.
#[derive(Debug, Clone)]
pub struct JsonAuthenticationEntryPoint {
    challenge: HeaderValue,
}

impl JsonAuthenticationEntryPoint {
    /// Challenges with `Bearer realm="request-authz"`.
    pub fn new() -> Self {
        Self {
            challenge: HeaderValue::from_static("Bearer realm=\"request-authz\""),
        }
    }

    /// Challenges with `<scheme> realm="<realm>"`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the result is not a valid header value.
    pub fn with_challenge(scheme: &str, realm: &str) -> Result<Self, Error> {
        let challenge = HeaderValue::from_str(&format!("{scheme} realm=\"{realm}\""))
            .map_err(|e| Error::Configuration(format!("invalid authentication challenge: {e}")))?;
        Ok(Self { challenge })
    }
}

impl Default for JsonAuthenticationEntryPoint {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthenticationEntryPoint for JsonAuthenticationEntryPoint {
    fn commence(
        &self,
        _request: &Request,
        response: &mut Response,
        error: &Error,
    ) -> Result<(), Error> {
        response.set_header(header::WWW_AUTHENTICATE, self.challenge.clone());
        write_json(response, StatusCode::UNAUTHORIZED, error.message())
    }
}

/// `403 Forbidden` with a JSON body.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAccessDeniedHandler;

impl AccessDeniedHandler for JsonAccessDeniedHandler {
    fn handle(&self, _request: &Request, response: &mut Response, error: &Error) -> Result<(), Error> {
        write_json(response, StatusCode::FORBIDDEN, error.message())
    }
}

/// Turns authorization failures raised further down the chain into
/// responses.
///
/// | Error                                   | Response                     |
/// |-----------------------------------------|------------------------------|
/// | `AuthenticationMissing`                 | entry point (401)            |
/// | `AccessDenied`, no or anonymous principal | entry point (401)          |
/// | `AccessDenied`, authenticated principal | access denied handler (403)  |
/// | anything else                           | returned unchanged           |
///
/// A response that is already committed cannot be rewritten, so the error
/// is returned unchanged too.
pub struct ExceptionTranslationFilter {
    entry_point: Arc<dyn AuthenticationEntryPoint>,
    access_denied_handler: Arc<dyn AccessDeniedHandler>,
    lookup: Arc<dyn PrincipalLookup>,
}

impl ExceptionTranslationFilter {
    /// JSON entry point and access denied handler.
    pub fn new() -> Self {
        Self {
            entry_point: Arc::new(JsonAuthenticationEntryPoint::new()),
            access_denied_handler: Arc::new(JsonAccessDeniedHandler),
            lookup: Arc::new(HolderPrincipalLookup),
        }
    }

    /// Replaces the entry point.
    pub fn with_entry_point(mut self, entry_point: impl AuthenticationEntryPoint + 'static) -> Self {
        self.entry_point = Arc::new(entry_point);
        self
    }

    /// Replaces the access denied handler.
    pub fn with_access_denied_handler(
        mut self,
        handler: impl AccessDeniedHandler + 'static,
    ) -> Self {
        self.access_denied_handler = Arc::new(handler);
        self
    }

    /// Resolves the principal with `lookup` instead of the holder.
    pub fn with_principal_lookup(mut self, lookup: impl PrincipalLookup + 'static) -> Self {
        self.lookup = Arc::new(lookup);
        self
    }

    fn is_unauthenticated(&self, request: &Request) -> bool {
        self.lookup
            .lookup(request)
            .map_or(true, |principal| principal.is_anonymous())
    }
}

impl Default for ExceptionTranslationFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for ExceptionTranslationFilter {
    fn name(&self) -> &str {
        "exception_translation"
    }

    fn do_filter(
        &self,
        request: &mut Request,
        response: &mut Response,
        next: Next<'_>,
    ) -> Result<(), Error> {
        let err = match next.proceed(request, response) {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        let log = RequestLog::new(request, self.name());
        if response.is_committed() {
            log.debug(format_args!("response already committed, cannot translate: {err}"));
            return Err(err);
        }
        match err {
            Error::AuthenticationMissing(_) => {
                log.debug(format_args!("sending to authentication entry point: {err}"));
                self.entry_point.commence(request, response, &err)
            }
            Error::AccessDenied(_) if self.is_unauthenticated(request) => {
                let reason = Error::AuthenticationMissing(
                    "full authentication is required to access this resource".to_string(),
                );
                log.debug(format_args!("access denied for anonymous principal, challenging"));
                self.entry_point.commence(request, response, &reason)
            }
            Error::AccessDenied(_) => {
                log.debug(format_args!("sending to access denied handler: {err}"));
                self.access_denied_handler.handle(request, response, &err)
            }
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::Principal;
    use http::Method;

    fn translate(
        filter: &ExceptionTranslationFilter,
        error: Error,
    ) -> (Result<(), Error>, Response) {
        let failing = move |_: &mut Request, _: &mut Response| -> Result<(), Error> {
            Err(error.clone())
        };
        let mut response = Response::new();
        let result = filter.do_filter(
            &mut Request::new(Method::GET, "/"),
            &mut response,
            Next::handler(&failing),
        );
        (result, response)
    }

    fn as_user(filter: ExceptionTranslationFilter) -> ExceptionTranslationFilter {
        filter.with_principal_lookup(|_: &Request| Some(Arc::new(Principal::new("user"))))
    }

    #[test]
    fn missing_authentication_becomes_401() {
        let (result, response) =
            translate(&ExceptionTranslationFilter::new(), Error::credentials_not_found());
        assert!(result.is_ok());
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            "Bearer realm=\"request-authz\""
        );
        let body: serde_json::Value = serde_json::from_str(response.body()).unwrap();
        assert_eq!(body["status"], 401);
    }

    #[test]
    fn access_denied_for_a_user_becomes_403() {
        let (result, response) =
            translate(&as_user(ExceptionTranslationFilter::new()), Error::access_denied());
        assert!(result.is_ok());
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers()[header::CONTENT_TYPE], JSON);
        assert_eq!(
            response.body(),
            r#"{"status":403,"msg":"Access Denied"}"#
        );
    }

    #[test]
    fn access_denied_for_anonymous_is_challenged() {
        let filter = ExceptionTranslationFilter::new()
            .with_principal_lookup(|_: &Request| Some(Arc::new(Principal::anonymous())));
        let (result, response) = translate(&filter, Error::access_denied());
        assert!(result.is_ok());
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn other_errors_are_reraised() {
        for error in [
            Error::PolicyEvaluation("backend down".to_string()),
            Error::Handler("boom".to_string()),
        ] {
            let (result, response) = translate(&as_user(ExceptionTranslationFilter::new()), error.clone());
            assert_eq!(result.unwrap_err(), error);
            assert!(!response.is_committed());
        }
    }

    #[test]
    fn committed_responses_are_left_alone() {
        let filter = ExceptionTranslationFilter::new();
        let partial = |_: &mut Request, res: &mut Response| -> Result<(), Error> {
            res.write_body("partial");
            Err(Error::access_denied())
        };
        let mut response = Response::new();
        let result = filter.do_filter(
            &mut Request::new(Method::GET, "/"),
            &mut response,
            Next::handler(&partial),
        );
        assert!(result.is_err());
        assert_eq!(response.body(), "partial");
    }

    #[test]
    fn custom_challenge() {
        let entry_point = JsonAuthenticationEntryPoint::with_challenge("Basic", "admin").unwrap();
        let filter = ExceptionTranslationFilter::new().with_entry_point(entry_point);
        let (_, response) = translate(&filter, Error::credentials_not_found());
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            "Basic realm=\"admin\""
        );
        assert!(JsonAuthenticationEntryPoint::with_challenge("Basic", "bad\nrealm").is_err());
    }
}
