use std::collections::HashMap;
use std::fmt;

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use serde::{Deserialize, Serialize};

use crate::context::SecurityContext;
use crate::state::EvaluationState;

/// How a request reached the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatcherType {
    /// Initial dispatch from the client
    Request,
    /// Resumed after asynchronous processing
    Async,
    /// Forwarded to an error page or handler
    Error,
    /// Internal forward
    Forward,
    /// Internal include
    Include,
}

impl fmt::Display for DispatcherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatcherType::Request => write!(f, "request"),
            DispatcherType::Async => write!(f, "async"),
            DispatcherType::Error => write!(f, "error"),
            DispatcherType::Forward => write!(f, "forward"),
            DispatcherType::Include => write!(f, "include"),
        }
    }
}

/// A typed request attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    /// Free-form text
    Text(String),
    /// Presence marker
    Flag,
    /// A saved security context
    SecurityContext(SecurityContext),
    /// Outcome of an authorization evaluation
    Evaluation(EvaluationState),
}

/// The request as seen by the pipeline.
///
/// Only owned, framework-neutral data: build one directly, or convert from
/// an [`http::Request`]. Policies get read-only access; filters may set
/// attributes.
///
/// # Examples
///
/// ```
/// use http::Method;
/// use request_authz::{DispatcherType, Request};
///
/// let mut request = Request::new(Method::GET, "/admin/users").with_request_id("req-1");
/// assert_eq!(request.dispatcher_type(), DispatcherType::Request);
///
/// request.redispatch(DispatcherType::Async);
/// assert_eq!(request.dispatcher_type(), DispatcherType::Async);
/// assert_eq!(request.request_id(), "req-1");
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    request_id: String,
    method: Method,
    path: String,
    headers: HeaderMap,
    dispatcher_type: DispatcherType,
    attributes: HashMap<String, Attribute>,
}

impl Request {
    /// Creates an initial-dispatch request with a generated request id.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            dispatcher_type: DispatcherType::Request,
            attributes: HashMap::new(),
        }
    }

    /// Replaces the generated request id.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Appends a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets the dispatcher type.
    pub fn with_dispatcher_type(mut self, dispatcher_type: DispatcherType) -> Self {
        self.dispatcher_type = dispatcher_type;
        self
    }

    /// Marks this request as re-dispatched; attributes are kept.
    pub fn redispatch(&mut self, dispatcher_type: DispatcherType) {
        self.dispatcher_type = dispatcher_type;
    }

    /// Returns the request id.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path (no query string).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the dispatcher type.
    pub fn dispatcher_type(&self) -> DispatcherType {
        self.dispatcher_type
    }

    /// Returns an attribute.
    pub fn attribute(&self, key: &str) -> Option<&Attribute> {
        self.attributes.get(key)
    }

    /// True if the attribute is present.
    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Sets an attribute, returning the previous value.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: Attribute) -> Option<Attribute> {
        self.attributes.insert(key.into(), value)
    }

    /// Removes an attribute.
    pub fn remove_attribute(&mut self, key: &str) -> Option<Attribute> {
        self.attributes.remove(key)
    }

    /// The last evaluation state recorded under `key`, if any.
    pub fn evaluation_state(&self, key: &str) -> Option<EvaluationState> {
        match self.attributes.get(key) {
            Some(Attribute::Evaluation(state)) => Some(*state),
            _ => None,
        }
    }
}

impl<B> From<&http::Request<B>> for Request {
    fn from(req: &http::Request<B>) -> Self {
        let mut request = Request::new(req.method().clone(), req.uri().path());
        request.headers = req.headers().clone();
        if let Some(id) = req
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
        {
            request.request_id = id.to_string();
        }
        request
    }
}

/// The response a stage may write to.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
    committed: bool,
}

impl Response {
    /// Creates an uncommitted `200 OK` response.
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: String::new(),
            committed: false,
        }
    }

    /// Returns the status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets the status.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Returns the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Sets a header, replacing earlier values.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Returns the body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Writes the body and commits the response.
    pub fn write_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
        self.committed = true;
    }

    /// True once a body was written.
    pub fn is_committed(&self) -> bool {
        self.committed
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}
