use std::fmt;

use crate::request::Request;

/// Request-scoped logger used by the pipeline stages.
///
/// Every message carries the request id, method, path and the emitting
/// stage, so one request can be followed through the whole chain.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RequestLog<'a> {
    request_id: &'a str,
    method: &'a str,
    path: &'a str,
    stage: &'a str,
}

impl<'a> RequestLog<'a> {
    pub(crate) fn new(request: &'a Request, stage: &'a str) -> Self {
        Self {
            request_id: request.request_id(),
            method: request.method().as_str(),
            path: request.path(),
            stage,
        }
    }

    pub(crate) fn trace(&self, args: fmt::Arguments<'_>) {
        tracing::trace!(
            request_id = %self.request_id,
            method = %self.method,
            path = %self.path,
            filter = %self.stage,
            "{}",
            args
        );
    }

    pub(crate) fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(
            request_id = %self.request_id,
            method = %self.method,
            path = %self.path,
            filter = %self.stage,
            "{}",
            args
        );
    }

    pub(crate) fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(
            request_id = %self.request_id,
            method = %self.method,
            path = %self.path,
            filter = %self.stage,
            "{}",
            args
        );
    }

    pub(crate) fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(
            request_id = %self.request_id,
            method = %self.method,
            path = %self.path,
            filter = %self.stage,
            "{}",
            args
        );
    }
}
