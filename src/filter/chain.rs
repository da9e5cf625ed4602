use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::logging::RequestLog;
use crate::request::{Request, Response};

/// One stage of the pipeline.
pub trait Filter: Send + Sync {
    /// Short name used in logs and [`FilterChain::names`].
    fn name(&self) -> &str;

    /// Processes one dispatch. Call `next.proceed` to continue.
    ///
    /// # Errors
    ///
    /// Whatever the stage or the rest of the chain fails with.
    fn do_filter(&self, request: &mut Request, response: &mut Response, next: Next<'_>)
        -> Result<(), Error>;
}

/// The application code at the end of the chain.
pub trait Handler: Send + Sync {
    /// Handles the request.
    ///
    /// # Errors
    ///
    /// Application failures, conventionally [`Error::Handler`].
    fn handle(&self, request: &mut Request, response: &mut Response) -> Result<(), Error>;
}

impl<F> Handler for F
where
    F: Fn(&mut Request, &mut Response) -> Result<(), Error> + Send + Sync,
{
    fn handle(&self, request: &mut Request, response: &mut Response) -> Result<(), Error> {
        self(request, response)
    }
}

/// The remainder of the chain. Consumed by [`proceed`](Self::proceed), so a
/// stage continues at most once.
pub struct Next<'a> {
    filters: &'a [Arc<dyn Filter>],
    handler: &'a dyn Handler,
}

impl<'a> Next<'a> {
    /// A chain remainder that runs `handler` directly.
    pub fn handler(handler: &'a dyn Handler) -> Self {
        Self {
            filters: &[],
            handler,
        }
    }

    /// Runs the next stage.
    ///
    /// # Errors
    ///
    /// Whatever the rest of the chain fails with.
    pub fn proceed(self, request: &mut Request, response: &mut Response) -> Result<(), Error> {
        match self.filters.split_first() {
            Some((filter, rest)) => filter.do_filter(
                request,
                response,
                Next {
                    filters: rest,
                    handler: self.handler,
                },
            ),
            None => self.handler.handle(request, response),
        }
    }

    /// Number of filters still to run before the handler.
    pub fn remaining(&self) -> usize {
        self.filters.len()
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.filters.iter().map(|filter| filter.name()))
            .finish()
    }
}

/// An ordered, immutable pipeline shared by every dispatch.
///
/// # Examples
///
/// ```
/// use http::{Method, StatusCode};
/// use request_authz::filter::{AuthorizationFilter, FilterChain};
/// use request_authz::{manager, Error, Request, Response};
///
/// let chain = FilterChain::builder()
///     .filter(AuthorizationFilter::new(manager::deny_all()))
///     .handler(|_: &mut Request, res: &mut Response| -> Result<(), Error> {
///         res.write_body("hello");
///         Ok(())
///     });
///
/// let mut request = Request::new(Method::GET, "/");
/// let mut response = Response::new();
/// let err = chain.dispatch(&mut request, &mut response).unwrap_err();
/// assert_eq!(err.status(), StatusCode::FORBIDDEN);
/// assert!(!response.is_committed());
/// ```
pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
    handler: Arc<dyn Handler>,
}

impl FilterChain {
    /// Starts an empty chain.
    pub fn builder() -> FilterChainBuilder {
        FilterChainBuilder {
            filters: Vec::new(),
        }
    }

    /// Filter names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|filter| filter.name()).collect()
    }

    /// Runs one dispatch of `request` through every stage.
    ///
    /// Call again after [`Request::redispatch`] for async or error
    /// dispatches of the same request.
    ///
    /// # Errors
    ///
    /// The first error no stage handled.
    pub fn dispatch(&self, request: &mut Request, response: &mut Response) -> Result<(), Error> {
        RequestLog::new(request, "filter_chain").trace(format_args!(
            "dispatch ({}) through {} filters",
            request.dispatcher_type(),
            self.filters.len()
        ));
        Next {
            filters: &self.filters,
            handler: self.handler.as_ref(),
        }
        .proceed(request, response)
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.names())
            .finish_non_exhaustive()
    }
}

/// Builds a [`FilterChain`].
pub struct FilterChainBuilder {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterChainBuilder {
    /// Appends a filter.
    pub fn filter(self, filter: impl Filter + 'static) -> Self {
        self.shared_filter(Arc::new(filter))
    }

    /// Appends a shared filter.
    pub fn shared_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Terminates the chain with `handler`.
    pub fn handler(self, handler: impl Handler + 'static) -> FilterChain {
        self.shared_handler(Arc::new(handler))
    }

    /// Terminates the chain with a shared handler.
    pub fn shared_handler(self, handler: Arc<dyn Handler>) -> FilterChain {
        FilterChain {
            filters: self.filters,
            handler,
        }
    }
}
