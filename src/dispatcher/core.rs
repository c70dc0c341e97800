//! Dispatcher core module - hot path for request dispatch.
//!
//! Each stage returns `Result<_, Disposition>`: a success value, or the failure
//! class whose error route answers the request instead.

use http::Method;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use super::response::{HandlerResponse, Rejection};
use crate::binder::{self, Args, RawSources, RequestContext};
use crate::bootstrap::AppContext;
use crate::ids::RequestId;
use crate::router::{ErrorRoute, Route, RouteMatch, RouteTable, SharedRouteTable};

/// One request, as handed over by a transport.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub request_id: RequestId,
    pub method: Method,
    /// URI as received, query string included or not
    pub uri: String,
    pub sources: RawSources,
}

impl DispatchRequest {
    pub fn new(method: Method, uri: &str) -> Self {
        Self {
            request_id: RequestId::new(),
            method,
            uri: uri.to_string(),
            sources: RawSources::new(),
        }
    }

    #[must_use]
    pub fn with_sources(mut self, sources: RawSources) -> Self {
        self.sources = sources;
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }
}

/// How a dispatch was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The resolved route's handler answered
    Handled,
    NotFound,
    MethodNotAllowed,
    /// A parameter failed to bind
    BadRequest,
    /// The handler returned a [`Rejection`]
    Rejected(ErrorRoute),
    /// The handler failed or panicked
    InternalError,
}

impl Disposition {
    /// Error route that answers this disposition, if any.
    #[must_use]
    pub fn error_route(self) -> Option<ErrorRoute> {
        match self {
            Disposition::Handled => None,
            Disposition::NotFound => Some(ErrorRoute::NotFound),
            Disposition::MethodNotAllowed => Some(ErrorRoute::MethodNotAllowed),
            Disposition::BadRequest => Some(ErrorRoute::BadRequest),
            Disposition::Rejected(route) => Some(route),
            Disposition::InternalError => Some(ErrorRoute::InternalError),
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::Handled => f.write_str("handled"),
            Disposition::NotFound => f.write_str("not-found"),
            Disposition::MethodNotAllowed => f.write_str("method-not-allowed"),
            Disposition::BadRequest => f.write_str("bad-request"),
            Disposition::Rejected(route) => write!(f, "rejected({})", route.status()),
            Disposition::InternalError => f.write_str("internal-error"),
        }
    }
}

/// Result of one dispatch, with the originally requested verb and URI kept for
/// observability.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub response: HandlerResponse,
    pub method: Method,
    pub uri: String,
    /// URI of the route that produced `response`
    pub route_uri: String,
    pub disposition: Disposition,
    pub request_id: RequestId,
    pub latency: Duration,
}

/// Resolves, binds and invokes routes from a shared route table.
///
/// Stateless per call: the only shared read is the table snapshot taken at the
/// start of each dispatch.
#[derive(Clone)]
pub struct Dispatcher {
    table: SharedRouteTable,
    app: Option<Arc<AppContext>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(table: SharedRouteTable) -> Self {
        Self { table, app: None }
    }

    /// Make the application container reachable from `context` parameters.
    #[must_use]
    pub fn with_context(mut self, app: Arc<AppContext>) -> Self {
        self.app = Some(app);
        self
    }

    #[must_use]
    pub fn table(&self) -> &SharedRouteTable {
        &self.table
    }

    /// Dispatch a request. Never fails: every failure class is answered by its
    /// error route.
    pub fn dispatch(&self, request: DispatchRequest) -> DispatchOutcome {
        let start = Instant::now();
        let table = self.table.load();
        let DispatchRequest {
            request_id,
            method,
            uri,
            mut sources,
        } = request;

        let mut ctx = RequestContext::new(request_id, method.clone(), &uri).with_app(self.app.clone());
        ctx.headers = sources.headers.clone();

        let mut allow = None;
        let (mut response, route_uri, disposition) =
            match run_stages(&table, &method, &uri, &mut sources, &mut ctx, &mut allow) {
                Ok((route, response)) => (response, route.uri().to_string(), Disposition::Handled),
                Err(disposition) => {
                    let selected = disposition
                        .error_route()
                        .unwrap_or(ErrorRoute::InternalError);
                    let route = table.error(selected);
                    let response = invoke_error_route(&route, &mut ctx);
                    (response, route.uri().to_string(), disposition)
                }
            };

        if let Some(allow) = allow {
            response.set_header("allow", allow);
        }

        let latency = start.elapsed();
        debug!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            route = %route_uri,
            status = response.status,
            disposition = %disposition,
            latency_us = latency.as_micros() as u64,
            "Request dispatched"
        );

        DispatchOutcome {
            response,
            method,
            uri,
            route_uri,
            disposition,
            request_id,
            latency,
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.table.load().len())
            .field("app", &self.app.is_some())
            .finish()
    }
}

fn run_stages(
    table: &RouteTable,
    method: &Method,
    uri: &str,
    sources: &mut RawSources,
    ctx: &mut RequestContext,
    allow: &mut Option<String>,
) -> Result<(Arc<Route>, HandlerResponse), Disposition> {
    let found = lookup(table, uri)?;
    ctx.route = found.route.uri().to_string();
    if let Err(disposition) = check_verb(&found.route, method) {
        *allow = Some(found.route.allow_header());
        ctx.allowed = found.route.methods().to_vec();
        return Err(disposition);
    }
    sources.path = found.path_params;
    let args = bind_args(&found.route, sources, ctx)?;
    let response = invoke(&found.route, args, ctx)?;
    Ok((found.route, response))
}

fn lookup(table: &RouteTable, uri: &str) -> Result<RouteMatch, Disposition> {
    let found = table.resolve(uri);
    if found.matched {
        Ok(found)
    } else {
        Err(Disposition::NotFound)
    }
}

fn check_verb(route: &Route, method: &Method) -> Result<(), Disposition> {
    if route.accepts(method) {
        Ok(())
    } else {
        debug!(
            route = %route.uri(),
            method = %method,
            allowed = ?route.methods(),
            "Method not allowed"
        );
        Err(Disposition::MethodNotAllowed)
    }
}

fn bind_args(
    route: &Route,
    sources: &RawSources,
    ctx: &RequestContext,
) -> Result<Args, Disposition> {
    binder::bind(route.params(), sources, ctx).map_err(|err| {
        warn!(
            request_id = %ctx.request_id,
            route = %route.uri(),
            alias = %err.alias,
            target_type = %err.target_type,
            source = %err.source,
            error = %err,
            "Parameter binding failed"
        );
        Disposition::BadRequest
    })
}

fn invoke(route: &Route, args: Args, ctx: &RequestContext) -> Result<HandlerResponse, Disposition> {
    match catch_unwind(AssertUnwindSafe(|| route.invoke(args))) {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(err)) => match err.downcast_ref::<Rejection>() {
            Some(rejection) => {
                debug!(
                    request_id = %ctx.request_id,
                    action = %route.qualified_name(),
                    route = %rejection.route(),
                    "Handler rejected request"
                );
                Err(Disposition::Rejected(rejection.route()))
            }
            None => {
                error!(
                    request_id = %ctx.request_id,
                    action = %route.qualified_name(),
                    route = %route.uri(),
                    error = %format!("{err:#}"),
                    "Handler failed"
                );
                Err(Disposition::InternalError)
            }
        },
        Err(panic) => {
            error!(
                request_id = %ctx.request_id,
                action = %route.qualified_name(),
                route = %route.uri(),
                panic_message = %panic_message(panic.as_ref()),
                "Handler panicked"
            );
            Err(Disposition::InternalError)
        }
    }
}

/// Error routes see no client parameters: their specs are bound against empty
/// sources, so only context and defaulted specs carry values.
fn invoke_error_route(route: &Route, ctx: &mut RequestContext) -> HandlerResponse {
    ctx.route = route.uri().to_string();
    let Ok(args) = binder::bind(route.params(), &RawSources::new(), ctx) else {
        warn!(route = %route.uri(), "Error route parameters cannot be bound, using built-in response");
        return ErrorRoute::InternalError.fallback_response();
    };
    match invoke(route, args, ctx) {
        Ok(response) => response,
        Err(_) => {
            error!(
                request_id = %ctx.request_id,
                route = %route.uri(),
                "Error route failed, using built-in response"
            );
            ErrorRoute::InternalError.fallback_response()
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
