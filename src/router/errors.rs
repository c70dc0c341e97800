//! Well-known error routes and the handler group that serves them by default.

use http::Method;
use std::fmt;

use crate::binder::{Args, RequestContext};
use crate::dispatcher::HandlerResponse;
use crate::registry::{GroupRoutes, HandlerGroup, Mapping};
use super::types::ParamSpec;

/// Prefix shared by every error route URI.
pub const ERROR_PREFIX: &str = "/error";

/// One of the six failure classes that have a dedicated route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorRoute {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    InternalError,
}

impl ErrorRoute {
    pub const ALL: [ErrorRoute; 6] = [
        ErrorRoute::BadRequest,
        ErrorRoute::Unauthorized,
        ErrorRoute::Forbidden,
        ErrorRoute::NotFound,
        ErrorRoute::MethodNotAllowed,
        ErrorRoute::InternalError,
    ];

    #[must_use]
    pub fn status(self) -> u16 {
        match self {
            ErrorRoute::BadRequest => 400,
            ErrorRoute::Unauthorized => 401,
            ErrorRoute::Forbidden => 403,
            ErrorRoute::NotFound => 404,
            ErrorRoute::MethodNotAllowed => 405,
            ErrorRoute::InternalError => 500,
        }
    }

    /// Fixed table key: `/error/<status>`.
    #[must_use]
    pub fn uri(self) -> &'static str {
        match self {
            ErrorRoute::BadRequest => "/error/400",
            ErrorRoute::Unauthorized => "/error/401",
            ErrorRoute::Forbidden => "/error/403",
            ErrorRoute::NotFound => "/error/404",
            ErrorRoute::MethodNotAllowed => "/error/405",
            ErrorRoute::InternalError => "/error/500",
        }
    }

    #[must_use]
    pub fn reason(self) -> &'static str {
        match self {
            ErrorRoute::BadRequest => "Bad Request",
            ErrorRoute::Unauthorized => "Unauthorized",
            ErrorRoute::Forbidden => "Forbidden",
            ErrorRoute::NotFound => "Not Found",
            ErrorRoute::MethodNotAllowed => "Method Not Allowed",
            ErrorRoute::InternalError => "Internal Server Error",
        }
    }

    #[must_use]
    pub fn from_status(status: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.status() == status)
    }

    /// Response used when even the error route cannot produce one.
    #[must_use]
    pub fn fallback_response(self) -> HandlerResponse {
        HandlerResponse::json(
            self.status(),
            serde_json::json!({ "error": self.reason(), "status": self.status() }),
        )
    }
}

impl fmt::Display for ErrorRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status(), self.reason())
    }
}

/// Verbs accepted by error routes, so a direct request never turns into a 405.
pub(crate) fn all_methods() -> [Method; 8] {
    [
        Method::GET,
        Method::HEAD,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
        Method::TRACE,
    ]
}

/// Handlers for the six error routes, always registered before any other group.
///
/// Applications override a single error response by registering a group that maps
/// the same `/error/<status>` URI; the later registration wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultErrorGroup;

impl DefaultErrorGroup {
    fn respond(&self, route: ErrorRoute) -> anyhow::Result<HandlerResponse> {
        Ok(route.fallback_response())
    }

    fn bad_request(&self, _: Args) -> anyhow::Result<HandlerResponse> {
        self.respond(ErrorRoute::BadRequest)
    }

    fn unauthorized(&self, _: Args) -> anyhow::Result<HandlerResponse> {
        self.respond(ErrorRoute::Unauthorized)
    }

    fn forbidden(&self, _: Args) -> anyhow::Result<HandlerResponse> {
        self.respond(ErrorRoute::Forbidden)
    }

    fn not_found(&self, _: Args) -> anyhow::Result<HandlerResponse> {
        self.respond(ErrorRoute::NotFound)
    }

    fn method_not_allowed(&self, args: Args) -> anyhow::Result<HandlerResponse> {
        let mut response = ErrorRoute::MethodNotAllowed.fallback_response();
        let ctx: RequestContext = args.get("ctx")?;
        if !ctx.allowed.is_empty() {
            let allowed: Vec<&str> = ctx.allowed.iter().map(Method::as_str).collect();
            response.body["allowed"] = serde_json::json!(allowed);
        }
        Ok(response)
    }

    fn internal_error(&self, _: Args) -> anyhow::Result<HandlerResponse> {
        self.respond(ErrorRoute::InternalError)
    }
}

impl HandlerGroup for DefaultErrorGroup {
    fn declare(&self, group: &mut GroupRoutes<Self>) {
        group.prefix(ERROR_PREFIX);
        let handlers: [(&str, ErrorRoute, fn(&Self, Args) -> anyhow::Result<HandlerResponse>); 6] = [
            ("bad_request", ErrorRoute::BadRequest, Self::bad_request),
            ("unauthorized", ErrorRoute::Unauthorized, Self::unauthorized),
            ("forbidden", ErrorRoute::Forbidden, Self::forbidden),
            ("not_found", ErrorRoute::NotFound, Self::not_found),
            (
                "method_not_allowed",
                ErrorRoute::MethodNotAllowed,
                Self::method_not_allowed,
            ),
            ("internal_error", ErrorRoute::InternalError, Self::internal_error),
        ];
        for (name, route, handler) in handlers {
            let suffix = route.status().to_string();
            let action = group
                .action(name, handler)
                .mapping(Mapping::request(&suffix, all_methods()));
            if route == ErrorRoute::MethodNotAllowed {
                action.param(ParamSpec::context("ctx"));
            }
        }
    }
}
