use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::binder::HeaderVec;
use crate::router::ErrorRoute;

/// Response data returned by a handler action.
///
/// Uses `SmallVec` for headers to avoid heap allocation in the common case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerResponse {
    /// Status code (200, 404, 500, etc.)
    pub status: u16,
    /// Response headers (stack-allocated for ≤16 headers)
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    /// Response body as JSON
    pub body: Value,
}

impl HandlerResponse {
    /// Create a new response with the given status, headers, and body
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create a JSON response with default headers
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create an error response
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "error": message }))
    }

    /// Get a header by name
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or update a header
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }
}

/// Error a handler returns to select a specific error route.
///
/// ```rust
/// use switchyard::dispatcher::{HandlerResponse, Rejection};
/// use switchyard::router::ErrorRoute;
///
/// fn guarded(token: Option<&str>) -> anyhow::Result<HandlerResponse> {
///     let Some(_token) = token else {
///         return Err(Rejection::new(ErrorRoute::Unauthorized).into());
///     };
///     Ok(HandlerResponse::json(200, serde_json::json!("welcome")))
/// }
///
/// let err = guarded(None).unwrap_err();
/// assert_eq!(err.downcast_ref::<Rejection>().map(Rejection::route), Some(ErrorRoute::Unauthorized));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection(ErrorRoute);

impl Rejection {
    #[must_use]
    pub fn new(route: ErrorRoute) -> Self {
        Self(route)
    }

    #[must_use]
    pub fn route(&self) -> ErrorRoute {
        self.0
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request rejected with {}", self.0)
    }
}

impl std::error::Error for Rejection {}
