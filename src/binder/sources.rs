use http::Method;
use serde_json::Value;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

use crate::bootstrap::AppContext;
use crate::ids::RequestId;
use crate::router::ParamVec;

/// Maximum inline headers before heap allocation.
/// Most requests have ≤16 headers.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage; names are lower-cased by the transports.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// A file received with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Form field the file was sent under
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Parsed request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    #[default]
    Empty,
    Json(Value),
    /// `application/x-www-form-urlencoded` pairs in arrival order
    Form(Vec<(String, String)>),
    Text(String),
}

/// Everything a transport extracted from one request.
#[derive(Debug, Clone, Default)]
pub struct RawSources {
    /// Filled by the dispatcher from the matched route template
    pub path: ParamVec,
    /// Query pairs in arrival order; repeated keys are kept
    pub query: ParamVec,
    pub headers: HeaderVec,
    pub body: Body,
    pub files: Vec<UploadedFile>,
}

impl RawSources {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a query string (with or without the leading `?`).
    #[must_use]
    pub fn with_query_string(mut self, query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        self.query.extend(
            url::form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned())),
        );
        self
    }

    #[must_use]
    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query.push((Arc::from(name), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .push((Arc::from(name.to_ascii_lowercase()), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    #[must_use]
    pub fn with_json(self, value: Value) -> Self {
        self.with_body(Body::Json(value))
    }

    #[must_use]
    pub fn with_file(mut self, file: UploadedFile) -> Self {
        self.files.push(file);
        self
    }

    /// First header value with `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Ambient request state handed to `context` parameters.
#[derive(Clone)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub method: Method,
    /// URI as received
    pub uri: String,
    /// URI of the route being invoked
    pub route: String,
    pub headers: HeaderVec,
    /// Verbs the matched route accepts, filled when the request used another one
    pub allowed: Vec<Method>,
    app: Option<Arc<AppContext>>,
}

impl RequestContext {
    pub fn new(request_id: RequestId, method: Method, uri: &str) -> Self {
        Self {
            request_id,
            method,
            uri: uri.to_string(),
            route: String::new(),
            headers: HeaderVec::new(),
            allowed: Vec::new(),
            app: None,
        }
    }

    #[must_use]
    pub fn with_app(mut self, app: Option<Arc<AppContext>>) -> Self {
        self.app = app;
        self
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Application container, when dispatching inside a booted application.
    #[must_use]
    pub fn app(&self) -> Option<&Arc<AppContext>> {
        self.app.as_ref()
    }

    /// Shared component of type `T` from the application container.
    #[must_use]
    pub fn component<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.app.as_ref().and_then(|app| app.get::<T>())
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("route", &self.route)
            .finish_non_exhaustive()
    }
}
