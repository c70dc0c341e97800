//! Mapping of transport input into [`DispatchRequest`]s.

use http::Method;
use may_minihttp::Request;
use serde_json::Value;
use std::io::Read;
use std::sync::Arc;
use tracing::debug;

use crate::binder::{Body, HeaderVec, RawSources};
use crate::dispatcher::DispatchRequest;
use crate::ids::RequestId;

/// Split a request target into path and query string.
#[must_use]
pub fn split_target(target: &str) -> (&str, &str) {
    match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    }
}

/// Interpret raw body bytes according to the content type.
///
/// Form-encoded bodies become ordered pairs; JSON (declared, or undeclared but
/// parseable) becomes a JSON value; anything else is kept as text.
#[must_use]
pub fn parse_body(content_type: Option<&str>, bytes: &[u8]) -> Body {
    if bytes.is_empty() {
        return Body::Empty;
    }
    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
    if content_type.starts_with("application/x-www-form-urlencoded") {
        return Body::Form(
            url::form_urlencoded::parse(bytes)
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        );
    }
    let json_like = content_type.is_empty() || content_type.contains("json");
    if json_like {
        if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
            return Body::Json(value);
        }
    }
    Body::Text(String::from_utf8_lossy(bytes).into_owned())
}

/// Build sources and the dispatch request from already-extracted parts.
pub(crate) fn build_request(
    method: Method,
    target: &str,
    headers: HeaderVec,
    body: Body,
) -> DispatchRequest {
    let (path, query) = split_target(target);
    let request_id = RequestId::from_headers(&headers);
    let sources = RawSources {
        headers,
        body,
        ..RawSources::new()
    }
    .with_query_string(query);
    DispatchRequest::new(method, path)
        .with_request_id(request_id)
        .with_sources(sources)
}

/// Extract method, target, headers and body from a `may_minihttp` request.
///
/// The body is read last since reading it consumes the request.
pub(crate) fn parse_request(req: Request) -> Result<DispatchRequest, String> {
    let method = Method::from_bytes(req.method().as_bytes())
        .map_err(|err| format!("invalid method {:?}: {err}", req.method()))?;
    let target = req.path().to_string();

    let mut headers = HeaderVec::new();
    for header in req.headers() {
        headers.push((
            Arc::from(header.name.to_ascii_lowercase()),
            String::from_utf8_lossy(header.value).into_owned(),
        ));
    }
    let content_type = headers
        .iter()
        .find(|(k, _)| k.as_ref() == "content-type")
        .map(|(_, v)| v.clone());

    let mut bytes = Vec::new();
    req.body()
        .read_to_end(&mut bytes)
        .map_err(|err| format!("failed to read request body: {err}"))?;
    let body = parse_body(content_type.as_deref(), &bytes);

    debug!(
        method = %method,
        target = %target,
        header_count = headers.len(),
        body_bytes = bytes.len(),
        "HTTP request parsed"
    );
    Ok(build_request(method, &target, headers, body))
}
