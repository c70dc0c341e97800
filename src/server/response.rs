use may_minihttp::Response;
use serde_json::Value;

use crate::dispatcher::HandlerResponse;

pub(crate) fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        415 => "Unsupported Media Type",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        100..=199 => "Informational",
        200..=299 => "OK",
        300..=399 => "Redirection",
        400..=499 => "Client Error",
        _ => "Server Error",
    }
}

/// `may_minihttp` only takes static header lines, so the content type is
/// mapped onto a fixed set.
fn content_type_line(response: &HandlerResponse) -> &'static str {
    let declared = response
        .get_header("content-type")
        .unwrap_or("application/json")
        .to_ascii_lowercase();
    if declared.starts_with("text/plain") {
        "Content-Type: text/plain"
    } else if declared.starts_with("text/html") {
        "Content-Type: text/html"
    } else {
        "Content-Type: application/json"
    }
}

pub(crate) fn write_handler_response(res: &mut Response, response: &HandlerResponse) {
    res.status_code(usize::from(response.status), status_reason(response.status));
    let content_type = content_type_line(response);
    res.header(content_type);
    match &response.body {
        Value::String(text) if content_type != "Content-Type: application/json" => {
            res.body_vec(text.clone().into_bytes());
        }
        body => res.body_vec(serde_json::to_vec(body).unwrap_or_else(|_| b"null".to_vec())),
    }
}

pub(crate) fn write_error(res: &mut Response, status: u16, message: &str) {
    let body = serde_json::json!({ "error": message, "status": status });
    res.status_code(usize::from(status), status_reason(status));
    res.header("Content-Type: application/json");
    res.body_vec(body.to_string().into_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(404), "Not Found");
        assert_eq!(status_reason(405), "Method Not Allowed");
        assert_eq!(status_reason(418), "Client Error");
        assert_eq!(status_reason(599), "Server Error");
    }

    #[test]
    fn test_content_type_line() {
        let json = HandlerResponse::json(200, Value::Null);
        assert_eq!(content_type_line(&json), "Content-Type: application/json");
        let mut text = HandlerResponse::json(200, Value::String("hi".to_string()));
        text.set_header("content-type", "text/plain; charset=utf-8".to_string());
        assert_eq!(content_type_line(&text), "Content-Type: text/plain");
    }
}
