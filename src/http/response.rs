//! Response rendering for the HTTP adapter.
//!
//! # Responsibilities
//! - Turn a handler [`Outcome`] into an HTTP response
//! - Render cookies as `Set-Cookie` headers
//! - Produce the fixed responses for denial, faults and unknown routes
//!
//! # Design Decisions
//! - Files and forwarded bodies stream; nothing is buffered
//! - Reply headers that cannot be encoded are logged and skipped

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use crate::dispatch::{
    CookieSpec, FileReply, HandlerFault, Outcome, ReplySpec, DENIED_MESSAGE, NOT_FOUND_MESSAGE,
};

/// Render an outcome for an HTTP client.
pub fn render(outcome: Outcome) -> Response {
    match outcome {
        Outcome::Reply(spec) => render_reply(spec),
        Outcome::Redirect { status, location } => redirect(status, &location),
        Outcome::File(file) => render_file(file),
        Outcome::Forwarded(response) => response,
    }
}

fn render_reply(spec: ReplySpec) -> Response {
    let status = spec.status.unwrap_or(StatusCode::OK);
    let mut response = match spec.data {
        Value::String(text) => (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            text,
        )
            .into_response(),
        Value::Null => status.into_response(),
        other => (status, axum::Json(other)).into_response(),
    };

    let headers = response.headers_mut();
    for (name, value) in &spec.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Skipping reply header that cannot be encoded"),
        }
    }
    for (name, cookie) in &spec.cookies {
        match HeaderValue::from_str(&set_cookie(name, cookie)) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(_) => tracing::warn!(cookie = %name, "Skipping cookie that cannot be encoded"),
        }
    }
    response
}

fn redirect(status: StatusCode, location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (status, [(header::LOCATION, value)]).into_response(),
        Err(_) => {
            tracing::warn!(location = %location, "Redirect target cannot be encoded");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn render_file(file: FileReply) -> Response {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        file.filename.replace(['"', '\\'], "_")
    );
    let mut response = Response::new(Body::from_stream(file.stream));
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&file.content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}

/// Format one `Set-Cookie` value.
pub fn set_cookie(name: &str, cookie: &CookieSpec) -> String {
    let value: String = url::form_urlencoded::byte_serialize(cookie.value.as_bytes()).collect();
    let mut out = format!("{}={}", name, value);
    let options = &cookie.options;
    if let Some(max_age) = options.max_age {
        out.push_str(&format!("; Max-Age={}", max_age));
    }
    if let Some(domain) = &options.domain {
        out.push_str(&format!("; Domain={}", domain));
    }
    out.push_str(&format!("; Path={}", options.path.as_deref().unwrap_or("/")));
    if let Some(expires) = options.expires {
        out.push_str(&format!(
            "; Expires={}",
            expires.format("%a, %d %b %Y %H:%M:%S GMT")
        ));
    }
    if options.http_only {
        out.push_str("; HttpOnly");
    }
    if options.secure {
        out.push_str("; Secure");
    }
    out
}

pub fn denied() -> Response {
    (StatusCode::FORBIDDEN, DENIED_MESSAGE).into_response()
}

pub fn not_found() -> Response {
    (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE).into_response()
}

/// 401 with an empty body and a Basic challenge.
pub fn unauthenticated(realm: &str) -> Response {
    let challenge = HeaderValue::from_str(&format!("Basic realm=\"{}\"", realm))
        .unwrap_or_else(|_| HeaderValue::from_static("Basic"));
    (StatusCode::UNAUTHORIZED, [(header::WWW_AUTHENTICATE, challenge)]).into_response()
}

/// 500 for a static file that exists but could not be read.
pub fn static_read_failed(path: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Could not read static file {}", path),
    )
        .into_response()
}

pub fn fault(fault: &HandlerFault) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, fault.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{file, CookieOptions};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_text_reply() {
        let response = render(Outcome::Reply("ta-da!".into()));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(body_text(response).await, "ta-da!");
    }

    #[tokio::test]
    async fn test_json_reply_with_headers_and_cookie() {
        let spec = ReplySpec::new(json!({"ok": true}))
            .status(StatusCode::CREATED)
            .header("test-header", "look a header value!")
            .cookie("session", CookieSpec::new("a b"));
        let response = render(Outcome::Reply(spec));
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["test-header"], "look a header value!");
        assert_eq!(
            response.headers()[header::SET_COOKIE],
            "session=a+b; Path=/"
        );
        assert_eq!(body_text(response).await, r#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn test_static_read_failure_has_body() {
        let response = static_read_failed("txt/hello.txt");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(body_text(response).await, "Could not read static file txt/hello.txt");
    }

    #[test]
    fn test_cookie_options() {
        let cookie = CookieSpec::new("v").options(CookieOptions {
            expires: Some(Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap()),
            path: Some("/api".into()),
            domain: Some("example.com".into()),
            max_age: None,
            http_only: true,
            secure: false,
        });
        assert_eq!(
            set_cookie("c", &cookie),
            "c=v; Domain=example.com; Path=/api; Expires=Wed, 21 Oct 2015 07:28:00 GMT; HttpOnly"
        );
    }

    #[test]
    fn test_redirect() {
        let response = render(Outcome::Redirect {
            status: StatusCode::FOUND,
            location: "/elsewhere".into(),
        });
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/elsewhere");
    }

    #[tokio::test]
    async fn test_file_reply() {
        let response = render(Outcome::File(FileReply {
            content_type: "text/plain".into(),
            filename: "hello.txt".into(),
            stream: file::from_bytes("hello, world!"),
        }));
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"hello.txt\""
        );
        assert_eq!(body_text(response).await, "hello, world!");
    }

    #[tokio::test]
    async fn test_fixed_responses() {
        let response = denied();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_text(response).await, DENIED_MESSAGE);

        let response = unauthenticated("action-gateway");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            "Basic realm=\"action-gateway\""
        );
        assert_eq!(body_text(response).await, "");

        let response = fault(&HandlerFault {
            topic: "test.error".into(),
        });
        assert_eq!(body_text(response).await, "Server error at topic test.error");
    }
}
