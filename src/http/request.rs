//! Request extraction for the HTTP adapter.
//!
//! # Responsibilities
//! - Read the request ID assigned by the request-id layer
//! - Merge path params, query string and body into `data`
//!
//! # Design Decisions
//! - Later sources override earlier ones: params, then query, then body
//! - A body that is not an object replaces `data` entirely
//! - Unknown content types are passed through as text

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName};
use serde_json::{Map, Value};

use crate::routing::Params;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The request ID set by `SetRequestIdLayer`, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Build the handler-facing `data` value.
pub fn merge_data(
    params: &Params,
    query: Option<&str>,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<Value, serde_json::Error> {
    let mut data = Map::new();
    for (name, value) in params {
        data.insert(name.clone(), Value::String(value.clone()));
    }
    if let Some(query) = query {
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            data.insert(name.into_owned(), Value::String(value.into_owned()));
        }
    }

    if body.is_empty() {
        return Ok(Value::Object(data));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let body_value = if content_type.starts_with("application/json") || content_type.ends_with("+json") {
        serde_json::from_slice(body)?
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        Value::Object(
            url::form_urlencoded::parse(body)
                .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
                .collect(),
        )
    } else {
        Value::String(String::from_utf8_lossy(body).into_owned())
    };

    match body_value {
        Value::Object(fields) => {
            data.extend(fields);
            Ok(Value::Object(data))
        }
        other => Ok(other),
    }
}
