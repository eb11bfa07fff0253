//! Outbound forwarding for `Environment::forward_to`.
//!
//! # Responsibilities
//! - Re-issue the current HTTP request against another URL
//! - Strip hop-by-hop headers, apply URL credentials and header overrides
//! - Return the upstream response untouched
//!
//! # Design Decisions
//! - The nested call is an independent client request, never a re-entrant
//!   dispatch, so it cannot deadlock with the inbound connection
//! - No retries: one attempt, bounded by `timeouts.forward_secs`

use std::collections::BTreeMap;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request};
use axum::response::Response;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use url::Url;

use crate::security::basic_authorization;

/// Where and how to forward.
#[derive(Debug, Clone, Default)]
pub struct ForwardSpec {
    pub url: String,
    /// Overrides the original method when set.
    pub method: Option<Method>,
    /// Added to (and overriding) the original headers.
    pub headers: BTreeMap<String, String>,
}

impl ForwardSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("forwarding is only available over HTTP")]
    UnsupportedTransport,
    #[error("invalid forward url '{0}'")]
    InvalidUrl(String),
    #[error("invalid header '{0}'")]
    InvalidHeader(String),
    #[error("upstream request failed: {0}")]
    Upstream(String),
    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),
}

const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
];

/// The original request as the forwarder needs it.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Shared HTTP client used for forwarding.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Forwarder {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client, timeout }
    }

    /// Send `original` to `spec.url` and return the upstream response.
    pub async fn forward(
        &self,
        original: OutboundRequest,
        spec: ForwardSpec,
    ) -> Result<Response, ForwardError> {
        let request = build_request(original, &spec)?;
        tracing::debug!(url = %spec.url, method = %request.method(), "Forwarding request");

        let response: hyper::Response<hyper::body::Incoming> =
            tokio::time::timeout(self.timeout, self.client.request(request))
                .await
                .map_err(|_| ForwardError::Timeout(self.timeout))?
                .map_err(|e| ForwardError::Upstream(e.to_string()))?;

        let (parts, body) = response.into_parts();
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

fn build_request(
    original: OutboundRequest,
    spec: &ForwardSpec,
) -> Result<Request<Body>, ForwardError> {
    let mut url = Url::parse(&spec.url).map_err(|_| ForwardError::InvalidUrl(spec.url.clone()))?;
    if url.scheme() != "http" {
        return Err(ForwardError::InvalidUrl(spec.url.clone()));
    }

    let mut headers = original.headers;
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers.remove(header::CONTENT_LENGTH);

    if !url.username().is_empty() {
        let invalid = |_| ForwardError::InvalidUrl(spec.url.clone());
        let name = urlencoding::decode(url.username()).map_err(invalid)?;
        let password = urlencoding::decode(url.password().unwrap_or("")).map_err(invalid)?;
        let value = HeaderValue::from_str(&basic_authorization(&name, &password))
            .map_err(|_| ForwardError::InvalidHeader(header::AUTHORIZATION.to_string()))?;
        headers.insert(header::AUTHORIZATION, value);
        // Userinfo never goes on the wire in the request target.
        let _ = url.set_username("");
        let _ = url.set_password(None);
    }

    for (name, value) in &spec.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ForwardError::InvalidHeader(name.clone()))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| ForwardError::InvalidHeader(name.to_string()))?;
        headers.insert(name, value);
    }

    let method = spec.method.clone().unwrap_or(original.method);
    let mut builder = Request::builder().method(method).uri(url.as_str());
    if let Some(target) = builder.headers_mut() {
        target.extend(headers);
    }
    builder
        .body(Body::from(original.body))
        .map_err(|_| ForwardError::InvalidUrl(spec.url.clone()))
}
