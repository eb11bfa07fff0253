//! The per-request environment handed to handlers, and what they return.
//!
//! # Responsibilities
//! - Expose transport-neutral request data (`data`, `params`, identity)
//! - Produce exactly one [`Outcome`] per request
//!
//! # Design Decisions
//! - Output methods take `self`; a second reply cannot be written
//! - `transport()` is an explicit capability flag so handlers can branch
//! - Adapters decide the wire form of every outcome

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::dispatch::file::ByteStream;
use crate::dispatch::forward::{ForwardError, ForwardSpec, Forwarder, OutboundRequest};
use crate::http::middleware::Extensions;
use crate::routing::Params;
use crate::security::Identity;

/// Which adapter delivered the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Http,
    WebSocket,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Http => "http",
            Transport::WebSocket => "websocket",
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cookie attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    pub expires: Option<DateTime<Utc>>,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub max_age: Option<i64>,
    pub http_only: bool,
    pub secure: bool,
}

/// A cookie to set on an HTTP reply. Dropped over the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSpec {
    pub value: String,
    pub options: CookieOptions,
}

impl CookieSpec {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            options: CookieOptions::default(),
        }
    }

    pub fn options(mut self, options: CookieOptions) -> Self {
        self.options = options;
        self
    }
}

/// Payload plus metadata for [`Environment::reply`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReplySpec {
    pub data: Value,
    /// HTTP status; ignored over the socket.
    pub status: Option<StatusCode>,
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, CookieSpec>,
}

impl ReplySpec {
    pub fn new(data: impl Into<Value>) -> Self {
        Self {
            data: data.into(),
            status: None,
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
        }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, cookie: CookieSpec) -> Self {
        self.cookies.insert(name.into(), cookie);
        self
    }
}

impl From<&str> for ReplySpec {
    fn from(data: &str) -> Self {
        Self::new(data)
    }
}

impl From<String> for ReplySpec {
    fn from(data: String) -> Self {
        Self::new(data)
    }
}

impl From<Value> for ReplySpec {
    fn from(data: Value) -> Self {
        Self::new(data)
    }
}

/// A file streamed back to the caller.
pub struct FileReply {
    pub content_type: String,
    pub filename: String,
    pub stream: ByteStream,
}

/// The single result of a handler.
pub enum Outcome {
    Reply(ReplySpec),
    Redirect { status: StatusCode, location: String },
    File(FileReply),
    /// Upstream response from `forward_to`, passed through verbatim.
    Forwarded(Response),
}

impl Outcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Reply(_) => "reply",
            Outcome::Redirect { .. } => "redirect",
            Outcome::File(_) => "file",
            Outcome::Forwarded(_) => "forwarded",
        }
    }
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Reply(spec) => f.debug_tuple("Reply").field(spec).finish(),
            Outcome::Redirect { status, location } => f
                .debug_struct("Redirect")
                .field("status", status)
                .field("location", location)
                .finish(),
            Outcome::File(file) => f
                .debug_struct("File")
                .field("content_type", &file.content_type)
                .field("filename", &file.filename)
                .finish_non_exhaustive(),
            Outcome::Forwarded(response) => {
                f.debug_tuple("Forwarded").field(&response.status()).finish()
            }
        }
    }
}

/// Request state visible to a handler.
///
/// Built by the transport adapters; never shared between requests.
#[derive(Debug)]
pub struct Environment {
    pub(crate) transport: Transport,
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) path: String,
    pub(crate) data: Value,
    pub(crate) params: Params,
    pub(crate) extensions: Extensions,
    pub(crate) headers: HeaderMap,
    pub(crate) identity: Option<Identity>,
    pub(crate) topic: String,
    pub(crate) action_id: String,
    pub(crate) request_id: String,
    pub(crate) body: Bytes,
    pub(crate) forwarder: Option<Forwarder>,
}

impl Environment {
    pub(crate) fn new(
        transport: Transport,
        action_id: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            method: Method::GET,
            url: String::new(),
            path: String::new(),
            data: Value::Null,
            params: Params::new(),
            extensions: Extensions::new(),
            headers: HeaderMap::new(),
            identity: None,
            topic: topic.into(),
            action_id: action_id.into(),
            request_id: String::new(),
            body: Bytes::new(),
            forwarder: None,
        }
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request target including the query string. Empty over the socket.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Merged request data: path params, query, then body over HTTP;
    /// the message `data` over the socket.
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// A value injected by pre-dispatch middleware.
    pub fn extension(&self, name: &str) -> Option<&Value> {
        self.extensions.get(name)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The caller, when one was identified.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn action_id(&self) -> &str {
        &self.action_id
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn reply(self, spec: impl Into<ReplySpec>) -> Outcome {
        Outcome::Reply(spec.into())
    }

    /// Temporary redirect (302).
    pub fn redirect(self, location: impl Into<String>) -> Outcome {
        self.redirect_with(StatusCode::FOUND, location)
    }

    /// Redirect with an explicit 3xx status; anything else becomes 302.
    pub fn redirect_with(self, status: StatusCode, location: impl Into<String>) -> Outcome {
        let status = if status.is_redirection() {
            status
        } else {
            StatusCode::FOUND
        };
        Outcome::Redirect {
            status,
            location: location.into(),
        }
    }

    pub fn reply_with_file(
        self,
        content_type: impl Into<String>,
        filename: impl Into<String>,
        stream: ByteStream,
    ) -> Outcome {
        Outcome::File(FileReply {
            content_type: content_type.into(),
            filename: filename.into(),
            stream,
        })
    }

    /// Re-send this request to `spec.url` and reply with the upstream response.
    ///
    /// Only available over HTTP; check [`Environment::transport`] first.
    pub async fn forward_to(self, spec: ForwardSpec) -> Result<Outcome, ForwardError> {
        let forwarder = match (self.transport, self.forwarder) {
            (Transport::Http, Some(forwarder)) => forwarder,
            _ => return Err(ForwardError::UnsupportedTransport),
        };
        let original = OutboundRequest {
            method: self.method,
            headers: self.headers,
            body: self.body,
        };
        forwarder
            .forward(original, spec)
            .await
            .map(Outcome::Forwarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reply_spec_from() {
        let spec: ReplySpec = "ta-da!".into();
        assert_eq!(spec.data, json!("ta-da!"));

        let spec = ReplySpec::new(json!({"a": 1}))
            .header("test-header", "look a header value!")
            .cookie("c", CookieSpec::new("v"));
        assert_eq!(spec.headers["test-header"], "look a header value!");
        assert_eq!(spec.cookies["c"].value, "v");
    }

    #[test]
    fn test_redirect_status_falls_back_to_found() {
        let env = Environment::new(Transport::Http, "test.thing", "test.thing");
        match env.redirect_with(StatusCode::OK, "/elsewhere") {
            Outcome::Redirect { status, location } => {
                assert_eq!(status, StatusCode::FOUND);
                assert_eq!(location, "/elsewhere");
            }
            other => panic!("unexpected {:?}", other),
        }

        let env = Environment::new(Transport::Http, "test.thing", "test.thing");
        match env.redirect_with(StatusCode::MOVED_PERMANENTLY, "/x") {
            Outcome::Redirect { status, .. } => assert_eq!(status, StatusCode::MOVED_PERMANENTLY),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_forward_over_socket_is_unsupported() {
        let mut env = Environment::new(Transport::WebSocket, "test.proxy", "test.proxy");
        env.forwarder = Some(Forwarder::new(std::time::Duration::from_secs(1)));
        let err = env
            .forward_to(ForwardSpec::new("http://localhost/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ForwardError::UnsupportedTransport));
    }

    #[test]
    fn test_accessors() {
        let mut env = Environment::new(Transport::Http, "test.call", "test.call");
        env.params.insert("one".into(), "10".into());
        env.extensions.insert("preparsed".into(), json!(true));
        assert_eq!(env.param("one"), Some("10"));
        assert_eq!(env.param("two"), None);
        assert_eq!(env.extension("preparsed"), Some(&json!(true)));
        assert_eq!(env.transport().as_str(), "http");
        assert_eq!(env.reply("x").kind(), "reply");
    }
}
