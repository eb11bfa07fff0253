//! Resources, actions and handlers as registered by the application.
//!
//! A [`Resource`] groups named [`Action`]s. Each action carries the
//! user-supplied [`Handler`] plus the method, URL shape and topic used to
//! reach it from either transport.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use regex::Regex;

use crate::dispatch::{Environment, Outcome};

/// Error type handlers may return; anything `?`-able works.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result every handler resolves to.
pub type HandlerResult = Result<Outcome, HandlerError>;

type HandlerFn = dyn Fn(Environment) -> BoxFuture<'static, HandlerResult> + Send + Sync;

/// A shareable, type-erased async handler.
#[derive(Clone)]
pub struct Handler(Arc<HandlerFn>);

impl Handler {
    /// Wrap an async closure taking the request [`Environment`].
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Environment) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self(Arc::new(move |env| Box::pin(f(env))))
    }

    pub(crate) fn call(&self, env: Environment) -> BoxFuture<'static, HandlerResult> {
        (self.0)(env)
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Handler")
    }
}

/// How an action is addressed over HTTP.
#[derive(Debug, Clone)]
pub enum UrlSpec {
    /// `/`-delimited template with `:name` segments, relative to the API prefix.
    Template(String),
    /// Regex evaluated against the full request path.
    Pattern(Regex),
}

/// One routable operation.
#[derive(Debug, Clone)]
pub struct Action {
    pub(crate) name: String,
    pub(crate) method: String,
    pub(crate) url: Option<UrlSpec>,
    pub(crate) topic: Option<String>,
    pub(crate) handler: Handler,
}

impl Action {
    /// A `GET` action reachable at `/<resource>/<name>` and topic `<resource>.<name>`.
    pub fn new(name: impl Into<String>, handler: Handler) -> Self {
        Self {
            name: name.into(),
            method: "get".to_string(),
            url: None,
            topic: None,
            handler,
        }
    }

    /// HTTP verb, or `all`.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Path template relative to the API prefix.
    pub fn url(mut self, template: impl Into<String>) -> Self {
        self.url = Some(UrlSpec::Template(template.into()));
        self
    }

    /// Regex matched against the full request path.
    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.url = Some(UrlSpec::Pattern(pattern));
        self
    }

    /// Topic suffix; the full topic becomes `<resource>.<topic>`.
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A named grouping of actions, optionally serving a static directory.
#[derive(Debug, Clone)]
pub struct Resource {
    pub(crate) name: String,
    pub(crate) actions: Vec<Action>,
    pub(crate) static_root: Option<PathBuf>,
}

impl Resource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
            static_root: None,
        }
    }

    /// Add an action. Insertion order is match precedence.
    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Serve files from `root` under `/<resource>/...`.
    pub fn static_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.static_root = Some(root.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
