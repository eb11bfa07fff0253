//! Pre-dispatch middleware.
//!
//! Functions registered with [`crate::routing::Registry::add_middleware`]
//! run for HTTP requests whose path starts with their prefix, after the
//! route is matched and before authorization. They can only add
//! extension values to the environment; they never decide access.

use std::sync::Arc;

use axum::http::{HeaderMap, Method};
use serde_json::Value;

use crate::routing::Params;

/// Values injected into the environment by middleware.
pub type Extensions = serde_json::Map<String, Value>;

/// Read-only view of the request given to middleware.
#[derive(Debug, Clone, Copy)]
pub struct MiddlewareRequest<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub headers: &'a HeaderMap,
    /// Matched route params, present when `http.parse_ahead` is on.
    pub preparams: Option<&'a Params>,
}

type MiddlewareFn = dyn Fn(&MiddlewareRequest<'_>, &mut Extensions) + Send + Sync;

struct Entry {
    prefix: String,
    f: Arc<MiddlewareFn>,
}

/// Ordered middleware list.
#[derive(Default)]
pub struct MiddlewareStack {
    entries: Vec<Entry>,
}

impl std::fmt::Debug for MiddlewareStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| &e.prefix))
            .finish()
    }
}

impl MiddlewareStack {
    pub fn push<F>(&mut self, prefix: impl Into<String>, f: F)
    where
        F: Fn(&MiddlewareRequest<'_>, &mut Extensions) + Send + Sync + 'static,
    {
        self.entries.push(Entry {
            prefix: prefix.into(),
            f: Arc::new(f),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every applicable middleware in registration order.
    pub fn apply(&self, request: &MiddlewareRequest<'_>) -> Extensions {
        let mut extensions = Extensions::new();
        for entry in &self.entries {
            if request.path.starts_with(&entry.prefix) {
                (entry.f)(request, &mut extensions);
            }
        }
        extensions
    }
}
