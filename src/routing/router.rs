//! Route and topic registry.
//!
//! # Responsibilities
//! - Store compiled route entries, topics and static mounts
//! - Look up the entry for an HTTP method + path
//! - Look up the entry for a socket topic
//! - Return matched entry or explicit no-match
//!
//! # Design Decisions
//! - Built during a single-threaded configuration phase, then shared
//!   read-only behind an `Arc` while serving
//! - Two precedence tiers: templates (resource actions and ad-hoc routes)
//!   before regex patterns, each tier in registration order. Registration
//!   order is the only tie-breaker callers get
//! - O(n) scan (acceptable for typical route counts)

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use axum::http::Method;

use crate::config::GatewayConfig;
use crate::http::middleware::{Extensions, MiddlewareRequest, MiddlewareStack};
use crate::routing::matcher::{
    Matcher, MethodFilter, Params, PathTemplate, PatternMatcher, RouteMatcher,
};
use crate::routing::resource::{Handler, Resource, UrlSpec};

/// Errors raised while registering routes.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("action '{action}' registered twice on resource '{resource}'")]
    DuplicateAction { resource: String, action: String },
    #[error("topic '{0}' is already registered")]
    DuplicateTopic(String),
    #[error("static mount '{0}' is already registered")]
    DuplicateStatic(String),
    #[error("invalid method '{method}' for '{target}'")]
    InvalidMethod { target: String, method: String },
}

/// A compiled HTTP route.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    /// Canonical id used for permission lookups.
    pub action_id: String,
    /// Topic reported in fault messages.
    pub topic: String,
    pub method: MethodFilter,
    pub matcher: RouteMatcher,
    pub handler: Handler,
}

/// A socket topic binding.
#[derive(Debug, Clone)]
pub struct TopicEntry {
    pub action_id: String,
    pub topic: String,
    pub handler: Handler,
}

/// A directory served under `/<name>/`.
#[derive(Debug, Clone)]
pub struct StaticMount {
    pub name: String,
    pub root: PathBuf,
}

/// Result of a successful route lookup.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub entry: &'a RouteEntry,
    pub params: Params,
}

/// The canonical route table shared by both transports.
#[derive(Debug, Default)]
pub struct Registry {
    api_prefix: String,
    entries: Vec<RouteEntry>,
    topics: HashMap<String, TopicEntry>,
    statics: Vec<StaticMount>,
    middleware: MiddlewareStack,
}

impl Registry {
    /// Create an empty registry. Resource action URLs are joined onto `api_prefix`.
    pub fn new(api_prefix: impl Into<String>) -> Self {
        Self {
            api_prefix: api_prefix.into(),
            ..Self::default()
        }
    }

    /// Create an empty registry using the configured API prefix.
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.http.api_prefix.clone())
    }

    pub fn api_prefix(&self) -> &str {
        &self.api_prefix
    }

    /// Register every action of a resource, plus its static mount.
    pub fn register_resource(&mut self, resource: Resource) -> Result<(), RegistryError> {
        let mut seen = HashSet::new();
        let mut seen_topics = HashSet::new();
        for action in &resource.actions {
            if !seen.insert(action.name.as_str()) {
                return Err(RegistryError::DuplicateAction {
                    resource: resource.name.clone(),
                    action: action.name.clone(),
                });
            }
            let topic = format!(
                "{}.{}",
                resource.name,
                action.topic.as_deref().unwrap_or(&action.name)
            );
            if self.topics.contains_key(&topic) || !seen_topics.insert(topic.clone()) {
                return Err(RegistryError::DuplicateTopic(topic));
            }
            if MethodFilter::parse(&action.method).is_err() {
                return Err(RegistryError::InvalidMethod {
                    target: format!("{}.{}", resource.name, action.name),
                    method: action.method.clone(),
                });
            }
        }
        if let Some(root) = &resource.static_root {
            self.add_static(&resource.name, root.clone())?;
        }

        for action in resource.actions {
            let action_id = format!("{}.{}", resource.name, action.name);
            let topic = format!(
                "{}.{}",
                resource.name,
                action.topic.as_deref().unwrap_or(&action.name)
            );
            let method = MethodFilter::parse(&action.method).map_err(|_| {
                RegistryError::InvalidMethod {
                    target: action_id.clone(),
                    method: action.method.clone(),
                }
            })?;
            let matcher = match action.url {
                Some(UrlSpec::Template(template)) => {
                    RouteMatcher::Template(PathTemplate::new(self.prefixed(&template)))
                }
                Some(UrlSpec::Pattern(pattern)) => {
                    RouteMatcher::Pattern(PatternMatcher::new(pattern))
                }
                None => RouteMatcher::Template(PathTemplate::new(
                    self.prefixed(&format!("/{}/{}", resource.name, action.name)),
                )),
            };

            tracing::debug!(
                action = %action_id,
                topic = %topic,
                method = %method,
                route = %matcher.describe(),
                "Registered action"
            );

            self.topics.insert(
                topic.clone(),
                TopicEntry {
                    action_id: action_id.clone(),
                    topic: topic.clone(),
                    handler: action.handler.clone(),
                },
            );
            self.entries.push(RouteEntry {
                action_id,
                topic,
                method,
                matcher,
                handler: action.handler,
            });
        }
        Ok(())
    }

    /// Register an HTTP route not tied to a resource. `path` is absolute.
    pub fn register_route(
        &mut self,
        path: impl Into<String>,
        method: &str,
        handler: Handler,
    ) -> Result<(), RegistryError> {
        let path = path.into();
        let method = MethodFilter::parse(method).map_err(|_| RegistryError::InvalidMethod {
            target: path.clone(),
            method: method.to_string(),
        })?;
        tracing::debug!(route = %path, method = %method, "Registered route");
        self.entries.push(RouteEntry {
            action_id: path.clone(),
            topic: path.clone(),
            method,
            matcher: RouteMatcher::Template(PathTemplate::new(path)),
            handler,
        });
        Ok(())
    }

    /// Register a socket topic not tied to a resource.
    pub fn register_topic(
        &mut self,
        topic: impl Into<String>,
        handler: Handler,
    ) -> Result<(), RegistryError> {
        let topic = topic.into();
        if self.topics.contains_key(&topic) {
            return Err(RegistryError::DuplicateTopic(topic));
        }
        tracing::debug!(topic = %topic, "Registered topic");
        self.topics.insert(
            topic.clone(),
            TopicEntry {
                action_id: topic.clone(),
                topic,
                handler,
            },
        );
        Ok(())
    }

    /// Mount a static directory under `/<name>/`.
    pub fn add_static(
        &mut self,
        name: &str,
        root: impl Into<PathBuf>,
    ) -> Result<(), RegistryError> {
        if self.statics.iter().any(|m| m.name == name) {
            return Err(RegistryError::DuplicateStatic(name.to_string()));
        }
        self.statics.push(StaticMount {
            name: name.to_string(),
            root: root.into(),
        });
        Ok(())
    }

    /// Run `f` before dispatch for HTTP requests whose path starts with `prefix`.
    pub fn add_middleware<F>(&mut self, prefix: impl Into<String>, f: F)
    where
        F: Fn(&MiddlewareRequest<'_>, &mut Extensions) + Send + Sync + 'static,
    {
        self.middleware.push(prefix, f);
    }

    pub(crate) fn middleware(&self) -> &MiddlewareStack {
        &self.middleware
    }

    /// Find the entry for a request. Templates first, then patterns.
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        let templates = self.entries.iter().filter(|e| !e.matcher.is_pattern());
        let patterns = self.entries.iter().filter(|e| e.matcher.is_pattern());

        templates.chain(patterns).find_map(|entry| {
            if !entry.method.allows(method) {
                return None;
            }
            entry
                .matcher
                .matches(path)
                .map(|params| RouteMatch { entry, params })
        })
    }

    /// Find the binding for a socket topic.
    pub fn match_topic(&self, topic: &str) -> Option<&TopicEntry> {
        self.topics.get(topic)
    }

    /// Resolve a request path to a static mount and the path relative to it.
    pub fn match_static(&self, path: &str) -> Option<(&StaticMount, String)> {
        let trimmed = path.strip_prefix('/')?;
        let (name, rest) = trimmed.split_once('/').unwrap_or((trimmed, ""));
        let mount = self.statics.iter().find(|m| m.name == name)?;
        Some((mount, rest.to_string()))
    }

    pub fn route_count(&self) -> usize {
        self.entries.len()
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    fn prefixed(&self, url: &str) -> String {
        if url.starts_with('/') {
            format!("{}{}", self.api_prefix, url)
        } else {
            format!("{}/{}", self.api_prefix, url)
        }
    }
}
