//! Route matching logic.
//!
//! # Responsibilities
//! - Match parametrized path templates (`/test/call/:one/:two`)
//! - Match regex patterns against the full request path
//! - Match request methods (exact or the `all` wildcard)
//!
//! # Design Decisions
//! - Templates are split into segments once, at registration
//! - Path matching is case-sensitive, method matching is not
//! - Trailing slashes are insignificant for templates
//! - Patterns see the full path, prefix included

use std::collections::HashMap;

use axum::http::Method;
use regex::Regex;

/// Values bound from `:name` segments.
pub type Params = HashMap<String, String>;

/// Trait for matching request paths against a compiled route shape.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns the bound params if the path matches this shape.
    fn matches(&self, path: &str) -> Option<Params>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Matches a `/`-delimited template with `:name` parameter segments.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    template: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Compile a template such as `/test/call/:one/:two`.
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        let segments = split_path(&template)
            .map(|s| match s.strip_prefix(':') {
                Some(name) if !name.is_empty() => Segment::Param(name.to_string()),
                _ => Segment::Literal(s.to_string()),
            })
            .collect();
        Self { template, segments }
    }

    /// The template as registered.
    pub fn as_str(&self) -> &str {
        &self.template
    }
}

impl Matcher for PathTemplate {
    fn matches(&self, path: &str) -> Option<Params> {
        let candidate: Vec<&str> = split_path(path).collect();
        if candidate.len() != self.segments.len() {
            return None;
        }

        let mut params = Params::new();
        for (segment, value) in self.segments.iter().zip(candidate) {
            match segment {
                Segment::Literal(literal) => {
                    if literal != value {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    // `+` is literal in paths; invalid UTF-8 is not a match.
                    let decoded = urlencoding::decode(value).ok()?;
                    params.insert(name.clone(), decoded.into_owned());
                }
            }
        }
        Some(params)
    }
}

/// Matches a regex against the full request path.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    pattern: Regex,
}

impl PatternMatcher {
    pub fn new(pattern: Regex) -> Self {
        Self { pattern }
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

impl Matcher for PatternMatcher {
    fn matches(&self, path: &str) -> Option<Params> {
        self.pattern.is_match(path).then(Params::new)
    }
}

/// The two route shapes, resolved once at registration.
#[derive(Debug, Clone)]
pub enum RouteMatcher {
    Template(PathTemplate),
    Pattern(PatternMatcher),
}

impl RouteMatcher {
    /// Templates outrank patterns when both could match.
    pub fn is_pattern(&self) -> bool {
        matches!(self, RouteMatcher::Pattern(_))
    }

    pub fn describe(&self) -> &str {
        match self {
            RouteMatcher::Template(t) => t.as_str(),
            RouteMatcher::Pattern(p) => p.as_str(),
        }
    }
}

impl Matcher for RouteMatcher {
    fn matches(&self, path: &str) -> Option<Params> {
        match self {
            RouteMatcher::Template(t) => t.matches(path),
            RouteMatcher::Pattern(p) => p.matches(path),
        }
    }
}

/// Which request methods an entry accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    Any,
    Only(Method),
}

impl MethodFilter {
    /// Parse a verb name; `all` (any case) is the wildcard.
    pub fn parse(method: &str) -> Result<Self, axum::http::method::InvalidMethod> {
        if method.eq_ignore_ascii_case("all") {
            return Ok(MethodFilter::Any);
        }
        Method::from_bytes(method.to_ascii_uppercase().as_bytes()).map(MethodFilter::Only)
    }

    pub fn allows(&self, method: &Method) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Only(m) => m == method,
        }
    }
}

impl std::fmt::Display for MethodFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MethodFilter::Any => write!(f, "ALL"),
            MethodFilter::Only(m) => write!(f, "{}", m),
        }
    }
}
