//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Configuration phase:
//!     Resource { actions } / ad-hoc route / ad-hoc topic
//!     → resource.rs (Action, Handler)
//!     → router.rs (compile matchers, derive action ids and topics)
//!     → Registry frozen behind Arc
//!
//! Serving phase:
//!     HTTP (method, path)   → router.rs match_route → RouteMatch { entry, params }
//!     Socket (topic)        → router.rs match_topic → TopicEntry
//!     matcher.rs evaluates templates / patterns / methods
//! ```
//!
//! # Design Decisions
//! - Routes compiled at registration, immutable at runtime
//! - Deterministic: same input always matches same route
//! - One canonical table for both transports

pub mod matcher;
pub mod resource;
pub mod router;

pub use matcher::{Matcher, MethodFilter, Params};
pub use resource::{Action, Handler, HandlerError, HandlerResult, Resource, UrlSpec};
pub use router::{Registry, RegistryError, RouteEntry, RouteMatch, StaticMount, TopicEntry};
