//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Adapter (HTTP or socket) has a matched entry + authorized identity:
//!     → environment.rs (build Environment: data, params, identity, topic)
//!     → invoke.rs (run handler, capture errors and panics)
//!     → Outcome { Reply | Redirect | File | Forwarded }
//!     → Adapter renders the outcome in its wire form
//!
//! Side channels:
//!     forward.rs (nested HTTP request for forward_to)
//!     file.rs (byte streams for files and static mounts)
//! ```
//!
//! # Design Decisions
//! - Fixed user-visible messages live here so both transports agree
//! - A fault never reveals the handler's own error text

pub mod environment;
pub mod file;
pub mod forward;
pub mod invoke;

pub use environment::{
    CookieOptions, CookieSpec, Environment, FileReply, Outcome, ReplySpec, Transport,
};
pub use file::{ByteStream, DiskFileSource, FileError, FileSource};
pub use forward::{ForwardError, ForwardSpec, Forwarder};
pub use invoke::{invoke, HandlerFault};

/// Reply for a role check that did not pass.
pub const DENIED_MESSAGE: &str = "User lacks sufficient permissions";

/// Reply for an unknown route or topic.
pub const NOT_FOUND_MESSAGE: &str = "Not Found";

/// Socket stand-in for a redirect.
pub const MOVED_MESSAGE: &str = "The resource you are trying to reach has moved.";
