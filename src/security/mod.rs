//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request / socket handshake:
//!     → credentials.rs (parse Authorization: Bearer / Basic)
//!     → provider.rs (resolve token or password to an Identity)
//!     → policy.rs (anonymous paths, required roles, default user)
//!     → authorizer.rs (Allowed | Denied | Unauthenticated)
//!     → Pass to dispatch
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - Provider is a trait object so deployments bring their own user store
//! - Policy is swapped atomically; checks never see a half-applied update

pub mod authorizer;
pub mod credentials;
pub mod policy;
pub mod provider;

pub use authorizer::{Authorizer, Decision, Verdict};
pub use credentials::{basic_authorization, Credential, Presented};
pub use policy::{AccessPolicy, PolicyStore};
pub use provider::{AuthError, AuthProvider, Identity, InMemoryAuthProvider};
