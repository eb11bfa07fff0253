//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Socket upgrade accepted
//!     → connection.rs (assign ConnectionId, count session)
//!     → Hand off to the socket adapter
//!
//! Server draining:
//!     → connection.rs (drain signal) → every session closes
//! ```
//!
//! # Design Decisions
//! - Each socket session tracked so graceful shutdown can finish
//! - TCP accept and HTTP framing stay inside axum/hyper

pub mod connection;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
