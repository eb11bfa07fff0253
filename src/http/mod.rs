//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers, request ID)
//!     ├─ websocket path → websocket.rs (handshake auth, session loop)
//!     └─ fallback       → server.rs dispatch_handler
//!            → static mount? stream file
//!            → registry match → middleware/ (extensions)
//!            → authorizer → request.rs (merge data) → invoke
//!            → response.rs (render outcome)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use middleware::{Extensions, MiddlewareRequest};
pub use request::X_REQUEST_ID;
pub use server::{AppState, GatewayServer, ServerError};
