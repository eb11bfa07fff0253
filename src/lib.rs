//! Action dispatch gateway.
//!
//! One route table serves two transports: request/response HTTP and
//! persistent WebSocket sessions. Every request resolves to a named action
//! (`resource.action`), is authorized against the action's required roles,
//! runs its handler, and is rendered back in the transport's own shape.
//!
//! ```no_run
//! use std::sync::Arc;
//! use action_gateway::config::GatewayConfig;
//! use action_gateway::http::GatewayServer;
//! use action_gateway::routing::{Action, Handler, Registry, Resource};
//! use action_gateway::security::InMemoryAuthProvider;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::default();
//! let mut registry = Registry::from_config(&config);
//! registry.register_resource(
//!     Resource::new("test").action(
//!         Action::new("call", Handler::new(|env| async move { Ok(env.reply("ta-da!")) }))
//!             .url("/test/call/:one/:two"),
//!     ),
//! )?;
//!
//! let provider = Arc::new(InMemoryAuthProvider::new());
//! let server = GatewayServer::new(config, registry, provider);
//! # let _ = server;
//! # Ok(())
//! # }
//! ```

// Core subsystems
pub mod config;
pub mod dispatch;
pub mod http;
pub mod net;
pub mod routing;
pub mod security;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use dispatch::{Environment, Outcome, Transport};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use routing::{Action, Handler, Registry, Resource};
