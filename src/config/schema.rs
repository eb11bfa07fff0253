//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the action gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// HTTP transport settings.
    pub http: HttpConfig,

    /// Socket transport settings.
    pub websocket: WebSocketConfig,

    /// Authentication behaviour.
    pub auth: AuthConfig,

    /// Required roles per canonical action id (`resource.action`).
    pub permissions: BTreeMap<String, Vec<String>>,

    /// Users seeded into the bundled in-memory provider.
    pub users: Vec<UserConfig>,

    /// Directories served as static resources.
    pub static_files: Vec<StaticConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Security hardening.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// HTTP transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Prefix prepended to every resource action URL. Empty disables it.
    pub api_prefix: String,

    /// Expose matched path params to pre-dispatch middleware.
    pub parse_ahead: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            api_prefix: "/api".to_string(),
            parse_ahead: false,
        }
    }
}

/// Socket transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Accept socket connections at all.
    pub enabled: bool,

    /// Upgrade endpoint path.
    pub path: String,

    /// Maximum bytes carried by one file data frame.
    pub frame_chunk_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/websocket".to_string(),
            frame_chunk_size: 16 * 1024,
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Path prefixes exempt from authentication.
    pub anonymous: Vec<String>,

    /// Resolve requests without any credential to the anonymous identity.
    pub default_user: bool,

    /// Realm advertised in `WWW-Authenticate`.
    pub realm: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            anonymous: Vec::new(),
            default_user: false,
            realm: "action-gateway".to_string(),
        }
    }
}

/// A user seeded into the in-memory provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserConfig {
    pub name: String,

    #[serde(default)]
    pub password: Option<String>,

    /// Bearer tokens resolving to this user.
    #[serde(default)]
    pub tokens: Vec<String>,

    #[serde(default)]
    pub roles: Vec<String>,
}

/// A static directory mounted as `/<name>/...`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticConfig {
    pub name: String,
    pub root: String,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Deadline for the nested call made by a forwarding handler.
    pub forward_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            forward_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}
