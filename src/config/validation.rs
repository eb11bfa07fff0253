//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, chunk sizes > 0)
//! - Check path shapes (prefixes, endpoints, anonymous paths)
//! - Detect duplicate users
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use crate::config::schema::GatewayConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let prefix = &config.http.api_prefix;
    if !prefix.is_empty() && (!prefix.starts_with('/') || prefix.ends_with('/')) {
        errors.push(ValidationError::new(
            "http.api_prefix",
            "must be empty or start with '/' and not end with '/'",
        ));
    }

    if !config.websocket.path.starts_with('/') {
        errors.push(ValidationError::new("websocket.path", "must start with '/'"));
    }
    if config.websocket.frame_chunk_size == 0 {
        errors.push(ValidationError::new(
            "websocket.frame_chunk_size",
            "must be greater than zero",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than zero"));
    }
    if config.timeouts.forward_secs == 0 {
        errors.push(ValidationError::new("timeouts.forward_secs", "must be greater than zero"));
    }

    for (i, path) in config.auth.anonymous.iter().enumerate() {
        if !path.starts_with('/') {
            errors.push(ValidationError::new(
                format!("auth.anonymous[{}]", i),
                format!("'{}' must start with '/'", path),
            ));
        }
    }

    let mut seen = HashSet::new();
    for (i, user) in config.users.iter().enumerate() {
        if user.name.is_empty() {
            errors.push(ValidationError::new(format!("users[{}].name", i), "must not be empty"));
        } else if !seen.insert(user.name.as_str()) {
            errors.push(ValidationError::new(
                format!("users[{}].name", i),
                format!("duplicate user '{}'", user.name),
            ));
        }
    }

    for (i, mount) in config.static_files.iter().enumerate() {
        if mount.name.is_empty() || mount.name.contains('/') {
            errors.push(ValidationError::new(
                format!("static_files[{}].name", i),
                "must be a single non-empty path segment",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::UserConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_error() {
        let mut config = GatewayConfig::default();
        config.http.api_prefix = "api/".into();
        config.websocket.frame_chunk_size = 0;
        config.auth.anonymous.push("forward".into());
        for _ in 0..2 {
            config.users.push(UserConfig {
                name: "dup".into(),
                password: None,
                tokens: vec![],
                roles: vec![],
            });
        }

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "http.api_prefix",
                "websocket.frame_chunk_size",
                "auth.anonymous[0]",
                "users[1].name",
            ]
        );
    }

    #[test]
    fn empty_prefix_disables_prefixing() {
        let mut config = GatewayConfig::default();
        config.http.api_prefix = String::new();
        assert!(validate_config(&config).is_ok());
    }
}
