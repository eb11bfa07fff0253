//! Startup orchestration.
//!
//! # Responsibilities
//! - Seed the in-memory provider from `[[users]]`
//! - Build the registry holding the configured static mounts
//! - Bind the listener
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use tokio::net::TcpListener;

use crate::config::{GatewayConfig, UserConfig};
use crate::routing::{Registry, RegistryError};
use crate::security::InMemoryAuthProvider;

/// Build a provider holding every configured user and token.
pub fn seed_provider(users: &[UserConfig]) -> InMemoryAuthProvider {
    let provider = InMemoryAuthProvider::new();
    for user in users {
        provider.add_user(&user.name, user.password.as_deref(), None, user.roles.iter().cloned());
        for token in &user.tokens {
            provider.add_token(token, &user.name);
        }
    }
    tracing::info!(users = provider.user_count(), "Seeded authentication provider");
    provider
}

/// A registry with the configured API prefix and static mounts.
pub fn static_registry(config: &GatewayConfig) -> Result<Registry, RegistryError> {
    let mut registry = Registry::from_config(config);
    for mount in &config.static_files {
        registry.add_static(&mount.name, &mount.root)?;
        tracing::info!(name = %mount.name, root = %mount.root, "Mounted static directory");
    }
    Ok(registry)
}

pub async fn bind(config: &GatewayConfig) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");
    Ok(listener)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticConfig;
    use crate::security::AuthProvider;

    #[tokio::test]
    async fn test_seed_provider() {
        let users = vec![UserConfig {
            name: "userman".into(),
            password: Some("hi".into()),
            tokens: vec!["blorp".into(), "other".into()],
            roles: vec!["guest".into()],
        }];
        let provider = seed_provider(&users);

        assert_eq!(provider.user_count(), 1);
        for token in ["blorp", "other"] {
            let identity = provider.resolve_token(token).await.unwrap().unwrap();
            assert_eq!(identity.name, "userman");
        }
        assert!(provider.verify_password("userman", "hi").await.unwrap().is_some());
    }

    #[test]
    fn test_static_registry() {
        let mut config = GatewayConfig::default();
        config.static_files.push(StaticConfig {
            name: "assets".into(),
            root: "./public".into(),
        });
        let registry = static_registry(&config).unwrap();
        assert!(registry.match_static("/assets/app.js").is_some());
        assert_eq!(registry.route_count(), 0);
    }
}
