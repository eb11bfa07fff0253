//! Access policy: required roles per action, anonymous paths, default user.
//!
//! The policy is read on every request and replaced copy-on-write, so
//! readers always see a complete snapshot and never block writers.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::GatewayConfig;

/// One immutable snapshot of the access rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    permissions: HashMap<String, BTreeSet<String>>,
    anonymous: Vec<String>,
    default_user: bool,
}

impl AccessPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            permissions: config
                .permissions
                .iter()
                .map(|(action, roles)| (action.clone(), roles.iter().cloned().collect()))
                .collect(),
            anonymous: config.auth.anonymous.clone(),
            default_user: config.auth.default_user,
        }
    }

    pub fn with_action_roles<I, S>(mut self, action: &str, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions
            .insert(action.to_string(), roles.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_anonymous(mut self, prefix: impl Into<String>) -> Self {
        self.anonymous.push(prefix.into());
        self
    }

    pub fn with_default_user(mut self, enabled: bool) -> Self {
        self.default_user = enabled;
        self
    }

    /// Roles required by an action. `None` or empty means public.
    pub fn required_roles(&self, action_id: &str) -> Option<&BTreeSet<String>> {
        self.permissions.get(action_id).filter(|roles| !roles.is_empty())
    }

    /// Whether a request path falls under an anonymous prefix.
    /// Prefixes match on segment boundaries.
    pub fn is_anonymous_path(&self, path: &str) -> bool {
        self.anonymous.iter().any(|prefix| {
            path == prefix
                || prefix.ends_with('/') && path.starts_with(prefix.as_str())
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    pub fn default_user(&self) -> bool {
        self.default_user
    }
}

/// Shared, atomically swappable holder of the current [`AccessPolicy`].
#[derive(Debug)]
pub struct PolicyStore {
    current: ArcSwap<AccessPolicy>,
}

impl PolicyStore {
    pub fn new(policy: AccessPolicy) -> Self {
        Self {
            current: ArcSwap::from_pointee(policy),
        }
    }

    /// Current snapshot.
    pub fn load(&self) -> Arc<AccessPolicy> {
        self.current.load_full()
    }

    /// Replace the whole policy (config reload).
    pub fn replace(&self, policy: AccessPolicy) {
        self.current.store(Arc::new(policy));
    }

    /// Set the roles of one action without disturbing concurrent readers.
    pub fn set_action_roles<I, S>(&self, action: &str, roles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let roles: BTreeSet<String> = roles.into_iter().map(Into::into).collect();
        self.current.rcu(|current| {
            let mut next = AccessPolicy::clone(current);
            next.permissions.insert(action.to_string(), roles.clone());
            next
        });
    }

    pub fn set_default_user(&self, enabled: bool) {
        self.current.rcu(|current| {
            let mut next = AccessPolicy::clone(current);
            next.default_user = enabled;
            next
        });
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new(AccessPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_roles_mean_public() {
        let policy = AccessPolicy::new()
            .with_action_roles("test.call", ["guest"])
            .with_action_roles("test.open", Vec::<String>::new());

        assert!(policy.required_roles("test.call").unwrap().contains("guest"));
        assert!(policy.required_roles("test.open").is_none());
        assert!(policy.required_roles("test.unknown").is_none());
    }

    #[test]
    fn test_anonymous_prefixes_respect_segments() {
        let policy = AccessPolicy::new()
            .with_anonymous("/api/forward")
            .with_anonymous("/public/");

        assert!(policy.is_anonymous_path("/api/forward"));
        assert!(policy.is_anonymous_path("/api/forward/10/20"));
        assert!(!policy.is_anonymous_path("/api/forwarder"));
        assert!(policy.is_anonymous_path("/public/a.txt"));
        assert!(!policy.is_anonymous_path("/api/test/call"));
    }

    #[test]
    fn test_store_updates_are_visible_to_new_readers_only() {
        let store = PolicyStore::new(AccessPolicy::new());
        let before = store.load();

        store.set_action_roles("test.args", ["user"]);
        store.set_default_user(true);

        assert!(before.required_roles("test.args").is_none());
        assert!(!before.default_user());
        let after = store.load();
        assert!(after.required_roles("test.args").unwrap().contains("user"));
        assert!(after.default_user());
    }

    #[test]
    fn test_from_config() {
        let mut config = GatewayConfig::default();
        config
            .permissions
            .insert("test.call".into(), vec!["admin".into()]);
        config.auth.anonymous.push("/api/forward".into());
        config.auth.default_user = true;

        let policy = AccessPolicy::from_config(&config);
        assert!(policy.required_roles("test.call").unwrap().contains("admin"));
        assert!(policy.is_anonymous_path("/api/forward/1"));
        assert!(policy.default_user());
    }
}
