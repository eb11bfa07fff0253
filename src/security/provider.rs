//! Authentication provider seam and the bundled in-memory provider.
//!
//! # Responsibilities
//! - Map bearer tokens and name/password pairs to identities
//! - Report the current role set of an identity
//! - Decide whether a role set satisfies an action's requirement
//!
//! # Design Decisions
//! - The gateway never stores credentials; it only asks the provider
//! - Every call may fail; callers treat failures as denials
//! - Stores are concurrent maps so roles can be granted while serving

use std::collections::BTreeSet;

use async_trait::async_trait;
use dashmap::DashMap;

/// Name and roles of an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub roles: BTreeSet<String>,
}

impl Identity {
    pub fn new<I, S>(name: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// The pseudo-identity used for credential-less requests when allowed.
    pub fn anonymous() -> Self {
        Self {
            name: "anonymous".to_string(),
            roles: BTreeSet::new(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.name == "anonymous" && self.roles.is_empty()
    }
}

/// Failure inside the authentication provider.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt role data for '{0}'")]
    CorruptRoles(String),
    #[error("permission check failed: {0}")]
    Check(String),
}

/// External collaborator that owns users, tokens and role sets.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolve a bearer token.
    async fn resolve_token(&self, token: &str) -> Result<Option<Identity>, AuthError>;

    /// Resolve a name/password pair.
    async fn verify_password(
        &self,
        name: &str,
        password: &str,
    ) -> Result<Option<Identity>, AuthError>;

    /// Look up a user by name.
    async fn lookup_user(&self, name: &str) -> Result<Option<Identity>, AuthError>;

    /// Current roles for an identity. Defaults to the snapshot it carries.
    async fn roles_for(&self, identity: &Identity) -> Result<BTreeSet<String>, AuthError> {
        Ok(identity.roles.clone())
    }

    /// Whether `roles` satisfies `required`. Defaults to a non-empty intersection.
    async fn check_permission(
        &self,
        roles: &BTreeSet<String>,
        required: &BTreeSet<String>,
    ) -> Result<bool, AuthError> {
        Ok(!roles.is_disjoint(required))
    }
}

#[derive(Debug, Clone)]
struct UserRecord {
    password: Option<String>,
    roles: BTreeSet<String>,
}

/// Provider backed by concurrent in-process maps.
#[derive(Debug, Default)]
pub struct InMemoryAuthProvider {
    users: DashMap<String, UserRecord>,
    /// token -> user name
    tokens: DashMap<String, String>,
}

impl InMemoryAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a user. `token`, when given, resolves to this user.
    pub fn add_user<I, S>(&self, name: &str, password: Option<&str>, token: Option<&str>, roles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users.insert(
            name.to_string(),
            UserRecord {
                password: password.map(str::to_string),
                roles: roles.into_iter().map(Into::into).collect(),
            },
        );
        if let Some(token) = token {
            self.add_token(token, name);
        }
    }

    pub fn add_token(&self, token: &str, name: &str) {
        self.tokens.insert(token.to_string(), name.to_string());
    }

    /// Replace a user's roles. Returns false for unknown users.
    pub fn set_user_roles<I, S>(&self, name: &str, roles: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self.users.get_mut(name) {
            Some(mut record) => {
                record.roles = roles.into_iter().map(Into::into).collect();
                true
            }
            None => false,
        }
    }

    pub fn remove_user(&self, name: &str) {
        self.users.remove(name);
        self.tokens.retain(|_, user| user.as_str() != name);
    }

    pub fn clear_users(&self) {
        self.users.clear();
        self.tokens.clear();
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    fn identity(&self, name: &str) -> Option<Identity> {
        self.users.get(name).map(|record| Identity {
            name: name.to_string(),
            roles: record.roles.clone(),
        })
    }
}

#[async_trait]
impl AuthProvider for InMemoryAuthProvider {
    async fn resolve_token(&self, token: &str) -> Result<Option<Identity>, AuthError> {
        let name = match self.tokens.get(token) {
            Some(name) => name.clone(),
            None => return Ok(None),
        };
        Ok(self.identity(&name))
    }

    async fn verify_password(
        &self,
        name: &str,
        password: &str,
    ) -> Result<Option<Identity>, AuthError> {
        let matches = self
            .users
            .get(name)
            .map(|record| record.password.as_deref() == Some(password))
            .unwrap_or(false);
        Ok(if matches { self.identity(name) } else { None })
    }

    async fn lookup_user(&self, name: &str) -> Result<Option<Identity>, AuthError> {
        Ok(self.identity(name))
    }

    /// Roles are re-read so grants apply to live socket sessions.
    async fn roles_for(&self, identity: &Identity) -> Result<BTreeSet<String>, AuthError> {
        Ok(self
            .users
            .get(&identity.name)
            .map(|record| record.roles.clone())
            .unwrap_or_else(|| identity.roles.clone()))
    }
}
