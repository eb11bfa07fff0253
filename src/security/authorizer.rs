//! Authorization engine.
//!
//! # Responsibilities
//! - Resolve the presented credential to an identity through the provider
//! - Apply anonymous paths and the default user
//! - Compare the identity's roles with the action's required roles
//!
//! # Design Decisions
//! - Fail closed: a provider error or panic while checking roles is a denial
//! - One decision type for both transports; adapters choose the wire form

use std::collections::BTreeSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;

use crate::observability::metrics;
use crate::security::credentials::{Credential, Presented};
use crate::security::policy::PolicyStore;
use crate::security::provider::{AuthError, AuthProvider, Identity};

/// Result of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied,
    Unauthenticated,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allowed => "allowed",
            Decision::Denied => "denied",
            Decision::Unauthenticated => "unauthenticated",
        }
    }
}

/// Decision plus the identity it was made for.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub decision: Decision,
    pub identity: Option<Identity>,
}

/// Shared authorization engine. Cheap to clone.
#[derive(Clone)]
pub struct Authorizer {
    provider: Arc<dyn AuthProvider>,
    policy: Arc<PolicyStore>,
}

impl std::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizer")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Authorizer {
    pub fn new(provider: Arc<dyn AuthProvider>, policy: Arc<PolicyStore>) -> Self {
        Self { provider, policy }
    }

    pub fn provider(&self) -> &Arc<dyn AuthProvider> {
        &self.provider
    }

    pub fn policy(&self) -> &Arc<PolicyStore> {
        &self.policy
    }

    /// Resolve a presented credential.
    ///
    /// `Ok(None)` means unauthenticated. With no credential at all and the
    /// default user enabled, the anonymous identity is returned.
    pub async fn identify(&self, presented: &Presented) -> Result<Option<Identity>, AuthError> {
        match presented {
            Presented::Nothing => Ok(self
                .policy
                .load()
                .default_user()
                .then(Identity::anonymous)),
            Presented::Malformed => Ok(None),
            Presented::Credential(Credential::Bearer(token)) => {
                guarded(self.provider.resolve_token(token)).await
            }
            Presented::Credential(Credential::Basic { name, password }) => {
                guarded(self.provider.verify_password(name, password)).await
            }
        }
    }

    /// Check an already identified caller against an action's required roles.
    pub async fn authorize(&self, action_id: &str, identity: &Identity) -> Decision {
        let policy = self.policy.load();
        let decision = match policy.required_roles(action_id) {
            None => Decision::Allowed,
            Some(required) => match self.role_check(identity, required).await {
                Ok(true) => Decision::Allowed,
                Ok(false) => Decision::Denied,
                Err(e) => {
                    tracing::warn!(
                        action = %action_id,
                        user = %identity.name,
                        error = %e,
                        "Role check failed, denying"
                    );
                    Decision::Denied
                }
            },
        };
        metrics::record_auth_decision(decision.as_str());
        decision
    }

    /// Full HTTP check: anonymous path, then identification, then roles.
    pub async fn check(&self, action_id: &str, path: &str, presented: &Presented) -> Verdict {
        if self.policy.load().is_anonymous_path(path) {
            metrics::record_auth_decision(Decision::Allowed.as_str());
            return Verdict {
                decision: Decision::Allowed,
                identity: None,
            };
        }

        // The default user only reaches actions that require no roles.
        let credentialless_restricted = matches!(presented, Presented::Nothing)
            && self.policy.load().required_roles(action_id).is_some();
        let resolved = if credentialless_restricted {
            Ok(None)
        } else {
            self.identify(presented).await
        };

        match resolved {
            Ok(Some(identity)) => Verdict {
                decision: self.authorize(action_id, &identity).await,
                identity: Some(identity),
            },
            Ok(None) => {
                metrics::record_auth_decision(Decision::Unauthenticated.as_str());
                Verdict {
                    decision: Decision::Unauthenticated,
                    identity: None,
                }
            }
            Err(e) => {
                tracing::warn!(action = %action_id, error = %e, "Identity resolution failed, denying");
                metrics::record_auth_decision(Decision::Denied.as_str());
                Verdict {
                    decision: Decision::Denied,
                    identity: None,
                }
            }
        }
    }

    async fn role_check(
        &self,
        identity: &Identity,
        required: &BTreeSet<String>,
    ) -> Result<bool, AuthError> {
        let roles = guarded(self.provider.roles_for(identity)).await?;
        guarded(self.provider.check_permission(&roles, required)).await
    }
}

/// Run a provider call, turning a panic into an error.
async fn guarded<T>(call: impl Future<Output = Result<T, AuthError>>) -> Result<T, AuthError> {
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result,
        Err(_) => Err(AuthError::Unavailable("provider panicked".to_string())),
    }
}
