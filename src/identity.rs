//! Identity collaborator
//!
//! The hosted identity provider owns sign-up, login and token refresh. This
//! core only observes whether an identity is present and when it changes,
//! and reads the profile role that restricts provider and admin pages.

use crate::error::RemoteError;
use crate::subscription::{SubscriptionId, Subscribers};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Opaque user identifier assigned by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An authenticated viewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: UserId::new(user_id),
        }
    }
}

/// Role recorded on a viewer's profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Provider,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Provider => "provider",
            Role::Admin => "admin",
        }
    }

    /// Whether a viewer with this role may enter a page reserved for `required`.
    pub fn admits(self, required: Role) -> bool {
        self == required || self == Role::Admin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "provider" => Ok(Role::Provider),
            "admin" => Ok(Role::Admin),
            other => Err(format!(
                "Unknown role '{}' (expected user, provider or admin)",
                other
            )),
        }
    }
}

/// Called with the new identity (or `None` after sign-out)
pub type IdentityCallback = dyn Fn(Option<&Identity>) + Send + Sync;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Look up the current identity. May suspend.
    async fn current_identity(&self) -> Result<Option<Identity>, RemoteError>;

    fn on_identity_changed(&self, callback: Arc<IdentityCallback>) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);

    /// Role on the profile of `user_id`; `None` when no profile exists.
    async fn profile_role(&self, user_id: &UserId) -> Result<Option<Role>, RemoteError>;

    /// End the remote session.
    async fn sign_out(&self) -> Result<(), RemoteError>;
}

/// In-process identity holder.
///
/// Stands in for the hosted provider when the identity is already known
/// locally (CLI invocations, embedding hosts that resolve tokens themselves).
#[derive(Default)]
pub struct LocalIdentity {
    current: RwLock<Option<Identity>>,
    roles: RwLock<HashMap<UserId, Role>>,
    listeners: Subscribers<IdentityCallback>,
}

impl LocalIdentity {
    pub fn new(initial: Option<Identity>) -> Self {
        Self {
            current: RwLock::new(initial),
            roles: RwLock::new(HashMap::new()),
            listeners: Subscribers::new(),
        }
    }

    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self::new(Some(Identity::new(user_id)))
    }

    pub fn anonymous() -> Self {
        Self::new(None)
    }

    /// A signed-in viewer whose profile carries `role`.
    pub fn signed_in_as(user_id: impl Into<String>, role: Role) -> Self {
        let identity = Identity::new(user_id);
        let provider = Self::new(Some(identity.clone()));
        provider.set_role(&identity.user_id, role);
        provider
    }

    pub fn set_role(&self, user_id: &UserId, role: Role) {
        self.roles.write().insert(user_id.clone(), role);
    }

    pub fn current(&self) -> Option<Identity> {
        self.current.read().clone()
    }

    /// Replace the identity and notify subscribers if it changed.
    pub fn set(&self, identity: Option<Identity>) {
        {
            let mut current = self.current.write();
            if *current == identity {
                return;
            }
            *current = identity.clone();
        }
        debug!(
            user_id = identity.as_ref().map(|i| i.user_id.as_str()).unwrap_or("-"),
            "Identity changed"
        );
        for listener in self.listeners.snapshot() {
            listener(identity.as_ref());
        }
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn current_identity(&self) -> Result<Option<Identity>, RemoteError> {
        Ok(self.current())
    }

    fn on_identity_changed(&self, callback: Arc<IdentityCallback>) -> SubscriptionId {
        self.listeners.add(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.remove(id);
    }

    async fn profile_role(&self, user_id: &UserId) -> Result<Option<Role>, RemoteError> {
        Ok(self.roles.read().get(user_id).copied())
    }

    async fn sign_out(&self) -> Result<(), RemoteError> {
        self.set(None);
        Ok(())
    }
}
