//! Favorites Synchronizer
//!
//! Keeps a client-side cache of the viewer's favorites consistent with the
//! remote store. `toggle` applies the safe half of the change immediately
//! (removal of a cached entity), lets the remote existence check decide
//! whether an insert or a delete actually happens, then either re-reads the
//! remote list or rolls the entity back.
//!
//! A toggle issued while another toggle for the same viewer and entity is in
//! flight joins it and receives the same outcome, so a double tap results in
//! one remote write. Toggles for different entities run concurrently.

pub mod cache;

pub use cache::{FavoritesCache, MutationToken};

use crate::error::{ApiError, RemoteError};
use crate::identity::{Identity, IdentityProvider, UserId};
use crate::subscription::SubscriptionId;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tracing::{debug, warn};

/// Identifier of a favoritable entity (a service provider listing)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Entity row as returned by the remote favorites listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    /// Remaining columns, passed through untouched
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl EntityRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(id),
            name: name.into(),
            attributes: serde_json::Map::new(),
        }
    }
}

/// Remote favorites store
#[async_trait]
pub trait RemoteFavorites: Send + Sync {
    async fn exists(&self, owner: &UserId, entity_id: &EntityId) -> Result<bool, RemoteError>;
    async fn insert(&self, owner: &UserId, entity_id: &EntityId) -> Result<(), RemoteError>;
    async fn delete(&self, owner: &UserId, entity_id: &EntityId) -> Result<(), RemoteError>;
    /// Favorites of `owner`, most recent first
    async fn list_for_owner(&self, owner: &UserId) -> Result<Vec<EntityRecord>, RemoteError>;
}

/// Result of a settled toggle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub entity_id: EntityId,
    /// Membership after the remote write
    pub liked: bool,
}

type ToggleResult = Result<ToggleOutcome, ApiError>;
type ToggleKey = (UserId, EntityId);

pub struct FavoritesSynchronizer {
    identity: Arc<dyn IdentityProvider>,
    remote: Arc<dyn RemoteFavorites>,
    cache: RwLock<FavoritesCache>,
    in_flight: Mutex<HashMap<ToggleKey, Vec<oneshot::Sender<ToggleResult>>>>,
    refresh_seq: AtomicU64,
    changes: watch::Sender<u64>,
}

impl FavoritesSynchronizer {
    pub fn new(identity: Arc<dyn IdentityProvider>, remote: Arc<dyn RemoteFavorites>) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            identity,
            remote,
            cache: RwLock::new(FavoritesCache::new()),
            in_flight: Mutex::new(HashMap::new()),
            refresh_seq: AtomicU64::new(0),
            changes,
        }
    }

    /// Current cached favorites, including optimistic state of in-flight toggles
    pub fn list(&self) -> Vec<EntityRecord> {
        self.cache.read().records().to_vec()
    }

    pub fn ids(&self) -> HashSet<EntityId> {
        self.cache.read().ids()
    }

    pub fn contains(&self, entity_id: &EntityId) -> bool {
        self.cache.read().contains(entity_id)
    }

    pub fn is_pending(&self, entity_id: &EntityId) -> bool {
        self.cache.read().is_pending(entity_id)
    }

    pub fn is_stale(&self) -> bool {
        self.cache.read().is_stale()
    }

    /// Receiver of the cache version; changes whenever the cache does.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Mark the cache stale and notify subscribers.
    pub fn invalidate(&self) {
        self.cache.write().mark_stale();
        self.publish();
    }

    /// List, re-reading the remote store first if the cache is stale.
    pub async fn load(&self) -> Result<Vec<EntityRecord>, ApiError> {
        if self.is_stale() {
            self.refresh().await?;
        }
        Ok(self.list())
    }

    /// Re-read the viewer's favorites from the remote store.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let owner = self.require_owner().await?;
        self.refresh_for(&owner).await
    }

    /// Toggle membership of `entity_id` for the current viewer.
    pub async fn toggle(&self, entity_id: &EntityId) -> ToggleResult {
        let owner = self.require_owner().await?;
        let key = (owner.clone(), entity_id.clone());

        let waiter = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get_mut(&key) {
                Some(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                None => {
                    in_flight.insert(key.clone(), Vec::new());
                    None
                }
            }
        };
        if let Some(rx) = waiter {
            debug!(entity_id = %entity_id, "Joining in-flight toggle");
            return rx.await.unwrap_or_else(|_| {
                Err(ApiError::RemoteUnavailable(RemoteError::new(
                    "favorites.toggle",
                    "in-flight toggle was abandoned",
                )))
            });
        }

        let mut guard = InFlightGuard {
            sync: self,
            key: Some(key),
            mutation: None,
        };

        self.adopt_owner(&owner);
        let mutation = self.cache.write().begin_mutation(entity_id);
        debug!(
            entity_id = %entity_id,
            optimistic_removal = mutation.was_member(),
            "Toggle started"
        );
        guard.mutation = Some(mutation.clone());
        if mutation.was_member() {
            self.publish();
        }

        let result = match self.remote_toggle(&owner, entity_id).await {
            Ok(liked) => {
                let floor = self.refresh_seq.load(Ordering::SeqCst);
                self.cache.write().settle(&mutation, liked, floor);
                guard.mutation = None;
                self.publish();
                debug!(entity_id = %entity_id, liked, "Toggle settled");
                Ok(ToggleOutcome {
                    entity_id: entity_id.clone(),
                    liked,
                })
            }
            Err(err) => {
                self.cache.write().rollback(&mutation);
                guard.mutation = None;
                self.publish();
                warn!(entity_id = %entity_id, error = %err, "Toggle failed; rolled back");
                Err(ApiError::RemoteUnavailable(err))
            }
        };

        // Settled: a toggle issued from here on makes its own remote write.
        guard.complete(&result);

        if result.is_ok() {
            if let Err(err) = self.refresh_for(&owner).await {
                warn!(
                    entity_id = %entity_id,
                    error = %err,
                    "Refresh after toggle failed; cache marked stale"
                );
                self.invalidate();
            }
        }
        result
    }

    /// Scope the cache to a new viewer (or none), dropping the old contents.
    pub fn handle_identity_change(&self, identity: Option<&Identity>) {
        let next = identity.map(|i| i.user_id.clone());
        {
            let mut cache = self.cache.write();
            if cache.owner() == next.as_ref() {
                return;
            }
            cache.reset(next);
        }
        debug!("Favorites cache reset for new viewer");
        self.publish();
    }

    /// Follow identity changes of the collaborator.
    pub fn watch_identity(self: &Arc<Self>) -> SubscriptionId {
        let weak = Arc::downgrade(self);
        self.identity
            .on_identity_changed(Arc::new(move |identity: Option<&Identity>| {
                if let Some(sync) = weak.upgrade() {
                    sync.handle_identity_change(identity);
                }
            }))
    }

    async fn require_owner(&self) -> Result<UserId, ApiError> {
        match self.identity.current_identity().await {
            Ok(Some(identity)) => Ok(identity.user_id),
            Ok(None) => Err(ApiError::Unauthenticated),
            Err(err) => {
                warn!(error = %err, "Identity lookup failed");
                Err(ApiError::RemoteUnavailable(err))
            }
        }
    }

    /// The remote existence check, not the cache, picks insert or delete.
    async fn remote_toggle(&self, owner: &UserId, entity_id: &EntityId) -> Result<bool, RemoteError> {
        if self.remote.exists(owner, entity_id).await? {
            self.remote.delete(owner, entity_id).await?;
            Ok(false)
        } else {
            self.remote.insert(owner, entity_id).await?;
            Ok(true)
        }
    }

    async fn refresh_for(&self, owner: &UserId) -> Result<(), ApiError> {
        self.adopt_owner(owner);
        let ticket = self.refresh_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let records = self.remote.list_for_owner(owner).await?;
        let applied = self.cache.write().replace(owner, records, ticket);
        if applied {
            self.publish();
        } else {
            debug!(ticket, "Discarding superseded favorites read");
        }
        Ok(())
    }

    fn adopt_owner(&self, owner: &UserId) {
        {
            let mut cache = self.cache.write();
            if cache.owner() == Some(owner) {
                return;
            }
            cache.reset(Some(owner.clone()));
        }
        self.publish();
    }

    fn publish(&self) {
        let version = self.cache.read().version();
        self.changes.send_replace(version);
    }
}

/// Clears the in-flight entry of a toggle, rolling back its optimistic
/// mutation if the toggle future is dropped before settling.
struct InFlightGuard<'a> {
    sync: &'a FavoritesSynchronizer,
    key: Option<ToggleKey>,
    mutation: Option<MutationToken>,
}

impl InFlightGuard<'_> {
    fn complete(mut self, result: &ToggleResult) {
        let Some(key) = self.key.take() else {
            return;
        };
        let waiters = self.sync.in_flight.lock().remove(&key).unwrap_or_default();
        for tx in waiters {
            let _ = tx.send(result.clone());
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Some(mutation) = self.mutation.take() {
            warn!(entity_id = %mutation.entity_id(), "Toggle abandoned before settling; rolled back");
            self.sync.cache.write().rollback(&mutation);
            self.sync.publish();
        }
        if let Some(key) = self.key.take() {
            self.sync.in_flight.lock().remove(&key);
        }
    }
}
