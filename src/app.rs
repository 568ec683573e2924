//! Composition root: wires storage, clock, identity and the session components.

use crate::clock::{Clock, SystemClock};
use crate::config::MayloConfig;
use crate::error::{ApiError, StorageError};
use crate::favorites::{FavoritesSynchronizer, RemoteFavorites};
use crate::gate::{RoutePolicy, SessionGate};
use crate::guest::GuestSessionStore;
use crate::identity::IdentityProvider;
use crate::session::SessionLifecycle;
use crate::storage::{KeyValueStorage, MemoryStorage, SledStorage, UnavailableStorage};
use crate::subscription::SubscriptionId;
use crate::teardown::{TeardownBus, TeardownEvent, TeardownRegistration};
use std::sync::Arc;
use tracing::{info, warn};

/// Everything a host needs to gate routes and manage the viewer's session.
pub struct ClientCore {
    config: MayloConfig,
    identity: Arc<dyn IdentityProvider>,
    teardown: Arc<TeardownBus>,
    guest: Arc<GuestSessionStore>,
    gate: SessionGate,
    lifecycle: SessionLifecycle,
    favorites: Option<Arc<FavoritesSynchronizer>>,
    auto_expire: TeardownRegistration,
    subscriptions: Vec<SubscriptionId>,
}

impl ClientCore {
    /// Build from configuration with a sled-backed durable slot.
    ///
    /// When the durable store cannot be opened the core still starts; the
    /// guest session then lives in the volatile marker only.
    pub fn from_config(
        config: MayloConfig,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, ApiError> {
        let durable: Arc<dyn KeyValueStorage> = match open_durable(&config) {
            Ok(storage) => Arc::new(storage),
            Err(err) => {
                warn!(error = %err, "Durable storage unavailable; guest sessions will not survive restarts");
                Arc::new(UnavailableStorage::new(err.to_string()))
            }
        };
        Self::assemble(
            config,
            Arc::new(MemoryStorage::new()),
            durable,
            Arc::new(SystemClock),
            identity,
        )
    }

    /// Build from explicit parts.
    pub fn assemble(
        config: MayloConfig,
        volatile: Arc<dyn KeyValueStorage>,
        durable: Arc<dyn KeyValueStorage>,
        clock: Arc<dyn Clock>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, ApiError> {
        config.guest.validate().map_err(ApiError::ConfigError)?;
        config.gate.validate().map_err(ApiError::ConfigError)?;

        let policy = RoutePolicy::from_config(&config.gate);
        let teardown = Arc::new(TeardownBus::new());
        let guest = Arc::new(GuestSessionStore::new(
            volatile,
            durable,
            clock,
            config.guest.clone(),
        ));
        let auto_expire = guest.attach_auto_expire_on_teardown(teardown.clone());

        let gate = SessionGate::new(policy.clone(), guest.clone(), identity.clone());
        let lifecycle = SessionLifecycle::new(guest.clone(), identity.clone(), policy);
        let subscriptions = vec![lifecycle.watch_identity()];

        info!("Client core assembled");
        Ok(Self {
            config,
            identity,
            teardown,
            guest,
            gate,
            lifecycle,
            favorites: None,
            auto_expire,
            subscriptions,
        })
    }

    /// Attach the saved-entities synchronizer for the given remote.
    pub fn with_favorites(mut self, remote: Arc<dyn RemoteFavorites>) -> Self {
        let favorites = Arc::new(FavoritesSynchronizer::new(self.identity.clone(), remote));
        self.subscriptions.push(favorites.watch_identity());
        self.favorites = Some(favorites);
        self
    }

    pub fn config(&self) -> &MayloConfig {
        &self.config
    }

    pub fn guest(&self) -> &Arc<GuestSessionStore> {
        &self.guest
    }

    pub fn gate(&self) -> &SessionGate {
        &self.gate
    }

    pub fn lifecycle(&self) -> &SessionLifecycle {
        &self.lifecycle
    }

    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    pub fn favorites(&self) -> Option<&Arc<FavoritesSynchronizer>> {
        self.favorites.as_ref()
    }

    /// Forward a host teardown signal.
    pub fn emit_teardown(&self, event: TeardownEvent) {
        self.teardown.emit(event);
    }

    /// Detach every handler this core registered.
    pub fn shutdown(self) {
        self.auto_expire.detach();
        for id in self.subscriptions {
            self.identity.unsubscribe(id);
        }
    }
}

/// Open the sled-backed durable slot at the configured location.
pub fn open_durable(config: &MayloConfig) -> Result<SledStorage, StorageError> {
    let path = config.storage.resolve_durable_path();
    std::fs::create_dir_all(&path).map_err(|e| {
        StorageError::Io(format!("Failed to create {}: {}", path.display(), e))
    })?;
    SledStorage::open(&path)
}
