//! Shared test utilities for integration tests
//!
//! Scriptable collaborators (identity provider, remote favorites store) with
//! failure injection and hold points, plus isolated XDG environments for
//! configuration tests.

use async_trait::async_trait;
use maylo::error::RemoteError;
use maylo::favorites::{EntityId, EntityRecord, RemoteFavorites};
use maylo::identity::{Identity, IdentityCallback, IdentityProvider, LocalIdentity, Role, UserId};
use maylo::subscription::SubscriptionId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::oneshot;

/// Global mutex to serialize XDG environment variable access across all tests
static XDG_ENV_MUTEX: Mutex<()> = parking_lot::const_mutex(());

const ENV_KEYS: [&str; 4] = ["HOME", "XDG_CONFIG_HOME", "XDG_DATA_HOME", "MAYLO_ENV"];

/// Environment variable state to restore after test
struct EnvState {
    saved: Vec<(&'static str, Option<String>)>,
}

impl EnvState {
    fn capture() -> Self {
        Self {
            saved: ENV_KEYS
                .iter()
                .map(|key| (*key, std::env::var(key).ok()))
                .collect(),
        }
    }

    fn restore(self) {
        for (key, value) in self.saved {
            match value {
                Some(orig) => std::env::set_var(key, orig),
                None => std::env::remove_var(key),
            }
        }
    }
}

/// Run `f` with HOME, XDG_CONFIG_HOME and XDG_DATA_HOME pointed into `test_dir`
/// and MAYLO_ENV unset. The environment is restored afterwards.
pub fn with_xdg_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = XDG_ENV_MUTEX.lock();
    let env_state = EnvState::capture();

    let test_config_home = test_dir.path().join("config-home");
    let test_data_home = test_dir.path().join("data");
    let test_home = test_dir.path().join("home");

    std::fs::create_dir_all(&test_config_home).unwrap();
    std::fs::create_dir_all(&test_data_home).unwrap();
    std::fs::create_dir_all(&test_home).unwrap();

    std::env::set_var("HOME", &test_home);
    std::env::set_var("XDG_CONFIG_HOME", &test_config_home);
    std::env::set_var("XDG_DATA_HOME", &test_data_home);
    std::env::remove_var("MAYLO_ENV");

    let result = f();

    env_state.restore();

    result
}

/// Identity provider whose lookups can fail or be held until released.
pub struct ScriptedIdentity {
    inner: LocalIdentity,
    fail: AtomicBool,
    fail_roles: AtomicBool,
    hold: Mutex<Option<oneshot::Receiver<()>>>,
    lookups: AtomicUsize,
}

impl ScriptedIdentity {
    pub fn anonymous() -> Self {
        Self::with(LocalIdentity::anonymous())
    }

    pub fn signed_in(user_id: &str) -> Self {
        Self::with(LocalIdentity::signed_in(user_id))
    }

    fn with(inner: LocalIdentity) -> Self {
        Self {
            inner,
            fail: AtomicBool::new(false),
            fail_roles: AtomicBool::new(false),
            hold: Mutex::new(None),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, identity: Option<Identity>) {
        self.inner.set(identity);
    }

    pub fn set_role(&self, user_id: &str, role: Role) {
        self.inner.set_role(&UserId::new(user_id), role);
    }

    pub fn fail_lookups(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn fail_role_lookups(&self, fail: bool) {
        self.fail_roles.store(fail, Ordering::SeqCst);
    }

    /// The next lookup suspends until the returned sender fires (or is dropped).
    pub fn hold_next_lookup(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.hold.lock() = Some(rx);
        tx
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for ScriptedIdentity {
    async fn current_identity(&self) -> Result<Option<Identity>, RemoteError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let hold = self.hold.lock().take();
        if let Some(rx) = hold {
            let _ = rx.await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(RemoteError::new("identity.lookup", "token refresh failed"));
        }
        self.inner.current_identity().await
    }

    fn on_identity_changed(&self, callback: Arc<IdentityCallback>) -> SubscriptionId {
        self.inner.on_identity_changed(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.unsubscribe(id)
    }

    async fn profile_role(&self, user_id: &UserId) -> Result<Option<Role>, RemoteError> {
        if self.fail_roles.load(Ordering::SeqCst) {
            return Err(RemoteError::new("identity.profile_role", "profile read failed"));
        }
        self.inner.profile_role(user_id).await
    }

    async fn sign_out(&self) -> Result<(), RemoteError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RemoteError::new("identity.sign_out", "network down"));
        }
        self.inner.sign_out().await
    }
}

/// Remote favorites store kept in memory, newest row first.
#[derive(Default)]
pub struct FakeFavorites {
    rows: Mutex<Vec<(UserId, EntityId)>>,
    fail_exists: AtomicBool,
    fail_insert: AtomicBool,
    fail_delete: AtomicBool,
    fail_list: AtomicBool,
    write_hold: Mutex<Option<oneshot::Receiver<()>>>,
    list_hold: Mutex<Option<oneshot::Receiver<()>>>,
    inserts: AtomicUsize,
    deletes: AtomicUsize,
    lists: AtomicUsize,
}

impl FakeFavorites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, owner: &str, entity_id: &str) {
        self.rows
            .lock()
            .insert(0, (UserId::new(owner), EntityId::new(entity_id)));
    }

    pub fn has(&self, owner: &str, entity_id: &str) -> bool {
        let owner = UserId::new(owner);
        let entity_id = EntityId::new(entity_id);
        self.rows
            .lock()
            .iter()
            .any(|(o, e)| *o == owner && *e == entity_id)
    }

    pub fn fail_exists(&self, fail: bool) {
        self.fail_exists.store(fail, Ordering::SeqCst);
    }

    pub fn fail_insert(&self, fail: bool) {
        self.fail_insert.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    /// The next insert or delete suspends until the returned sender fires.
    pub fn hold_next_write(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.write_hold.lock() = Some(rx);
        tx
    }

    /// The next listing suspends until the returned sender fires.
    pub fn hold_next_list(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.list_hold.lock() = Some(rx);
        tx
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn lists(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    async fn wait_for_release(&self) {
        let hold = self.write_hold.lock().take();
        if let Some(rx) = hold {
            let _ = rx.await;
        }
    }

    async fn wait_for_list_release(&self) {
        let hold = self.list_hold.lock().take();
        if let Some(rx) = hold {
            let _ = rx.await;
        }
    }
}

fn remote_failure(operation: &str) -> RemoteError {
    RemoteError::new(operation, "service unavailable")
}

#[async_trait]
impl RemoteFavorites for FakeFavorites {
    async fn exists(&self, owner: &UserId, entity_id: &EntityId) -> Result<bool, RemoteError> {
        if self.fail_exists.load(Ordering::SeqCst) {
            return Err(remote_failure("favorites.exists"));
        }
        Ok(self
            .rows
            .lock()
            .iter()
            .any(|(o, e)| o == owner && e == entity_id))
    }

    async fn insert(&self, owner: &UserId, entity_id: &EntityId) -> Result<(), RemoteError> {
        self.wait_for_release().await;
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(remote_failure("favorites.insert"));
        }
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().insert(0, (owner.clone(), entity_id.clone()));
        Ok(())
    }

    async fn delete(&self, owner: &UserId, entity_id: &EntityId) -> Result<(), RemoteError> {
        self.wait_for_release().await;
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(remote_failure("favorites.delete"));
        }
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.rows
            .lock()
            .retain(|(o, e)| !(o == owner && e == entity_id));
        Ok(())
    }

    async fn list_for_owner(&self, owner: &UserId) -> Result<Vec<EntityRecord>, RemoteError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.wait_for_list_release().await;
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(remote_failure("favorites.list"));
        }
        Ok(self
            .rows
            .lock()
            .iter()
            .filter(|(o, _)| o == owner)
            .map(|(_, e)| EntityRecord::new(e.as_str(), format!("Provider {}", e)))
            .collect())
    }
}
