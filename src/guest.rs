//! Guest session store
//!
//! A guest session is a renewable, time-boxed permission to browse without an
//! identity. It is tracked in two slots:
//!
//! - a primary marker in volatile storage, alive only while the originating
//!   context is alive;
//! - an expiry boundary in durable storage, set when guest mode is enabled.
//!
//! The session is active iff the primary marker is set, or the expiry
//! boundary is present and still in the future. Reading the state through
//! the fallback re-asserts the primary marker, so a context that was hidden
//! and resumed within the boundary keeps its guest status.
//!
//! Storage failures never propagate: they are logged and the store behaves as
//! if no guest session exists.

use crate::clock::Clock;
use crate::storage::KeyValueStorage;
use crate::teardown::{TeardownEvent, TeardownRegistration, TeardownSource};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

const MARKER_SET: &str = "1";
const MAX_TTL_SECS: u64 = 366 * 24 * 60 * 60;

/// Guest session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestConfig {
    /// Lifetime of the durable fallback boundary, in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Key of the primary marker in volatile storage
    #[serde(default = "default_session_key")]
    pub session_key: String,

    /// Key of the expiry boundary in durable storage
    #[serde(default = "default_ttl_key")]
    pub ttl_key: String,
}

fn default_ttl_secs() -> u64 {
    2 * 60 * 60
}

fn default_session_key() -> String {
    "maylo_guest_ss".to_string()
}

fn default_ttl_key() -> String {
    "maylo_guest_ttl".to_string()
}

impl Default for GuestConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            session_key: default_session_key(),
            ttl_key: default_ttl_key(),
        }
    }
}

impl GuestConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.ttl_secs == 0 {
            return Err("ttl_secs must be greater than zero".to_string());
        }
        if self.ttl_secs > MAX_TTL_SECS {
            return Err(format!(
                "ttl_secs {} exceeds the maximum of {}",
                self.ttl_secs, MAX_TTL_SECS
            ));
        }
        if self.session_key.trim().is_empty() || self.ttl_key.trim().is_empty() {
            return Err("session_key and ttl_key cannot be empty".to_string());
        }
        if self.session_key == self.ttl_key {
            return Err("session_key and ttl_key must differ".to_string());
        }
        Ok(())
    }

    pub fn ttl(&self) -> Duration {
        Duration::seconds(self.ttl_secs.min(MAX_TTL_SECS) as i64)
    }
}

/// Raw view of both slots, without side effects
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuestState {
    pub primary_marker: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct GuestSessionStore {
    volatile: Arc<dyn KeyValueStorage>,
    durable: Arc<dyn KeyValueStorage>,
    clock: Arc<dyn Clock>,
    config: GuestConfig,
}

impl GuestSessionStore {
    pub fn new(
        volatile: Arc<dyn KeyValueStorage>,
        durable: Arc<dyn KeyValueStorage>,
        clock: Arc<dyn Clock>,
        config: GuestConfig,
    ) -> Self {
        Self {
            volatile,
            durable,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &GuestConfig {
        &self.config
    }

    /// Start (or renew) a guest session. Idempotent.
    pub fn enable(&self) {
        let expires_at = self.clock.now() + self.config.ttl();
        if let Err(err) = self.volatile.set(&self.config.session_key, MARKER_SET) {
            warn!(error = %err, slot = "volatile", "Failed to set guest marker");
        }
        if let Err(err) = self.durable.set(
            &self.config.ttl_key,
            &expires_at.timestamp_millis().to_string(),
        ) {
            warn!(error = %err, slot = "durable", "Failed to set guest expiry");
        }
        debug!(expires_at = %expires_at.to_rfc3339(), "Guest session enabled");
    }

    /// End the guest session, clearing both slots. Idempotent.
    pub fn disable(&self) {
        if let Err(err) = self.volatile.remove(&self.config.session_key) {
            warn!(error = %err, slot = "volatile", "Failed to clear guest marker");
        }
        if let Err(err) = self.durable.remove(&self.config.ttl_key) {
            warn!(error = %err, slot = "durable", "Failed to clear guest expiry");
        }
        debug!("Guest session disabled");
    }

    /// Whether a guest session is active.
    ///
    /// Rehydrates the primary marker when only the fallback is valid, and
    /// clears a fallback that has elapsed or cannot be parsed.
    pub fn is_active(&self) -> bool {
        match self.volatile.get(&self.config.session_key) {
            Ok(Some(marker)) if marker == MARKER_SET => return true,
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, slot = "volatile", "Failed to read guest marker");
            }
        }

        let raw = match self.durable.get(&self.config.ttl_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return false,
            Err(err) => {
                warn!(error = %err, slot = "durable", "Failed to read guest expiry");
                return false;
            }
        };

        let now = self.clock.now_millis();
        match parse_expiry(&raw) {
            Some(expiry) if now < expiry => {
                if let Err(err) = self.volatile.set(&self.config.session_key, MARKER_SET) {
                    warn!(error = %err, slot = "volatile", "Failed to rehydrate guest marker");
                }
                debug!(expires_in_ms = expiry - now, "Guest session rehydrated from fallback");
                true
            }
            _ => {
                if let Err(err) = self.durable.remove(&self.config.ttl_key) {
                    warn!(error = %err, slot = "durable", "Failed to clear elapsed guest expiry");
                }
                debug!(raw = %raw, "Guest fallback elapsed");
                false
            }
        }
    }

    /// Peek at both slots without rehydrating or clearing anything.
    pub fn state(&self) -> GuestState {
        let primary_marker = matches!(
            self.volatile.get(&self.config.session_key),
            Ok(Some(ref marker)) if marker == MARKER_SET
        );
        let expires_at = self
            .durable
            .get(&self.config.ttl_key)
            .ok()
            .flatten()
            .and_then(|raw| parse_expiry(&raw))
            .and_then(DateTime::<Utc>::from_timestamp_millis);
        GuestState {
            primary_marker,
            expires_at,
        }
    }

    /// Clear the primary marker whenever the context is hidden or unloaded.
    ///
    /// The fallback boundary is left intact: a context resumed before it
    /// elapses becomes a guest again on the next [`is_active`](Self::is_active).
    pub fn attach_auto_expire_on_teardown(
        &self,
        source: Arc<dyn TeardownSource>,
    ) -> TeardownRegistration {
        let volatile = Arc::clone(&self.volatile);
        let key = self.config.session_key.clone();
        let id = source.subscribe(Arc::new(move |event: TeardownEvent| {
            if let Err(err) = volatile.remove(&key) {
                warn!(error = %err, event = event.as_str(), "Failed to clear guest marker on teardown");
            } else {
                debug!(event = event.as_str(), "Guest marker cleared on teardown");
            }
        }));
        TeardownRegistration::new(source, id)
    }
}

fn parse_expiry(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|expiry| *expiry > 0)
}
