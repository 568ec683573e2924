//! Session lifecycle: the transitions around the gate.
//!
//! Choosing guest access, landing on the anonymous-entry screen, signing out,
//! and ending guest access once a real identity appears.

use crate::gate::{Navigation, RoutePolicy};
use crate::guest::GuestSessionStore;
use crate::identity::{Identity, IdentityProvider};
use crate::subscription::SubscriptionId;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SessionLifecycle {
    guest: Arc<GuestSessionStore>,
    identity: Arc<dyn IdentityProvider>,
    policy: RoutePolicy,
}

impl SessionLifecycle {
    pub fn new(
        guest: Arc<GuestSessionStore>,
        identity: Arc<dyn IdentityProvider>,
        policy: RoutePolicy,
    ) -> Self {
        Self {
            guest,
            identity,
            policy,
        }
    }

    /// The viewer chose to browse without an account.
    pub fn continue_as_guest(&self) -> Navigation {
        self.guest.enable();
        info!("Continuing as guest");
        Navigation::replace(self.policy.home_path())
    }

    /// The viewer landed on the anonymous-entry screen.
    ///
    /// A guest flag must not outlive a real session, so it is cleared when an
    /// identity is present. Returns whether an identity was found.
    pub async fn enter_anonymous_entry(&self) -> bool {
        match self.identity.current_identity().await {
            Ok(Some(identity)) => {
                debug!(user_id = %identity.user_id, "Authenticated viewer on entry screen; clearing guest state");
                self.guest.disable();
                true
            }
            Ok(None) => false,
            Err(err) => {
                warn!(error = %err, "Identity lookup failed on entry screen");
                false
            }
        }
    }

    /// Sign out locally and remotely.
    ///
    /// Guest state is cleared first. A failed remote sign-out is logged and
    /// otherwise ignored; the viewer always ends up on the entry screen.
    pub async fn sign_out(&self) -> Navigation {
        self.guest.disable();
        if let Err(err) = self.identity.sign_out().await {
            warn!(error = %err, "Remote sign-out failed");
        } else {
            info!("Signed out");
        }
        Navigation::replace(self.policy.anonymous_entry_path())
    }

    /// End guest access whenever an identity appears.
    pub fn watch_identity(&self) -> SubscriptionId {
        let guest = Arc::clone(&self.guest);
        self.identity
            .on_identity_changed(Arc::new(move |identity: Option<&Identity>| {
                if let Some(identity) = identity {
                    debug!(user_id = %identity.user_id, "Identity present; ending guest session");
                    guest.disable();
                }
            }))
    }
}
