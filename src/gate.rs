//! Session Gate
//!
//! Decides, on every route entry, whether the viewer may proceed or must be
//! redirected. Decisions are computed per navigation and never cached.
//!
//! Evaluation order:
//! 1. public paths are always allowed;
//! 2. role-restricted paths need an identity whose profile role matches
//!    (admins pass everywhere); a wrong role is sent home;
//! 3. identity-only paths need an identity, guests are not admitted;
//! 4. an active guest session is allowed;
//! 5. otherwise the identity provider is asked; absence (or a failed lookup)
//!    redirects to the anonymous-entry screen.
//!
//! The identity lookup may suspend. Every navigation supersedes the ones
//! begun before it, even for the same path, and superseded results are
//! discarded when they settle.

mod policy;

pub use policy::{normalize_path, return_target, GateConfig, RoleRoute, RouteAccess, RoutePolicy};

use crate::guest::GuestSessionStore;
use crate::identity::{Identity, IdentityProvider, Role};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of one gate evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    Allow,
    RedirectToAnonymousEntry,
    RedirectToAuthRequired,
    /// Signed in, but the profile role does not admit the path
    RedirectToHome,
}

impl GateDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            GateDecision::Allow => "allow",
            GateDecision::RedirectToAnonymousEntry => "redirect_to_anonymous_entry",
            GateDecision::RedirectToAuthRequired => "redirect_to_auth_required",
            GateDecision::RedirectToHome => "redirect_to_home",
        }
    }

    pub fn is_redirect(self) -> bool {
        !matches!(self, GateDecision::Allow)
    }
}

/// How a navigation should touch the history stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    Push,
    Replace,
}

/// A navigation the host router should perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub target: String,
    pub history: HistoryMode,
    /// Path to return to after authentication, if any
    pub return_to: Option<String>,
}

impl Navigation {
    pub fn replace(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            history: HistoryMode::Replace,
            return_to: None,
        }
    }
}

/// Applied result of a navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOutcome {
    /// Normalized destination the decision was computed for
    pub path: String,
    pub decision: GateDecision,
    /// `None` when the destination renders; a replace-redirect otherwise
    pub redirect: Option<Navigation>,
}

/// Pending evaluation, tagged with the path it was started for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationTicket {
    seq: u64,
    path: String,
    requested: String,
}

impl NavigationTicket {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// The navigation whose result may still be applied
#[derive(Debug, Clone)]
struct CurrentNavigation {
    seq: u64,
    path: String,
}

pub struct SessionGate {
    policy: RoutePolicy,
    guest: Arc<GuestSessionStore>,
    identity: Arc<dyn IdentityProvider>,
    current: Mutex<Option<CurrentNavigation>>,
    seq: AtomicU64,
}

impl SessionGate {
    pub fn new(
        policy: RoutePolicy,
        guest: Arc<GuestSessionStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            policy,
            guest,
            identity,
            current: Mutex::new(None),
            seq: AtomicU64::new(1),
        }
    }

    pub fn policy(&self) -> &RoutePolicy {
        &self.policy
    }

    /// Path of the navigation currently being shown (or evaluated)
    pub fn current_path(&self) -> Option<String> {
        self.current.lock().as_ref().map(|nav| nav.path.clone())
    }

    /// Compute the decision for `path` without touching navigation state.
    pub async fn evaluate(&self, path: &str) -> GateDecision {
        let path = normalize_path(path);
        let decision = match self.policy.classify(&path) {
            RouteAccess::Public => GateDecision::Allow,
            RouteAccess::RoleOnly(required) => match self.lookup_identity().await {
                Some(identity) => {
                    if self.role_admits(&identity, required).await {
                        GateDecision::Allow
                    } else {
                        GateDecision::RedirectToHome
                    }
                }
                None => GateDecision::RedirectToAuthRequired,
            },
            RouteAccess::IdentityOnly => {
                if self.lookup_identity().await.is_some() {
                    GateDecision::Allow
                } else {
                    GateDecision::RedirectToAuthRequired
                }
            }
            RouteAccess::GuestOrIdentity => {
                if self.guest.is_active() || self.lookup_identity().await.is_some() {
                    GateDecision::Allow
                } else {
                    GateDecision::RedirectToAnonymousEntry
                }
            }
        };
        debug!(path = %path, decision = decision.as_str(), "Gate evaluated");
        decision
    }

    /// Record `path` as the current navigation and return its ticket.
    ///
    /// Every evaluation still pending becomes stale, including one for the
    /// same path.
    pub fn begin(&self, path: &str) -> NavigationTicket {
        let normalized = normalize_path(path);
        let mut current = self.current.lock();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        *current = Some(CurrentNavigation {
            seq,
            path: normalized.clone(),
        });
        NavigationTicket {
            seq,
            path: normalized,
            requested: return_target(path),
        }
    }

    /// Apply a finished evaluation, unless a newer navigation replaced it.
    ///
    /// An applied redirect moves the current path to the redirect target.
    pub fn settle(&self, ticket: NavigationTicket, decision: GateDecision) -> Option<RouteOutcome> {
        let mut current = self.current.lock();
        let is_current = matches!(
            current.as_ref(),
            Some(nav) if nav.seq == ticket.seq && nav.path == ticket.path
        );
        if !is_current {
            debug!(
                seq = ticket.seq,
                path = %ticket.path,
                current_seq = current.as_ref().map(|nav| nav.seq).unwrap_or(0),
                current = current.as_ref().map(|nav| nav.path.as_str()).unwrap_or("-"),
                decision = decision.as_str(),
                "Discarding stale gate result"
            );
            return None;
        }

        let redirect = match decision {
            GateDecision::Allow => None,
            GateDecision::RedirectToAnonymousEntry => {
                Some(Navigation::replace(self.policy.anonymous_entry_path()))
            }
            GateDecision::RedirectToAuthRequired => Some(Navigation {
                target: self.policy.auth_required_path().to_string(),
                history: HistoryMode::Replace,
                return_to: Some(ticket.requested.clone()),
            }),
            GateDecision::RedirectToHome => Some(Navigation::replace(self.policy.home_path())),
        };
        if let Some(nav) = &redirect {
            *current = Some(CurrentNavigation {
                seq: ticket.seq,
                path: normalize_path(&nav.target),
            });
        }

        Some(RouteOutcome {
            path: ticket.path,
            decision,
            redirect,
        })
    }

    /// Handle a route entry: begin, evaluate, settle.
    ///
    /// Returns `None` if a newer navigation superseded this one while the
    /// identity lookup was pending.
    pub async fn navigate(&self, path: &str) -> Option<RouteOutcome> {
        let ticket = self.begin(path);
        let decision = self.evaluate(ticket.path()).await;
        self.settle(ticket, decision)
    }

    /// Fails closed: lookup errors count as "no identity".
    async fn lookup_identity(&self) -> Option<Identity> {
        match self.identity.current_identity().await {
            Ok(identity) => identity,
            Err(err) => {
                warn!(error = %err, "Identity lookup failed; treating viewer as anonymous");
                None
            }
        }
    }

    /// Fails closed: a missing profile or a failed lookup admits nothing.
    async fn role_admits(&self, identity: &Identity, required: Role) -> bool {
        match self.identity.profile_role(&identity.user_id).await {
            Ok(Some(role)) => role.admits(required),
            Ok(None) => {
                debug!(user_id = %identity.user_id, "No profile role on record");
                false
            }
            Err(err) => {
                warn!(user_id = %identity.user_id, error = %err, "Profile role lookup failed");
                false
            }
        }
    }
}
