//! Gate decisions over generated paths

use maylo::clock::ManualClock;
use maylo::gate::{normalize_path, GateDecision, RouteAccess, RoutePolicy, SessionGate};
use maylo::guest::{GuestConfig, GuestSessionStore};
use maylo::identity::{LocalIdentity, Role};
use maylo::storage::MemoryStorage;
use proptest::prelude::*;
use std::sync::Arc;

fn gate(identity: LocalIdentity, guest_active: bool) -> SessionGate {
    let guest = Arc::new(GuestSessionStore::new(
        Arc::new(MemoryStorage::new()),
        Arc::new(MemoryStorage::new()),
        Arc::new(ManualClock::at_millis(1_700_000_000_000)),
        GuestConfig::default(),
    ));
    if guest_active {
        guest.enable();
    }
    SessionGate::new(RoutePolicy::default(), guest, Arc::new(identity))
}

fn evaluate(gate: &SessionGate, path: &str) -> GateDecision {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(gate.evaluate(path))
}

fn path_strategy() -> impl Strategy<Value = String> {
    (
        prop::collection::vec("[a-z0-9-]{1,10}", 0..4),
        prop::option::of("[a-z=&]{0,12}"),
    )
        .prop_map(|(segments, query)| {
            let mut path = format!("/{}", segments.join("/"));
            if let Some(query) = query {
                path.push('?');
                path.push_str(&query);
            }
            path
        })
}

proptest! {
    /// Non-public paths redirect a viewer with neither guest session nor identity.
    #[test]
    fn anonymous_viewer_never_passes_non_public(path in path_strategy()) {
        let gate = gate(LocalIdentity::anonymous(), false);
        let decision = evaluate(&gate, &path);
        if gate.policy().is_public(&path) {
            prop_assert_eq!(decision, GateDecision::Allow);
        } else {
            prop_assert!(decision.is_redirect());
        }
    }

    /// An admin is allowed everywhere.
    #[test]
    fn admin_is_allowed_everywhere(path in path_strategy()) {
        let gate = gate(LocalIdentity::signed_in_as("u-1", Role::Admin), false);
        prop_assert_eq!(evaluate(&gate, &path), GateDecision::Allow);
    }

    /// A plain user is turned away only from role-restricted paths, and only home.
    #[test]
    fn user_is_sent_home_only_from_role_routes(path in prop_oneof![
        path_strategy(),
        path_strategy().prop_map(|p| format!("/business{}", p)),
    ]) {
        let gate = gate(LocalIdentity::signed_in_as("u-1", Role::User), false);
        let decision = evaluate(&gate, &path);
        match gate.policy().classify(&path) {
            RouteAccess::RoleOnly(_) => prop_assert_eq!(decision, GateDecision::RedirectToHome),
            _ => prop_assert_eq!(decision, GateDecision::Allow),
        }
    }

    /// Normalization is idempotent and drops query strings.
    #[test]
    fn normalize_is_idempotent(path in path_strategy()) {
        let once = normalize_path(&path);
        prop_assert_eq!(normalize_path(&once), once.clone());
        prop_assert!(!once.contains('?'));
        prop_assert!(once.starts_with('/'));
    }
}
