//! Integration tests for the guest session across teardown and resume

use chrono::{DateTime, Utc};
use maylo::clock::ManualClock;
use maylo::guest::{GuestConfig, GuestSessionStore};
use maylo::storage::{KeyValueStorage, MemoryStorage, SledStorage, UnavailableStorage};
use maylo::teardown::{TeardownBus, TeardownEvent};
use std::sync::Arc;

const BASE_MS: i64 = 1_700_000_000_000;

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(BASE_MS + secs * 1000).unwrap()
}

struct Context {
    clock: Arc<ManualClock>,
    bus: Arc<TeardownBus>,
    store: GuestSessionStore,
}

fn context_with(durable: Arc<dyn KeyValueStorage>, clock: Arc<ManualClock>) -> Context {
    let bus = Arc::new(TeardownBus::new());
    let store = GuestSessionStore::new(
        Arc::new(MemoryStorage::new()),
        durable,
        clock.clone(),
        GuestConfig::default(),
    );
    store.attach_auto_expire_on_teardown(bus.clone());
    Context { clock, bus, store }
}

#[test]
fn test_hidden_context_resumes_within_fallback_window() {
    let ctx = context_with(
        Arc::new(MemoryStorage::new()),
        Arc::new(ManualClock::new(at(0))),
    );

    ctx.store.enable();
    assert!(ctx.store.is_active());

    ctx.clock.set(at(10));
    ctx.bus.emit(TeardownEvent::PageHide);
    assert!(!ctx.store.state().primary_marker);
    assert_eq!(ctx.store.state().expires_at, Some(at(7200)));

    ctx.clock.set(at(100));
    assert!(ctx.store.is_active());
    assert!(ctx.store.state().primary_marker);

    ctx.clock.set(at(7000));
    ctx.bus.emit(TeardownEvent::PageHide);

    ctx.clock.set(at(7300));
    assert!(!ctx.store.is_active());
    assert_eq!(ctx.store.state().expires_at, None);
    assert!(!ctx.store.is_active());
}

#[test]
fn test_enable_renews_the_fallback_boundary() {
    let ctx = context_with(
        Arc::new(MemoryStorage::new()),
        Arc::new(ManualClock::new(at(0))),
    );
    ctx.store.enable();

    ctx.clock.set(at(3600));
    ctx.store.enable();
    ctx.bus.emit(TeardownEvent::Unload);

    ctx.clock.set(at(7300));
    assert!(ctx.store.is_active());
    assert_eq!(ctx.store.state().expires_at, Some(at(3600 + 7200)));
}

#[test]
fn test_new_context_rehydrates_from_sled_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let durable: Arc<dyn KeyValueStorage> = Arc::new(SledStorage::open(dir.path()).unwrap());
    let clock = Arc::new(ManualClock::new(at(0)));

    let first = context_with(durable.clone(), clock.clone());
    first.store.enable();
    first.bus.emit(TeardownEvent::Unload);

    clock.set(at(60));
    let second = context_with(durable.clone(), clock.clone());
    assert!(!second.store.state().primary_marker);
    assert!(second.store.is_active());
    assert!(second.store.state().primary_marker);

    second.store.disable();
    let third = context_with(durable, clock);
    assert!(!third.store.is_active());
}

#[test]
fn test_detached_handler_no_longer_clears_marker() {
    let bus = Arc::new(TeardownBus::new());
    let store = GuestSessionStore::new(
        Arc::new(MemoryStorage::new()),
        Arc::new(MemoryStorage::new()),
        Arc::new(ManualClock::new(at(0))),
        GuestConfig::default(),
    );
    let registration = store.attach_auto_expire_on_teardown(bus.clone());
    assert_eq!(bus.handler_count(), 1);

    registration.detach();
    assert_eq!(bus.handler_count(), 0);

    store.enable();
    bus.emit(TeardownEvent::PageHide);
    assert!(store.state().primary_marker);
}

#[test]
fn test_missing_durable_medium_ends_guest_on_teardown() {
    let ctx = context_with(
        Arc::new(UnavailableStorage::new("private browsing")),
        Arc::new(ManualClock::new(at(0))),
    );

    ctx.store.enable();
    assert!(ctx.store.is_active());

    ctx.bus.emit(TeardownEvent::PageHide);
    assert!(!ctx.store.is_active());
    ctx.store.disable();
}

#[test]
fn test_custom_keys_and_ttl() {
    let durable = Arc::new(MemoryStorage::new());
    let store = GuestSessionStore::new(
        Arc::new(MemoryStorage::new()),
        durable.clone(),
        Arc::new(ManualClock::new(at(0))),
        GuestConfig {
            ttl_secs: 60,
            session_key: "ss".to_string(),
            ttl_key: "ttl".to_string(),
        },
    );
    store.enable();

    let raw = durable.get("ttl").unwrap().unwrap();
    assert_eq!(raw, (BASE_MS + 60_000).to_string());
    assert!(durable.get("maylo_guest_ttl").unwrap().is_none());
}
