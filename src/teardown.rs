//! Context teardown signals
//!
//! A teardown signal means the execution context is being hidden or unloaded.
//! It is not a guarantee the context is gone: a hidden context may be resumed.

use crate::subscription::{SubscriptionId, Subscribers};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownEvent {
    /// The context was hidden (may be resumed later)
    PageHide,
    /// The context is unloading
    Unload,
}

impl TeardownEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            TeardownEvent::PageHide => "page_hide",
            TeardownEvent::Unload => "unload",
        }
    }
}

pub type TeardownHandler = dyn Fn(TeardownEvent) + Send + Sync;

/// Subscription point for teardown events
pub trait TeardownSource: Send + Sync {
    fn subscribe(&self, handler: Arc<TeardownHandler>) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId);
}

/// In-process teardown source; the host calls [`TeardownBus::emit`].
#[derive(Default)]
pub struct TeardownBus {
    handlers: Subscribers<TeardownHandler>,
}

impl TeardownBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: TeardownEvent) {
        let handlers = self.handlers.snapshot();
        debug!(
            event = event.as_str(),
            handlers = handlers.len(),
            "Emitting teardown event"
        );
        for handler in handlers {
            handler(event);
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl TeardownSource for TeardownBus {
    fn subscribe(&self, handler: Arc<TeardownHandler>) -> SubscriptionId {
        self.handlers.add(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.handlers.remove(id);
    }
}

/// Attached teardown handler.
///
/// Dropping the registration leaves the handler attached; call
/// [`TeardownRegistration::detach`] to remove it.
pub struct TeardownRegistration {
    source: Arc<dyn TeardownSource>,
    id: SubscriptionId,
}

impl TeardownRegistration {
    pub fn new(source: Arc<dyn TeardownSource>, id: SubscriptionId) -> Self {
        Self { source, id }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn detach(self) {
        self.source.unsubscribe(self.id);
    }
}
