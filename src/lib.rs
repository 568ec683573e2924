//! Maylo: client session core for a local-services marketplace
//!
//! Decides who may see which screen and keeps the viewer's saved entities in
//! step with the remote store:
//!
//! - [`guest`] tracks a time-boxed guest session across a volatile marker and
//!   a durable expiry fallback;
//! - [`gate`] decides, per route entry, whether to render or redirect;
//! - [`favorites`] toggles saved entities optimistically against a remote
//!   store, with per-entity serialization and rollback.

pub mod app;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod favorites;
pub mod gate;
pub mod guest;
pub mod identity;
pub mod logging;
pub mod session;
pub mod storage;
pub mod subscription;
pub mod teardown;
