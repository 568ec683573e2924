//! Integration tests for the Maylo client session core

pub mod test_utils;

mod config_integration;
mod guest_session;
