//! Property-based tests for session invariants

mod gate_properties;
