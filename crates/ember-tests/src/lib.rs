//! Scenario and adversarial test suite for the Ember vault.
//!
//! Integration tests drive the full vault through its public operations
//! with in-memory token collaborators and check the accounting invariants
//! end to end.

pub mod helpers;
