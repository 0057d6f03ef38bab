//! # ember-core
//! Foundation types, the epoch ledger and the member store for the Ember
//! staking vault.
//!
//! All accounting uses integer fixed-point arithmetic with checked
//! operations; nothing silently wraps.

pub mod constants;
pub mod error;
pub mod ledger;
pub mod math;
pub mod members;
pub mod memory;
pub mod traits;
pub mod types;
