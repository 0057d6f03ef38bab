//! # ember-vault — Settlement, vault façade and host plumbing.
//!
//! Composes the ledger, member store and multiplier engine into a vault:
//! - [`settlement`] — lazy per-member reward reconciliation
//! - [`vault::Vault`] — the public operations, atomic per call
//! - [`events::VaultEvent`] — observability events
//! - [`config::VaultConfig`] — multiplier parameters from file and environment
//! - [`shared::SharedVault`] — a vault behind a single global lock
//! - [`state::VaultState`] — bincode snapshots of vault state

pub mod config;
pub mod events;
pub mod settlement;
pub mod shared;
pub mod state;
pub mod vault;

pub use config::VaultConfig;
pub use events::VaultEvent;
pub use settlement::{settle, Settlement};
pub use shared::SharedVault;
pub use state::VaultState;
pub use vault::{Vault, VaultTotals};
