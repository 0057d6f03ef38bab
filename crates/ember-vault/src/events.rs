//! Observability events emitted by the vault.
//!
//! Events are buffered in the vault and handed out by
//! [`Vault::drain_events`](crate::vault::Vault::drain_events). They are only
//! recorded for operations that committed.

use serde::{Deserialize, Serialize};

use ember_core::types::AccountId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultEvent {
    Initialized,
    Staked { account: AccountId, amount: u128, epoch: u64 },
    Withdrawn { account: AccountId, amount: u128, epoch: u64 },
    RewardClaimed { account: AccountId, amount: u128, epoch: u64 },
    IncentiveAllocated { epoch: u64, amount: u128, eligible_stake: u128 },
    ReserveFunded { account: AccountId, amount: u128, epoch: u64 },
}

impl VaultEvent {
    /// Account the event concerns, if any.
    pub fn account(&self) -> Option<&AccountId> {
        match self {
            VaultEvent::Staked { account, .. }
            | VaultEvent::Withdrawn { account, .. }
            | VaultEvent::RewardClaimed { account, .. }
            | VaultEvent::ReserveFunded { account, .. } => Some(account),
            VaultEvent::Initialized | VaultEvent::IncentiveAllocated { .. } => None,
        }
    }
}
