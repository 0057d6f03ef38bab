//! Vault state snapshots.
//!
//! A [`VaultState`] holds everything the accounting depends on: the ledger,
//! the member store, the aggregates and the multiplier parameters the
//! members were settled under. Collaborators are not part of it.
//!
//! Encoded with bincode's standard config and prefixed by a format version.

use std::path::Path;

use serde::{Deserialize, Serialize};

use ember_core::error::VaultError;
use ember_core::ledger::EpochLedger;
use ember_core::math;
use ember_core::members::MemberStore;
use ember_core::types::MultiplierParams;

use crate::vault::VaultTotals;

/// Snapshot format version.
pub const STATE_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct VaultState {
    pub ledger: EpochLedger,
    pub members: MemberStore,
    pub totals: VaultTotals,
    pub multiplier: MultiplierParams,
}

impl VaultState {
    /// Encode as `version || bincode(state)`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, VaultError> {
        let cfg = bincode::config::standard();
        let mut out = bincode::encode_to_vec(STATE_VERSION, cfg).map_err(snapshot)?;
        out.extend(bincode::encode_to_vec(self, cfg).map_err(snapshot)?);
        Ok(out)
    }

    /// Decode bytes produced by [`to_bytes`](Self::to_bytes) and verify them.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VaultError> {
        let cfg = bincode::config::standard();
        let (version, read): (u32, usize) = bincode::decode_from_slice(bytes, cfg).map_err(snapshot)?;
        if version != STATE_VERSION {
            return Err(VaultError::Snapshot(format!("unsupported state version {version}")));
        }
        let (state, used): (VaultState, usize) =
            bincode::decode_from_slice(&bytes[read..], cfg).map_err(snapshot)?;
        if read + used != bytes.len() {
            return Err(VaultError::Snapshot("trailing bytes after state".into()));
        }
        state.verify()?;
        Ok(state)
    }

    pub fn save(&self, path: &Path) -> Result<(), VaultError> {
        std::fs::write(path, self.to_bytes()?).map_err(|e| VaultError::Snapshot(format!("{}: {e}", path.display())))
    }

    pub fn load(path: &Path) -> Result<Self, VaultError> {
        let bytes = std::fs::read(path).map_err(|e| VaultError::Snapshot(format!("{}: {e}", path.display())))?;
        Self::from_bytes(&bytes)
    }

    /// Check internal consistency.
    ///
    /// The ledger must be well formed and every member checkpoint must sit
    /// on it. The aggregates must match the member records: staked balance,
    /// frozen deposits, and pending plus claimed reward against what was
    /// booked.
    pub fn verify(&self) -> Result<(), VaultError> {
        self.ledger.verify().map_err(|e| VaultError::Snapshot(format!("ledger: {e}")))?;
        self.multiplier
            .validate()
            .map_err(|e| VaultError::Snapshot(format!("multiplier: {e}")))?;

        let len = self.ledger.current_index();
        let mut frozen = 0u128;
        let mut pending = 0u128;
        let mut pending_bonus = 0u128;
        for (account, m) in self.members.iter() {
            if m.checkpoint_index > len || m.stake_epoch_index > m.checkpoint_index {
                return Err(VaultError::Snapshot(format!(
                    "member {account} checkpoint {} stake epoch {} beyond ledger length {len}",
                    m.checkpoint_index, m.stake_epoch_index
                )));
            }
            let cumulative = self.ledger.cumulative_at(m.checkpoint_index).map_err(snapshot)?;
            if m.reward_per_share_checkpoint != cumulative.reward_per_share {
                return Err(VaultError::Snapshot(format!(
                    "member {account} reward per share {} off ledger value {} at epoch {}",
                    m.reward_per_share_checkpoint, cumulative.reward_per_share, m.checkpoint_index
                )));
            }
            if m.deposit_window_open() && m.eligible_balance > m.balance {
                return Err(VaultError::Snapshot(format!("member {account} eligible balance above balance")));
            }
            if m.pending_bonus > m.pending_reward {
                return Err(VaultError::Snapshot(format!("member {account} pending bonus above pending reward")));
            }
            frozen = math::add(frozen, m.frozen_balance(len)).map_err(snapshot)?;
            pending = math::add(pending, m.pending_reward).map_err(snapshot)?;
            pending_bonus = math::add(pending_bonus, m.pending_bonus).map_err(snapshot)?;
        }

        let t = &self.totals;
        let total = self
            .members
            .total_balance()
            .ok_or_else(|| VaultError::Snapshot("member balances overflow".into()))?;
        if total != t.total_staked {
            return Err(VaultError::Snapshot(format!(
                "total staked {} does not match member balances {total}",
                t.total_staked
            )));
        }
        if frozen != t.pending_deposits {
            return Err(VaultError::Snapshot(format!(
                "pending deposits {} do not match frozen member stake {frozen}",
                t.pending_deposits
            )));
        }

        let distributed = math::sub(t.total_allocated, t.undistributed)
            .map_err(|_| VaultError::Snapshot("undistributed exceeds total allocated".into()))?;
        if t.base_booked > distributed {
            return Err(VaultError::Snapshot("base reward booked exceeds distributed allocations".into()));
        }
        let booked = math::add(t.base_booked, t.bonus_booked).map_err(snapshot)?;
        if math::add(pending, t.total_claimed).map_err(snapshot)? != booked {
            return Err(VaultError::Snapshot("pending plus claimed reward does not match booked reward".into()));
        }
        if math::add(pending_bonus, t.bonus_paid).map_err(snapshot)? != t.bonus_booked {
            return Err(VaultError::Snapshot("pending plus paid bonus does not match booked bonus".into()));
        }
        t.bonus_budget()
            .map_err(|_| VaultError::Snapshot("bonus paid exceeds undistributed and reserve funding".into()))?;
        Ok(())
    }
}

fn snapshot(e: impl std::fmt::Display) -> VaultError {
    VaultError::Snapshot(e.to_string())
}
