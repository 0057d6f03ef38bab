//! JSON reports for replayed scripts and saved vault states.

use serde::Serialize;

use ember_core::error::VaultError;
use ember_core::types::{EpochSnapshot, Member, MultiplierParams};
use ember_vault::{VaultState, VaultTotals};

use crate::script::{format_units, Simulation, StepOutcome};

#[derive(Debug, Serialize)]
pub struct MemberReport {
    pub label: String,
    pub account: String,
    pub balance: String,
    pub earned: String,
    pub claimable: String,
    pub multiplier_points: String,
    pub multiplier_bps: u64,
    pub stake_wallet: String,
    pub reward_wallet: String,
}

#[derive(Debug, Serialize)]
pub struct TotalsReport {
    pub total_staked: String,
    pub pending_deposits: String,
    pub total_allocated: String,
    pub undistributed: String,
    pub base_booked: String,
    pub bonus_booked: String,
    pub total_claimed: String,
    pub reserve_funded: String,
    pub bonus_paid: String,
    pub bonus_budget: String,
    pub reward_custody: String,
}

impl TotalsReport {
    fn new(t: &VaultTotals, reward_custody: u128) -> Result<Self, VaultError> {
        Ok(Self {
            total_staked: format_units(t.total_staked),
            pending_deposits: format_units(t.pending_deposits),
            total_allocated: format_units(t.total_allocated),
            undistributed: format_units(t.undistributed),
            base_booked: format_units(t.base_booked),
            bonus_booked: format_units(t.bonus_booked),
            total_claimed: format_units(t.total_claimed),
            reserve_funded: format_units(t.reserve_funded),
            bonus_paid: format_units(t.bonus_paid),
            bonus_budget: format_units(t.bonus_budget()?),
            reward_custody: format_units(reward_custody),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub epoch: u64,
    pub multiplier: MultiplierParams,
    pub members: Vec<MemberReport>,
    pub totals: TotalsReport,
    pub steps: Vec<StepOutcome>,
}

impl RunReport {
    /// Build the report for every labelled account that holds a member record.
    pub fn build(sim: &Simulation, steps: Vec<StepOutcome>) -> Result<Self, VaultError> {
        let vault = &sim.vault;
        let stake = vault.stake_asset().ok_or(VaultError::NotInitialized)?;
        let reward = vault.reward_asset().ok_or(VaultError::NotInitialized)?;

        let mut members = Vec::new();
        for (label, account) in &sim.labels {
            let Some(member) = vault.members(account) else {
                continue;
            };
            members.push(MemberReport {
                label: label.clone(),
                account: account.to_string(),
                balance: format_units(member.balance),
                earned: format_units(vault.earned(account)?),
                claimable: format_units(vault.claimable(account)?),
                multiplier_points: format_units(vault.get_multiplier_points(account)?),
                multiplier_bps: vault.get_multiplier(account)?,
                stake_wallet: format_units(stake.balance_of(account)),
                reward_wallet: format_units(reward.balance_of(account)),
            });
        }

        Ok(Self {
            epoch: vault.current_epoch(),
            multiplier: vault.multiplier_params(),
            members,
            totals: TotalsReport::new(&vault.totals(), reward.custody())?,
            steps,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StateMember {
    pub account: String,
    #[serde(flatten)]
    pub member: Member,
}

/// A saved state rendered with hex account ids.
#[derive(Debug, Serialize)]
pub struct StateReport {
    pub multiplier: MultiplierParams,
    pub totals: VaultTotals,
    pub epochs: Vec<EpochSnapshot>,
    pub members: Vec<StateMember>,
}

impl From<&VaultState> for StateReport {
    fn from(state: &VaultState) -> Self {
        Self {
            multiplier: state.multiplier,
            totals: state.totals,
            epochs: state.ledger.iter().copied().collect(),
            members: state
                .members
                .iter()
                .map(|(account, member)| StateMember { account: account.to_string(), member: *member })
                .collect(),
        }
    }
}
