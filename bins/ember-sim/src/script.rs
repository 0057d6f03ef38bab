//! Scenario scripts: JSON step lists replayed against a vault.
//!
//! ```json
//! {
//!   "allocator": "treasury",
//!   "steps": [
//!     { "op": "fund", "account": "alice", "asset": "stake", "amount": "100" },
//!     { "op": "stake", "account": "alice", "amount": "10" },
//!     { "op": "allocate", "amount": "5" },
//!     { "op": "claim", "account": "alice" }
//!   ]
//! }
//! ```
//!
//! Accounts are labels mapped to ids with [`AccountId::from_label`].
//! Amounts are decimal token strings with up to 18 fractional digits.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ember_core::constants::UNIT;
use ember_core::error::VaultError;
use ember_core::memory::{FixedAllocator, MemoryToken};
use ember_core::types::AccountId;
use ember_vault::{Vault, VaultConfig};

/// Number of fractional digits in a token amount.
const DECIMALS: usize = 18;

pub type SimVault = Vault<MemoryToken, FixedAllocator>;

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    /// Label of the allocator account.
    #[serde(default = "default_allocator")]
    pub allocator: String,
    pub steps: Vec<Step>,
}

fn default_allocator() -> String {
    "allocator".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Asset {
    Stake,
    Reward,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Mint tokens to an account outside the vault.
    Fund { account: String, asset: Asset, amount: Amount },
    Stake { account: String, amount: Amount },
    Withdraw { account: String, amount: Amount },
    Claim { account: String },
    /// Allocate as the script's allocator, or as `caller` if given.
    Allocate {
        amount: Amount,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caller: Option<String>,
    },
    /// Deposit reward from `account` into the loyalty bonus reserve.
    FundReserve { account: String, amount: Amount },
}

/// A token amount in base units, written as a decimal token string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(pub u128);

impl TryFrom<String> for Amount {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        parse_units(&s).map(Amount)
    }
}

impl From<Amount> for String {
    fn from(a: Amount) -> String {
        format_units(a.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_units(self.0))
    }
}

/// Parse a decimal token string such as `"12.5"` into base units.
pub fn parse_units(s: &str) -> Result<u128, String> {
    let s = s.trim();
    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    if whole.is_empty() && frac.is_empty() {
        return Err(format!("invalid amount {s:?}"));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("invalid amount {s:?}"));
    }
    if frac.len() > DECIMALS {
        return Err(format!("amount {s:?} has more than {DECIMALS} decimals", DECIMALS = DECIMALS));
    }

    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| format!("amount {s:?} too large"))? };
    let frac_units: u128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<width$}", width = DECIMALS);
        padded.parse().map_err(|_| format!("invalid amount {s:?}"))?
    };
    whole
        .checked_mul(UNIT)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(|| format!("amount {s:?} too large"))
}

/// Format base units as a decimal token string without trailing zeros.
pub fn format_units(v: u128) -> String {
    let whole = v / UNIT;
    let frac = v % UNIT;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:0>width$}", width = DECIMALS);
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

/// Outcome of one replayed step.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub step: Step,
    pub epoch: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A vault backed by in-memory tokens plus the labels seen so far.
pub struct Simulation {
    pub vault: SimVault,
    pub allocator: AccountId,
    /// Accounts referenced by the script, by label.
    pub labels: BTreeMap<String, AccountId>,
}

impl Simulation {
    pub fn new(config: &VaultConfig, allocator_label: &str) -> Result<Self, VaultError> {
        let allocator = AccountId::from_label(allocator_label);
        let mut vault = SimVault::with_config(config)?;
        vault.initialize(
            MemoryToken::new("RWD"),
            MemoryToken::new("STK"),
            FixedAllocator(allocator),
        )?;
        Ok(Self { vault, allocator, labels: BTreeMap::new() })
    }

    fn account(&mut self, label: &str) -> AccountId {
        *self
            .labels
            .entry(label.to_string())
            .or_insert_with(|| AccountId::from_label(label))
    }

    /// Apply one step. Returns the claimed amount for claim steps.
    pub fn apply(&mut self, step: &Step) -> Result<Option<u128>, VaultError> {
        match step {
            Step::Fund { account, asset, amount } => {
                let id = self.account(account);
                let token = match asset {
                    Asset::Stake => self.vault.stake_asset_mut(),
                    Asset::Reward => self.vault.reward_asset_mut(),
                }
                .ok_or(VaultError::NotInitialized)?;
                token.mint(&id, amount.0)?;
                Ok(None)
            }
            Step::Stake { account, amount } => {
                let id = self.account(account);
                self.vault.stake(&id, amount.0).map(|_| None)
            }
            Step::Withdraw { account, amount } => {
                let id = self.account(account);
                self.vault.withdraw(&id, amount.0).map(|_| None)
            }
            Step::Claim { account } => {
                let id = self.account(account);
                self.vault.claim_reward(&id).map(Some)
            }
            Step::Allocate { amount, caller } => {
                let id = match caller {
                    Some(label) => AccountId::from_label(label),
                    None => self.allocator,
                };
                self.vault.allocate_incentive(&id, amount.0).map(|_| None)
            }
            Step::FundReserve { account, amount } => {
                let id = self.account(account);
                self.vault.fund_reserve(&id, amount.0).map(|_| None)
            }
        }
    }

    /// Replay every step of `script`.
    ///
    /// With `strict`, the first failing step aborts the run; otherwise the
    /// failure is recorded and replay continues.
    pub fn run(&mut self, script: &Script, strict: bool) -> Result<Vec<StepOutcome>, VaultError> {
        let mut outcomes = Vec::with_capacity(script.steps.len());
        for (index, step) in script.steps.iter().enumerate() {
            let result = self.apply(step);
            let epoch = self.vault.current_epoch();
            match result {
                Ok(claimed) => outcomes.push(StepOutcome {
                    index,
                    step: step.clone(),
                    epoch,
                    claimed: claimed.map(format_units),
                    error: None,
                }),
                Err(e) if strict => return Err(e),
                Err(e) => {
                    warn!(index, error = %e, "step failed");
                    outcomes.push(StepOutcome {
                        index,
                        step: step.clone(),
                        epoch,
                        claimed: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        info!(steps = outcomes.len(), epoch = self.vault.current_epoch(), "script replayed");
        Ok(outcomes)
    }
}
