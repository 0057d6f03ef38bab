//! Member store: per-account stake balance and settlement checkpoint.
//!
//! Records are keyed by [`AccountId`] in a `BTreeMap` so that iteration and
//! snapshots are deterministic. The store performs no accounting itself;
//! the settlement engine computes new records and the vault commits them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{AccountId, Member};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct MemberStore {
    members: BTreeMap<AccountId, Member>,
}

impl MemberStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self { members: BTreeMap::new() }
    }

    /// Look up a member. Returns `None` if the account never staked.
    pub fn get(&self, account: &AccountId) -> Option<&Member> {
        self.members.get(account)
    }

    /// Copy of the member record, or a zeroed record for unknown accounts.
    pub fn get_or_default(&self, account: &AccountId) -> Member {
        self.members.get(account).copied().unwrap_or_default()
    }

    /// Whether the account has a record.
    pub fn contains(&self, account: &AccountId) -> bool {
        self.members.contains_key(account)
    }

    /// Commit a member record, replacing any previous one.
    pub fn insert(&mut self, account: AccountId, member: Member) {
        self.members.insert(account, member);
    }

    /// Number of members, including those at zero balance.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterate over members in account order.
    pub fn iter(&self) -> impl Iterator<Item = (&AccountId, &Member)> {
        self.members.iter()
    }

    /// Sum of all member balances.
    pub fn total_balance(&self) -> Option<u128> {
        self.members
            .values()
            .try_fold(0u128, |acc, m| acc.checked_add(m.balance))
    }
}
