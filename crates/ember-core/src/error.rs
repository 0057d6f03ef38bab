//! Error types for the Ember vault.
use thiserror::Error;

use crate::types::AccountId;

/// Failure reported by a token-transfer collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("insufficient balance: have {have}, need {need}")] InsufficientBalance { have: u128, need: u128 },
    #[error("transfer rejected: {0}")] Rejected(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("invalid amount")] InvalidAmount,
    #[error("unauthorized caller: {0}")] Unauthorized(AccountId),
    #[error("vault not initialized")] NotInitialized,
    #[error("vault already initialized")] AlreadyInitialized,
    #[error("epoch {index} out of range (ledger length {len})")] EpochOutOfRange { index: u64, len: u64 },
    #[error("arithmetic overflow")] ArithmeticOverflow,
    #[error("transfer failed: {0}")] TransferFailed(#[from] TransferError),
    #[error("invalid account id: {0}")] InvalidAccount(String),
    #[error("invalid config: {0}")] InvalidConfig(String),
    #[error("snapshot: {0}")] Snapshot(String),
}
