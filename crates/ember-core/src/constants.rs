//! Vault constants. All amounts are in base units (1 token = 10^18 units).

/// One whole token in base units.
pub const UNIT: u128 = 1_000_000_000_000_000_000;

/// Fixed-point scale of the cumulative reward-per-share accumulator.
pub const REWARD_PRECISION: u128 = 1_000_000_000_000_000_000;

/// Basis-point denominator. 10 000 BPS = 1.0×.
pub const BPS_PRECISION: u64 = 10_000;

/// Multiplier factor of a member with no loyalty (1.0×).
pub const MULTIPLIER_BASE_BPS: u64 = BPS_PRECISION;

/// Multiplier growth per accruing epoch (+1.25% per epoch).
///
/// With the default cap the ceiling is reached after 100 accruing epochs.
pub const MULTIPLIER_RATE_PER_EPOCH_BPS: u64 = 125;

/// Ceiling of the loyalty multiplier (2.25×).
pub const MULTIPLIER_CAP_BPS: u64 = 22_500;
