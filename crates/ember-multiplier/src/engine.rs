//! Multiplier engine implementing the [`MultiplierCalculator`] trait.
//!
//! The factor for loyalty level `k` is `min(base + rate × k, cap)` basis
//! points. Over an epoch span the level grows by one per epoch, so the
//! factor-weighted sum splits into a linear part and a capped part, each of
//! which is a closed form over the ledger's prefix sums.

use ember_core::error::VaultError;
use ember_core::ledger::EpochLedger;
use ember_core::math::U256;
use ember_core::traits::MultiplierCalculator;
use ember_core::types::MultiplierParams;

/// The production multiplier calculator.
#[derive(Debug, Clone, Default)]
pub struct MultiplierEngine {
    params: MultiplierParams,
}

impl MultiplierEngine {
    /// Create an engine with validated parameters.
    pub fn new(params: MultiplierParams) -> Result<Self, VaultError> {
        params.validate()?;
        Ok(Self { params })
    }

    /// First loyalty level whose factor equals the cap.
    ///
    /// `ceil((cap - base) / rate)`. Returns `None` when the rate is zero and
    /// the factor never leaves the base.
    pub fn cap_level(&self) -> Option<u64> {
        let MultiplierParams { base_bps, rate_per_epoch_bps, cap_bps } = self.params;
        if rate_per_epoch_bps == 0 {
            return None;
        }
        Some((cap_bps - base_bps).div_ceil(rate_per_epoch_bps))
    }
}

impl MultiplierCalculator for MultiplierEngine {
    fn params(&self) -> MultiplierParams {
        self.params
    }

    fn factor_bps(&self, level: u64) -> u64 {
        let MultiplierParams { base_bps, rate_per_epoch_bps, cap_bps } = self.params;
        base_bps
            .saturating_add(rate_per_epoch_bps.saturating_mul(level))
            .min(cap_bps)
    }

    fn weighted_span(
        &self,
        ledger: &EpochLedger,
        from: u64,
        to: u64,
        start_level: u64,
    ) -> Result<U256, VaultError> {
        let span = ledger.span(from, to)?;
        if span.is_empty() {
            return Ok(U256::ZERO);
        }

        let base = self.params.base_bps as u128;
        let rate = self.params.rate_per_epoch_bps as u128;
        let cap = self.params.cap_bps as u128;

        let Some(cap_level) = self.cap_level() else {
            return Ok(U256::product(span.delta, base));
        };
        if start_level >= cap_level {
            return Ok(U256::product(span.delta, cap));
        }

        // Epochs from+1 ..= linear_end are paid below the cap.
        let linear_end = to.min(from.saturating_add(cap_level - start_level));
        let linear = ledger.span(from, linear_end)?;

        // Σ delta_e × (e - from - 1): every epoch in the span is > from.
        let first = (from as u128) + 1;
        let offset = linear.weighted.checked_sub(U256::product(linear.delta, first))?;
        let start_factor = self.factor_bps(start_level) as u128;
        let mut total = U256::product(linear.delta, start_factor).checked_add(offset.checked_mul(rate)?)?;

        if linear_end < to {
            let capped = ledger.span(linear_end, to)?;
            total = total.checked_add(U256::product(capped.delta, cap))?;
        }
        Ok(total)
    }
}
