//! Checked fixed-point helpers.
//!
//! Reward products such as `balance × reward_per_share` routinely exceed
//! `u128` for 18-decimal assets, so they go through a 256-bit intermediate.
//! Factor-weighted sums multiply a reward-per-share by basis points and by
//! epoch indices, so they are carried as [`U256`].
//! Every helper reports [`VaultError::ArithmeticOverflow`] instead of wrapping.

use serde::{Deserialize, Serialize};

use crate::error::VaultError;

/// Compute `floor(a * b / c)` without intermediate overflow.
///
/// Fails if `c` is zero or the quotient does not fit in `u128`.
///
/// # Examples
///
/// ```
/// use ember_core::math::mul_div;
///
/// // 10^30 * 10^20 overflows u128 but the quotient does not.
/// let q = mul_div(10u128.pow(30), 10u128.pow(20), 10u128.pow(25)).unwrap();
/// assert_eq!(q, 10u128.pow(25));
/// assert!(mul_div(1, 1, 0).is_err());
/// ```
pub fn mul_div(a: u128, b: u128, c: u128) -> Result<u128, VaultError> {
    if c == 0 {
        return Err(VaultError::ArithmeticOverflow);
    }
    let (hi, lo) = widening_mul(a, b);
    div_wide(hi, lo, c).map(|(q, _)| q)
}

/// Compute `floor(a * w / c)` for a 256-bit `w`.
///
/// `w` is split as `q × c + r` first, so only `a × q` has to fit in `u128`.
/// Fails if `c` is zero or the quotient does not fit in `u128`.
pub fn mul_div_wide(a: u128, w: U256, c: u128) -> Result<u128, VaultError> {
    if a == 0 {
        return Ok(0);
    }
    let (q, r) = w.div_rem(c)?;
    let whole = mul(a, q.to_u128()?)?;
    add(whole, mul_div(a, r, c)?)
}

/// Checked addition.
pub fn add(a: u128, b: u128) -> Result<u128, VaultError> {
    a.checked_add(b).ok_or(VaultError::ArithmeticOverflow)
}

/// Checked subtraction.
pub fn sub(a: u128, b: u128) -> Result<u128, VaultError> {
    a.checked_sub(b).ok_or(VaultError::ArithmeticOverflow)
}

/// Checked multiplication.
pub fn mul(a: u128, b: u128) -> Result<u128, VaultError> {
    a.checked_mul(b).ok_or(VaultError::ArithmeticOverflow)
}

/// 128×128 → 256-bit multiply, returned as `(hi, lo)`.
fn widening_mul(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = 0xFFFF_FFFF_FFFF_FFFF;
    let (a_lo, a_hi) = (a & MASK, a >> 64);
    let (b_lo, b_hi) = (b & MASK, b >> 64);

    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    let (mid, mid_carry) = lh.overflowing_add(hl);
    let (lo, lo_carry) = ll.overflowing_add(mid << 64);

    let hi = hh
        .wrapping_add(mid >> 64)
        .wrapping_add(if mid_carry { 1u128 << 64 } else { 0 })
        .wrapping_add(u128::from(lo_carry));

    (hi, lo)
}

/// Divide the 256-bit value `(hi, lo)` by `divisor` with binary long division.
///
/// Returns quotient and remainder.
fn div_wide(hi: u128, lo: u128, divisor: u128) -> Result<(u128, u128), VaultError> {
    if hi == 0 {
        return Ok((lo / divisor, lo % divisor));
    }
    // Quotient would need more than 128 bits.
    if hi >= divisor {
        return Err(VaultError::ArithmeticOverflow);
    }

    // Invariant: rem < divisor at the start of each iteration.
    let mut rem = hi;
    let mut quotient: u128 = 0;
    for i in (0u32..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> i) & 1);
        quotient <<= 1;
        // With carry set the true remainder is rem + 2^128, always >= divisor.
        if carry > 0 || rem >= divisor {
            rem = rem.wrapping_sub(divisor);
            quotient |= 1;
        }
    }
    Ok((quotient, rem))
}

/// Unsigned 256-bit integer, as much of one as the ledger needs.
///
/// Field order makes the derived ordering numeric.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
    bincode::Encode, bincode::Decode,
)]
pub struct U256 {
    hi: u128,
    lo: u128,
}

impl U256 {
    pub const ZERO: Self = Self { hi: 0, lo: 0 };

    pub const fn from_parts(hi: u128, lo: u128) -> Self {
        Self { hi, lo }
    }

    /// Full product of two `u128`s. Never overflows.
    pub fn product(a: u128, b: u128) -> Self {
        let (hi, lo) = widening_mul(a, b);
        Self { hi, lo }
    }

    pub fn hi(&self) -> u128 {
        self.hi
    }

    pub fn lo(&self) -> u128 {
        self.lo
    }

    pub fn is_zero(&self) -> bool {
        self.hi == 0 && self.lo == 0
    }

    /// Narrow to `u128`, failing if the high half is set.
    pub fn to_u128(self) -> Result<u128, VaultError> {
        if self.hi != 0 {
            return Err(VaultError::ArithmeticOverflow);
        }
        Ok(self.lo)
    }

    pub fn checked_add(self, other: Self) -> Result<Self, VaultError> {
        let (lo, carry) = self.lo.overflowing_add(other.lo);
        let hi = add(self.hi, other.hi)?;
        Ok(Self { hi: add(hi, u128::from(carry))?, lo })
    }

    pub fn checked_sub(self, other: Self) -> Result<Self, VaultError> {
        let (lo, borrow) = self.lo.overflowing_sub(other.lo);
        let hi = sub(self.hi, other.hi)?;
        Ok(Self { hi: sub(hi, u128::from(borrow))?, lo })
    }

    pub fn checked_mul(self, m: u128) -> Result<Self, VaultError> {
        let (carry, lo) = widening_mul(self.lo, m);
        let hi = add(mul(self.hi, m)?, carry)?;
        Ok(Self { hi, lo })
    }

    /// Quotient and remainder of division by `divisor`.
    pub fn div_rem(self, divisor: u128) -> Result<(Self, u128), VaultError> {
        if divisor == 0 {
            return Err(VaultError::ArithmeticOverflow);
        }
        let q_hi = self.hi / divisor;
        let (q_lo, rem) = div_wide(self.hi % divisor, self.lo, divisor)?;
        Ok((Self { hi: q_hi, lo: q_lo }, rem))
    }
}

impl From<u128> for U256 {
    fn from(v: u128) -> Self {
        Self { hi: 0, lo: v }
    }
}
