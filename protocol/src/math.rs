//! # Basis-Point Arithmetic
//!
//! All money in the protocol is a `u128` count of the currency's smallest
//! unit, and all rates are basis points out of [`BPS_DENOMINATOR`]. This
//! module is the only place that multiplies the two.
//!
//! Division truncates toward zero. The payment schedule depends on that
//! direction being exact, so there is no rounding mode to pick from.

use thiserror::Error;

use crate::config::{BPS_DENOMINATOR, MAX_BPS};

/// Arithmetic failures. Each one means a caller asked for a number the
/// ledger can't represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("arithmetic overflow")]
    Overflow,

    #[error("arithmetic underflow")]
    Underflow,

    #[error("division by zero")]
    DivisionByZero,

    #[error("rate {0} bp exceeds 10000 bp")]
    RateOutOfRange(u32),
}

/// `amount * bps / 10_000`, truncating.
///
/// # Example
///
/// ```
/// use cyan_protocol::math::apply_bps;
///
/// // 25% of 11 units (18 decimals)
/// let down = apply_bps(11_000_000_000_000_000_000, 2_500).unwrap();
/// assert_eq!(down, 2_750_000_000_000_000_000);
/// ```
pub fn apply_bps(amount: u128, bps: u32) -> Result<u128, MathError> {
    amount
        .checked_mul(bps as u128)
        .map(|scaled| scaled / BPS_DENOMINATOR)
        .ok_or(MathError::Overflow)
}

/// Rejects rates above 100%.
pub fn validate_bps(bps: u32) -> Result<u32, MathError> {
    if bps > MAX_BPS {
        return Err(MathError::RateOutOfRange(bps));
    }
    Ok(bps)
}

pub fn checked_add(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

pub fn checked_sub(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_sub(b).ok_or(MathError::Underflow)
}

pub fn checked_mul(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_mul(b).ok_or(MathError::Overflow)
}

/// Truncating division that reports a zero divisor instead of panicking.
pub fn checked_div(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_div(b).ok_or(MathError::DivisionByZero)
}

/// Sums a sequence of amounts, failing on the first overflow.
pub fn checked_sum<I: IntoIterator<Item = u128>>(amounts: I) -> Result<u128, MathError> {
    amounts.into_iter().try_fold(0u128, checked_add)
}
