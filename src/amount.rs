use num_bigint::BigInt;
use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

/// Only 3 decimal digits of a human amount are carried into raw units;
/// anything finer is dropped before conversion. Fixed policy, not
/// configurable.
pub const FRACTIONS: i64 = 1000;

#[derive(Debug, Error)]
pub enum AmountError {
    #[error("amount {0} is out of range")]
    OutOfRange(Decimal),
    #[error("raw amount too large to display")]
    DisplayOverflow,
}

/// Converts a human coin amount into raw base units.
///
/// The amount is truncated toward zero at the third decimal digit, then
/// scaled by the multiplier in exact integer arithmetic; raw values
/// are far beyond machine word size once multiplied, so no intermediate
/// floating point is allowed anywhere.
///
/// Negative amounts are not rejected here; sign policy belongs to the
/// caller.
pub fn to_raw(amount: Decimal, multiplier: &BigInt) -> Result<BigInt, AmountError> {
    let milli = amount
        .checked_mul(Decimal::from(FRACTIONS))
        .ok_or(AmountError::OutOfRange(amount))?
        .trunc()
        .to_i128()
        .ok_or(AmountError::OutOfRange(amount))?;
    Ok(multiplier * BigInt::from(milli) / FRACTIONS)
}

/// Inverse of [`to_raw`]: renders a raw balance as a decimal with at
/// most 3 fractional digits, truncating toward zero.
pub fn to_human(raw: &BigInt, multiplier: &BigInt) -> Result<Decimal, AmountError> {
    let milli = (raw * FRACTIONS / multiplier)
        .to_i128()
        .ok_or(AmountError::DisplayOverflow)?;
    // an i128 can still exceed Decimal's 96-bit mantissa
    Decimal::try_from_i128_with_scale(milli, 3)
        .map(|d| d.normalize())
        .map_err(|_| AmountError::DisplayOverflow)
}
