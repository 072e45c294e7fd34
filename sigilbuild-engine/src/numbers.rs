//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Convert a collection length to `u32`, saturating on overflow.
#[must_use]
pub fn count_to_u32(value: usize) -> u32 {
    cast::<usize, u32>(value).unwrap_or(u32::MAX)
}

/// Multiply a unit price by a count without wrapping.
#[must_use]
pub fn priced(count: u32, unit_price: i64) -> i64 {
    i64::from(count).saturating_mul(unit_price)
}

/// Floor-divide a refund basis, returning 0 for a non-positive basis or divisor.
#[must_use]
pub fn refund_share(basis: i64, divisor: i64) -> i64 {
    if basis <= 0 || divisor <= 0 {
        return 0;
    }
    basis / divisor
}
