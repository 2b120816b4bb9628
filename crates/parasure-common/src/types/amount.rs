//! Currency amounts
//!
//! Every balance is an unsigned integer count of the smallest unit (wei for
//! the native currency, the token's base unit for fee tokens). Conversion to
//! whole units goes through `Decimal` and only for display.

use rust_decimal::Decimal;

/// Amount in the smallest currency unit
pub type Amount = u128;

/// Decimal places between the smallest unit and one whole unit
pub const UNIT_DECIMALS: u32 = 18;

/// Smallest units per whole unit (10^18)
pub const WEI_PER_UNIT: Amount = 1_000_000_000_000_000_000;

/// One whole unit
pub const ONE: Amount = WEI_PER_UNIT;

/// Ten whole units
pub const TEN: Amount = 10 * WEI_PER_UNIT;

/// One hundred whole units
pub const CENT: Amount = 100 * WEI_PER_UNIT;

/// A tenth of a unit
pub const POINT_ONE: Amount = WEI_PER_UNIT / 10;

/// Convert an amount to whole units
///
/// Returns `None` when the amount does not fit a `Decimal` mantissa.
pub fn to_units(amount: Amount) -> Option<Decimal> {
    let raw = i128::try_from(amount).ok()?;
    Decimal::try_from_i128_with_scale(raw, UNIT_DECIMALS)
        .ok()
        .map(|d| d.normalize())
}

/// Human-readable rendering in whole units, falling back to raw wei
pub fn format_units(amount: Amount) -> String {
    match to_units(amount) {
        Some(units) => units.to_string(),
        None => format!("{} wei", amount),
    }
}
