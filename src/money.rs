//! Conversion of decimal currency amounts into the provider's minor-unit
//! integer representation. Fixed-point arithmetic only; an amount with more
//! fractional digits than its currency allows is rejected rather than
//! rounded.

use crate::errors::ServiceError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// ISO 4217 currencies without a minor unit.
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "BIF", "CLP", "DJF", "GNF", "ISK", "JPY", "KMF", "KRW", "PYG", "RWF", "UGX", "VND", "VUV",
    "XAF", "XOF", "XPF",
];

/// ISO 4217 currencies with three fractional digits.
const THREE_DECIMAL_CURRENCIES: &[&str] = &["BHD", "IQD", "JOD", "KWD", "LYD", "OMR", "TND"];

/// Number of fractional digits for a currency code.
pub fn fraction_digits(currency_code: &str) -> u32 {
    if ZERO_DECIMAL_CURRENCIES.contains(&currency_code) {
        0
    } else if THREE_DECIMAL_CURRENCIES.contains(&currency_code) {
        3
    } else {
        2
    }
}

/// Converts an amount to the minor units of its currency, e.g.
/// `19.99 CHF -> 1999`.
pub fn to_minor_units(amount: Decimal, currency_code: &str) -> Result<i64, ServiceError> {
    let digits = fraction_digits(currency_code);
    let factor = Decimal::from(10_i64.pow(digits));

    let scaled = amount.checked_mul(factor).ok_or_else(|| {
        ServiceError::InvalidInput(format!(
            "amount {} {} overflows minor-unit conversion",
            amount, currency_code
        ))
    })?;

    let normalized = scaled.normalize();
    if normalized.scale() > 0 {
        return Err(ServiceError::InvalidInput(format!(
            "amount {} has more precision than {} allows ({} fractional digits)",
            amount, currency_code, digits
        )));
    }

    normalized.to_i64().ok_or_else(|| {
        ServiceError::InvalidInput(format!(
            "amount {} {} does not fit into a 64-bit minor-unit value",
            amount, currency_code
        ))
    })
}
