use bigdecimal::{BigDecimal, Signed, ToPrimitive, Zero};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("negative amount {0} cannot be charged")]
    Negative(String),
    #[error("amount {0} does not fit in minor units")]
    OutOfRange(String),
}

/// Normalize a monetary value to 2 decimal places, rounding half away from zero.
pub fn normalize_scale(value: &BigDecimal) -> BigDecimal {
    value.round(2).with_scale(2)
}

/// Price charged for one unit: the discount price when present, else the list price.
pub fn unit_price<'a>(price: &'a BigDecimal, discount_price: Option<&'a BigDecimal>) -> &'a BigDecimal {
    discount_price.unwrap_or(price)
}

pub fn line_total(unit: &BigDecimal, quantity: i32) -> BigDecimal {
    unit * BigDecimal::from(quantity)
}

/// Exact sum of line totals, normalized once at the end.
pub fn sum_line_totals<'a, I>(lines: I) -> BigDecimal
where
    I: IntoIterator<Item = (&'a BigDecimal, i32)>,
{
    let raw = lines
        .into_iter()
        .fold(BigDecimal::zero(), |acc, (unit, qty)| acc + line_total(unit, qty));
    normalize_scale(&raw)
}

/// Convert a major-unit amount (roubles) into minor units (kopecks).
pub fn to_minor_units(value: &BigDecimal) -> Result<i64, MoneyError> {
    if value.is_negative() {
        return Err(MoneyError::Negative(value.to_string()));
    }
    let minor = (normalize_scale(value) * BigDecimal::from(100)).with_scale(0);
    minor.to_i64().ok_or_else(|| MoneyError::OutOfRange(value.to_string()))
}

pub fn is_positive(value: &BigDecimal) -> bool {
    value.is_positive()
}
