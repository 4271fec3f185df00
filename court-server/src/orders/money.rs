//! Money arithmetic using rust_decimal for precision
//!
//! All intermediate math runs on `Decimal`; values cross into `f64`
//! only at the storage/serialization boundary, rounded to 2 decimal
//! places half-up.

use rust_decimal::prelude::*;
use shared::error::{ErrorCode, OrderError};

const DECIMAL_PLACES: u32 = 2;

/// Maximum allowed unit price
const MAX_PRICE: f64 = 1_000_000.0;
/// Maximum allowed quantity per line
pub const MAX_QUANTITY: i64 = 99;

fn require_finite(value: f64, field: &str) -> Result<(), OrderError> {
    if !value.is_finite() {
        return Err(OrderError::validation(format!(
            "{field} must be a finite number, got {value}"
        )));
    }
    Ok(())
}

fn to_decimal(value: f64, field: &str) -> Result<Decimal, OrderError> {
    require_finite(value, field)?;
    Decimal::from_f64(value)
        .ok_or_else(|| OrderError::validation(format!("{field} is not representable: {value}")))
}

/// Round to 2 decimals, half-up
pub fn round2(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or(0.0)
}

pub fn validate_unit_price(price: f64) -> Result<(), OrderError> {
    require_finite(price, "price")?;
    if price < 0.0 {
        return Err(OrderError::validation(format!(
            "price must be non-negative, got {price}"
        )));
    }
    if price > MAX_PRICE {
        return Err(OrderError::validation(format!(
            "price exceeds maximum allowed ({MAX_PRICE}), got {price}"
        )));
    }
    Ok(())
}

pub fn validate_quantity(quantity: i64) -> Result<(), OrderError> {
    if quantity <= 0 || quantity > MAX_QUANTITY {
        return Err(OrderError::with_message(
            ErrorCode::InvalidQuantity,
            format!("quantity must be between 1 and {MAX_QUANTITY}, got {quantity}"),
        ));
    }
    Ok(())
}

/// unit_price × quantity, rounded
pub fn line_subtotal(unit_price: f64, quantity: i64) -> Result<f64, OrderError> {
    validate_unit_price(unit_price)?;
    let price = to_decimal(unit_price, "price")?;
    Ok(round2(price * Decimal::from(quantity)))
}

/// Sum of line subtotals, rounded
pub fn order_total(subtotals: impl IntoIterator<Item = f64>) -> Result<f64, OrderError> {
    let mut total = Decimal::ZERO;
    for value in subtotals {
        total += to_decimal(value, "subtotal")?;
    }
    Ok(round2(total))
}

/// Change owed for a tendered amount; negative means insufficient
pub fn change_due(tendered: f64, total: f64) -> Result<f64, OrderError> {
    let tendered = to_decimal(tendered, "amount_tendered")?;
    let total = to_decimal(total, "total")?;
    Ok(round2(tendered - total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtotal_rounds_half_up() {
        // 3 × 1.115 = 3.345 → 3.35
        assert_eq!(line_subtotal(1.115, 3).unwrap(), 3.35);
        assert_eq!(line_subtotal(12.90, 2).unwrap(), 25.80);
    }

    #[test]
    fn total_avoids_float_drift() {
        // 0.1 + 0.2 style accumulation stays exact
        let total = order_total(vec![0.10, 0.20, 0.30]).unwrap();
        assert_eq!(total, 0.60);
    }

    #[test]
    fn rejects_non_finite_and_negative() {
        assert!(line_subtotal(f64::NAN, 1).is_err());
        assert!(line_subtotal(f64::INFINITY, 1).is_err());
        assert!(line_subtotal(-1.0, 1).is_err());
    }

    #[test]
    fn quantity_bounds() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-2).is_err());
        assert!(validate_quantity(MAX_QUANTITY + 1).is_err());
    }

    #[test]
    fn change_computation() {
        assert_eq!(change_due(30.0, 25.80).unwrap(), 4.20);
        assert_eq!(change_due(25.80, 25.80).unwrap(), 0.0);
        assert!(change_due(20.0, 25.80).unwrap() < 0.0);
    }
}
