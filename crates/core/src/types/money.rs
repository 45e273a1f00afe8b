//! Money arithmetic helpers.
//!
//! Prices use [`Decimal`] throughout so cart totals are exact. Rounding and
//! the tax surcharge are presentation concerns applied at the checkout view;
//! the cart itself stores unrounded line prices.

use rust_decimal::{Decimal, RoundingStrategy};

/// Fixed checkout tax surcharge (8%).
pub const TAX_RATE: Decimal = Decimal::from_parts(8, 0, 0, false, 2);

/// Total for one line: `price * quantity`.
#[must_use]
pub fn line_total(price: Decimal, quantity: u32) -> Decimal {
    price * Decimal::from(quantity)
}

/// Round an amount to cents for display (midpoint away from zero).
#[must_use]
pub fn round_to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Tax due on a subtotal, rounded to cents.
#[must_use]
pub fn tax_on(subtotal: Decimal) -> Decimal {
    round_to_cents(subtotal * TAX_RATE)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_is_eight_percent() {
        assert_eq!(TAX_RATE.to_string(), "0.08");
    }

    #[test]
    fn test_line_total() {
        let price = Decimal::new(1050, 2); // 10.50
        assert_eq!(line_total(price, 3), Decimal::new(3150, 2));
        assert_eq!(line_total(price, 0), Decimal::ZERO);
    }

    #[test]
    fn test_round_to_cents_midpoint() {
        assert_eq!(
            round_to_cents(Decimal::new(10005, 3)), // 10.005
            Decimal::new(1001, 2)                   // 10.01
        );
        assert_eq!(round_to_cents(Decimal::new(25, 0)), Decimal::new(25, 0));
    }

    #[test]
    fn test_tax_on() {
        // 25.00 * 0.08 = 2.00
        assert_eq!(tax_on(Decimal::new(25, 0)), Decimal::new(2, 0));
        // 10.99 * 0.08 = 0.8792 -> 0.88
        assert_eq!(tax_on(Decimal::new(1099, 2)), Decimal::new(88, 2));
    }
}
