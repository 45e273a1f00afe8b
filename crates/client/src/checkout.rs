//! Session-gated checkout flow.
//!
//! Checkout is a thin coordination layer: it gates on an authenticated
//! session, derives the order summary (presentation rounding plus the fixed
//! 8% tax surcharge) from the cart, and clears the cart once the caller has
//! placed the order. Payment processing and fulfillment are out of scope.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bookstall_core::{ItemId, round_to_cents, tax_on};

use crate::cart::{Cart, CartStore};
use crate::session::SessionState;

/// One line of an order draft: the item and the requested quantity.
///
/// Deliberately carries no price or clamped stock value; the backend
/// re-validates both at placement time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: ItemId,
    pub quantity: u32,
}

/// Checkout totals plus the lines to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSummary {
    pub lines: Vec<OrderLine>,
    /// Cart total rounded to cents.
    pub subtotal: Decimal,
    /// Fixed 8% surcharge on the subtotal, rounded to cents.
    pub tax: Decimal,
    /// `subtotal + tax`.
    pub total: Decimal,
}

/// Why checkout cannot proceed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("Please login to proceed with checkout")]
    NotAuthenticated,
    #[error("Your cart is empty")]
    EmptyCart,
}

/// Build an order summary from the current session and cart.
///
/// # Errors
///
/// Returns `CheckoutError::NotAuthenticated` unless the session is
/// `Authenticated` (a still-loading session does not count), and
/// `CheckoutError::EmptyCart` for an empty cart.
pub fn prepare_order(session: &SessionState, cart: &Cart) -> Result<OrderSummary, CheckoutError> {
    if !session.is_authenticated() {
        return Err(CheckoutError::NotAuthenticated);
    }
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let subtotal = round_to_cents(cart.total_price());
    let tax = tax_on(subtotal);

    Ok(OrderSummary {
        lines: cart
            .lines()
            .iter()
            .map(|l| OrderLine {
                item_id: l.item_id,
                quantity: l.quantity,
            })
            .collect(),
        subtotal,
        tax,
        total: subtotal + tax,
    })
}

/// Finish a successfully placed order by clearing the cart.
pub fn complete_order(cart: &CartStore) {
    cart.clear();
}
