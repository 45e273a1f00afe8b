//! Cart state management.
//!
//! [`CartStore`] holds the authoritative in-memory cart for the current
//! visitor, persists a snapshot on every mutation, and broadcasts the new
//! cart to subscribers over a watch channel. All operations are synchronous
//! in-memory edits and are infallible from the caller's perspective;
//! persistence failures are logged and swallowed so a full disk never blocks
//! shopping.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use bookstall_core::{ItemId, line_total};

use crate::api::CatalogItem;
use crate::storage::{self, StateStorage, keys};

/// One catalog item plus the quantity the visitor intends to purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Stable identifier of the catalog item. Unique within a cart.
    pub item_id: ItemId,
    /// Display name snapshotted at add time.
    pub name: String,
    /// Unit price snapshotted at add time. Non-negative.
    pub price: Decimal,
    /// Optional display hint.
    pub image_url: Option<String>,
    /// Always at least 1; at most `max_quantity` when known.
    pub quantity: u32,
    /// Stock upper bound mirrored from the catalog at add time. A UX hint
    /// only: the backend re-validates stock at checkout.
    pub max_quantity: Option<u32>,
}

impl CartLine {
    /// Build a line from a catalog read, clamping the requested quantity to
    /// the item's stock snapshot.
    #[must_use]
    pub fn from_catalog(item: &CatalogItem, quantity: u32) -> Self {
        Self {
            item_id: item.id,
            name: item.name.clone(),
            price: item.price,
            image_url: item.image_url.clone(),
            quantity: clamp_quantity(quantity, item.stock),
            max_quantity: item.stock,
        }
    }

    /// Total for this line: `price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        line_total(self.price, self.quantity)
    }
}

/// An ordered collection of cart lines. Insertion order is preserved for
/// display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// The lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Whether the cart holds no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of all quantities. 0 for an empty cart.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Sum of `price * quantity` across all lines. 0 for an empty cart.
    ///
    /// Presentation rounding and the tax surcharge are applied by the
    /// checkout view, not stored here.
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    fn find_mut(&mut self, item_id: ItemId) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|l| l.item_id == item_id)
    }
}

/// Persisted cart snapshot.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedCart {
    saved_at: DateTime<Utc>,
    lines: Vec<CartLine>,
}

/// The authoritative cart store.
///
/// Constructed once per application instance and injected into consumers.
/// Views read state through [`CartStore::snapshot`] or a
/// [`CartStore::subscribe`] receiver and mutate it only through the
/// operations here.
pub struct CartStore {
    storage: Arc<dyn StateStorage>,
    state: Mutex<Cart>,
    tx: watch::Sender<Cart>,
}

impl CartStore {
    /// Create a cart store, restoring any persisted snapshot.
    pub fn new(storage: Arc<dyn StateStorage>) -> Self {
        let cart = match storage::load_typed::<PersistedCart, _>(storage.as_ref(), keys::CART) {
            Ok(Some(persisted)) => Cart {
                lines: persisted.lines,
            },
            Ok(None) => Cart::default(),
            Err(e) => {
                tracing::warn!("failed to restore persisted cart: {e}");
                Cart::default()
            }
        };

        let (tx, _rx) = watch::channel(cart.clone());
        Self {
            storage,
            state: Mutex::new(cart),
            tx,
        }
    }

    /// Add a line to the cart.
    ///
    /// If a line with the same `item_id` already exists, its quantity becomes
    /// the clamped sum of the existing and requested quantities; otherwise
    /// the line is inserted with its quantity clamped to `[1, max_quantity]`.
    /// A line whose stock snapshot is zero is refused outright.
    pub fn add_item(&self, line: CartLine) {
        // A stock snapshot of zero leaves no valid quantity; refuse the add.
        if line.max_quantity == Some(0) {
            return;
        }

        self.mutate(|cart| {
            if let Some(existing) = cart.find_mut(line.item_id) {
                let requested = existing.quantity.saturating_add(line.quantity);
                existing.quantity = clamp_quantity(requested, existing.max_quantity);
            } else {
                let mut line = line;
                line.quantity = clamp_quantity(line.quantity, line.max_quantity);
                cart.lines.push(line);
            }
        });
    }

    /// Add a catalog item, snapshotting its name, price, and stock.
    pub fn add_catalog_item(&self, item: &CatalogItem, quantity: u32) {
        self.add_item(CartLine::from_catalog(item, quantity));
    }

    /// Replace a line's quantity, clamped to its stock snapshot.
    ///
    /// A quantity of 0 behaves as [`CartStore::remove_item`]. An unknown
    /// `item_id` is a silent no-op that still persists the (unchanged)
    /// snapshot.
    pub fn update_quantity(&self, item_id: ItemId, quantity: u32) {
        if quantity == 0 {
            self.remove_item(item_id);
            return;
        }

        self.mutate(|cart| {
            if let Some(line) = cart.find_mut(item_id) {
                line.quantity = clamp_quantity(quantity, line.max_quantity);
            }
        });
    }

    /// Delete a line. Idempotent if the id is absent.
    pub fn remove_item(&self, item_id: ItemId) {
        self.mutate(|cart| {
            cart.lines.retain(|l| l.item_id != item_id);
        });
    }

    /// Empty the cart and persist the empty state. Called after successful
    /// order placement or explicit user action.
    pub fn clear(&self) {
        self.mutate(|cart| {
            cart.lines.clear();
        });
    }

    /// Sum of all quantities.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.with_state(Cart::total_items)
    }

    /// Sum of `price * quantity` across all lines.
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.with_state(Cart::total_price)
    }

    /// A point-in-time copy of the cart.
    #[must_use]
    pub fn snapshot(&self) -> Cart {
        self.with_state(Clone::clone)
    }

    /// Subscribe to cart changes. The receiver yields a full snapshot after
    /// every mutation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Cart> {
        self.tx.subscribe()
    }

    fn with_state<T>(&self, f: impl FnOnce(&Cart) -> T) -> T {
        let guard = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&guard)
    }

    /// Apply an edit, then persist and notify.
    fn mutate(&self, f: impl FnOnce(&mut Cart)) {
        let snapshot = {
            let mut guard = self
                .state
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            f(&mut guard);
            guard.clone()
        };

        self.persist(&snapshot);
        self.tx.send_replace(snapshot);
    }

    fn persist(&self, cart: &Cart) {
        let persisted = PersistedCart {
            saved_at: Utc::now(),
            lines: cart.lines.clone(),
        };
        if let Err(e) = storage::save_typed(self.storage.as_ref(), keys::CART, &persisted) {
            // A lost snapshot only costs the visitor their cart on the next
            // reload; shopping continues.
            tracing::warn!("failed to persist cart: {e}");
        }
    }
}

/// Clamp a quantity to `[1, max]` when the bound is known, else to at
/// least 1.
const fn clamp_quantity(quantity: u32, max: Option<u32>) -> u32 {
    let quantity = if quantity == 0 { 1 } else { quantity };
    match max {
        Some(max) if max >= 1 && quantity > max => max,
        _ => quantity,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn store() -> CartStore {
        CartStore::new(Arc::new(MemoryStorage::new()))
    }

    fn line(id: i64, price: Decimal, quantity: u32, max: Option<u32>) -> CartLine {
        CartLine {
            item_id: ItemId::new(id),
            name: format!("Book {id}"),
            price,
            image_url: None,
            quantity,
            max_quantity: max,
        }
    }

    #[test]
    fn test_add_merges_same_item_and_clamps() {
        // Item A, price 10, max 5: add 3 then 4 -> quantity 5, total 50.
        let cart = store();
        let price = Decimal::new(10, 0);
        cart.add_item(line(1, price, 3, Some(5)));
        cart.add_item(line(1, price, 4, Some(5)));

        let snapshot = cart.snapshot();
        assert_eq!(snapshot.lines().len(), 1);
        assert_eq!(snapshot.lines()[0].quantity, 5);
        assert_eq!(cart.total_price(), Decimal::new(50, 0));
    }

    #[test]
    fn test_add_repeated_accumulates_without_bound() {
        let cart = store();
        let price = Decimal::new(2, 0);
        for _ in 0..4 {
            cart.add_item(line(7, price, 2, None));
        }
        assert_eq!(cart.total_items(), 8);
    }

    #[test]
    fn test_add_out_of_stock_is_refused() {
        let cart = store();
        cart.add_item(line(1, Decimal::new(10, 0), 9, Some(0)));
        assert!(cart.snapshot().is_empty());
        assert_eq!(cart.total_items(), 0);
    }

    #[test]
    fn test_add_zero_quantity_clamps_to_one() {
        let cart = store();
        cart.add_item(line(1, Decimal::ONE, 0, None));
        assert_eq!(cart.total_items(), 1);
    }

    #[test]
    fn test_derived_totals() {
        // A(price 10, q2), B(price 5, q1) -> 3 items, total 25.
        let cart = store();
        cart.add_item(line(1, Decimal::new(10, 0), 2, None));
        cart.add_item(line(2, Decimal::new(5, 0), 1, None));

        assert_eq!(cart.total_items(), 3);
        assert_eq!(cart.total_price(), Decimal::new(25, 0));
    }

    #[test]
    fn test_empty_cart_totals_are_zero() {
        let cart = store();
        assert_eq!(cart.total_items(), 0);
        assert_eq!(cart.total_price(), Decimal::ZERO);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let cart = store();
        cart.add_item(line(3, Decimal::ONE, 1, None));
        cart.add_item(line(1, Decimal::ONE, 1, None));
        cart.add_item(line(2, Decimal::ONE, 1, None));

        let ids: Vec<i64> = cart
            .snapshot()
            .lines()
            .iter()
            .map(|l| l.item_id.as_i64())
            .collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_update_quantity_clamps_to_stock() {
        let cart = store();
        cart.add_item(line(1, Decimal::ONE, 1, Some(3)));
        cart.update_quantity(ItemId::new(1), 10);
        assert_eq!(cart.total_items(), 3);
    }

    #[test]
    fn test_update_quantity_zero_removes() {
        let cart = store();
        cart.add_item(line(1, Decimal::ONE, 2, None));
        cart.update_quantity(ItemId::new(1), 0);
        assert!(cart.snapshot().is_empty());
    }

    #[test]
    fn test_update_quantity_unknown_id_is_silent_noop() {
        // Deliberate contract: an unknown id is ignored rather than reported.
        let cart = store();
        cart.add_item(line(1, Decimal::ONE, 2, None));
        cart.update_quantity(ItemId::new(99), 5);
        assert_eq!(cart.total_items(), 2);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let cart = store();
        cart.add_item(line(1, Decimal::ONE, 2, None));
        cart.remove_item(ItemId::new(1));
        cart.remove_item(ItemId::new(1));
        assert_eq!(cart.total_items(), 0);
    }

    #[test]
    fn test_clear_empties_cart() {
        let cart = store();
        cart.add_item(line(1, Decimal::new(10, 0), 2, None));
        cart.add_item(line(2, Decimal::new(5, 0), 1, None));
        cart.clear();

        assert_eq!(cart.total_items(), 0);
        assert_eq!(cart.total_price(), Decimal::ZERO);
    }

    #[test]
    fn test_persistence_roundtrip() {
        let storage: Arc<dyn StateStorage> = Arc::new(MemoryStorage::new());
        {
            let cart = CartStore::new(Arc::clone(&storage));
            cart.add_item(line(1, Decimal::new(10, 0), 2, Some(5)));
        }

        let restored = CartStore::new(storage);
        assert_eq!(restored.total_items(), 2);
        assert_eq!(restored.snapshot().lines()[0].max_quantity, Some(5));
    }

    #[test]
    fn test_subscribers_see_mutations() {
        let cart = store();
        let rx = cart.subscribe();
        cart.add_item(line(1, Decimal::ONE, 2, None));
        assert_eq!(rx.borrow().total_items(), 2);
    }

    #[test]
    fn test_from_catalog_clamps_to_stock() {
        let item = CatalogItem {
            id: ItemId::new(1),
            name: "Dune".to_string(),
            price: Decimal::new(1050, 2),
            description: None,
            image_url: None,
            stock: Some(2),
            category: None,
        };

        let line = CartLine::from_catalog(&item, 9);
        assert_eq!(line.quantity, 2);
        assert_eq!(line.max_quantity, Some(2));
    }
}
