//! Session cart with stock clamping.
//!
//! A [`Cart`] maps product IDs to positive quantities. It knows nothing about
//! the catalog; callers pass the product's current stock into each mutation
//! and the cart applies the clamp rules:
//!
//! - every stored quantity lies in `[1, stock]`
//! - `add` forces the requested quantity to at least one, sums with what is
//!   already there and caps at stock; a product with no stock is rejected
//! - `update` with a non-positive quantity removes the line; a quantity above
//!   stock is capped and reported so the caller can tell the customer

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ProductId;

/// Errors from cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// The product has no stock left, so it cannot be added.
    #[error("product {0} is out of stock")]
    OutOfStock(ProductId),
}

/// Result of a cart mutation, used to build the customer-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Adjustment {
    /// Line now holds `quantity`; `capped` is set when stock limited it.
    Set { quantity: u32, capped: bool },
    /// Line was removed.
    Removed,
    /// Nothing changed (product was not in the cart).
    Unchanged,
}

/// One stored cart line, as persisted in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Product ID to quantity mapping held in the browsing session.
///
/// Serialized as a list of [`CartEntry`] so that session backends never
/// have to deal with non-string map keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CartEntry>", into = "Vec<CartEntry>")]
pub struct Cart {
    lines: BTreeMap<ProductId, u32>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.values().map(|&q| u64::from(q)).sum()
    }

    /// Quantity held for a product, if any.
    #[must_use]
    pub fn quantity(&self, product_id: ProductId) -> Option<u32> {
        self.lines.get(&product_id).copied()
    }

    /// Iterate lines in ascending product-ID order.
    pub fn iter(&self) -> impl Iterator<Item = (ProductId, u32)> + '_ {
        self.lines.iter().map(|(&id, &q)| (id, q))
    }

    /// Product IDs in ascending order.
    pub fn product_ids(&self) -> impl Iterator<Item = ProductId> + '_ {
        self.lines.keys().copied()
    }

    /// Add `requested` units of a product that currently has `stock` units.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::OutOfStock`] when `stock` is zero; the cart is
    /// left untouched.
    pub fn add(
        &mut self,
        product_id: ProductId,
        requested: i64,
        stock: u32,
    ) -> Result<Adjustment, CartError> {
        if stock == 0 {
            return Err(CartError::OutOfStock(product_id));
        }

        let requested = clamp_requested(requested.max(1));
        let wanted = self
            .quantity(product_id)
            .unwrap_or(0)
            .saturating_add(requested);
        let quantity = wanted.min(stock);

        self.lines.insert(product_id, quantity);
        Ok(Adjustment::Set {
            quantity,
            capped: quantity < wanted,
        })
    }

    /// Set the quantity of a product already in the cart.
    ///
    /// Products not in the cart are ignored. A product whose stock has
    /// dropped to zero is removed.
    pub fn update(&mut self, product_id: ProductId, requested: i64, stock: u32) -> Adjustment {
        if !self.lines.contains_key(&product_id) {
            return Adjustment::Unchanged;
        }

        if requested <= 0 || stock == 0 {
            self.lines.remove(&product_id);
            return Adjustment::Removed;
        }

        let wanted = clamp_requested(requested);
        let quantity = wanted.min(stock);
        self.lines.insert(product_id, quantity);
        Adjustment::Set {
            quantity,
            capped: quantity < wanted,
        }
    }

    /// Remove a product. Returns whether it was present.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        self.lines.remove(&product_id).is_some()
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

fn clamp_requested(requested: i64) -> u32 {
    u32::try_from(requested).unwrap_or(u32::MAX)
}

impl From<Vec<CartEntry>> for Cart {
    fn from(entries: Vec<CartEntry>) -> Self {
        let lines = entries
            .into_iter()
            .filter(|e| e.quantity > 0)
            .map(|e| (e.product_id, e.quantity))
            .collect();
        Self { lines }
    }
}

impl From<Cart> for Vec<CartEntry> {
    fn from(cart: Cart) -> Self {
        cart.lines
            .into_iter()
            .map(|(product_id, quantity)| CartEntry {
                product_id,
                quantity,
            })
            .collect()
    }
}

impl FromIterator<(ProductId, u32)> for Cart {
    fn from_iter<T: IntoIterator<Item = (ProductId, u32)>>(iter: T) -> Self {
        Self {
            lines: iter.into_iter().filter(|&(_, q)| q > 0).collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PUMP: ProductId = ProductId::new(1);
    const MOTOR: ProductId = ProductId::new(2);

    #[test]
    fn test_add_new_line() {
        let mut cart = Cart::new();
        let adj = cart.add(PUMP, 2, 5).unwrap();
        assert_eq!(adj, Adjustment::Set { quantity: 2, capped: false });
        assert_eq!(cart.quantity(PUMP), Some(2));
    }

    #[test]
    fn test_add_forces_at_least_one() {
        let mut cart = Cart::new();
        cart.add(PUMP, 0, 5).unwrap();
        cart.add(PUMP, -4, 5).unwrap();
        assert_eq!(cart.quantity(PUMP), Some(2));
    }

    #[test]
    fn test_add_accumulates_and_caps_at_stock() {
        let mut cart = Cart::new();
        cart.add(PUMP, 3, 5).unwrap();
        let adj = cart.add(PUMP, 4, 5).unwrap();
        assert_eq!(adj, Adjustment::Set { quantity: 5, capped: true });
        assert_eq!(cart.quantity(PUMP), Some(5));
    }

    #[test]
    fn test_add_out_of_stock_is_rejected() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(PUMP, 1, 0), Err(CartError::OutOfStock(PUMP)));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_non_positive_removes() {
        let mut cart = Cart::new();
        cart.add(PUMP, 2, 5).unwrap();
        assert_eq!(cart.update(PUMP, 0, 5), Adjustment::Removed);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_caps_with_notice() {
        let mut cart = Cart::new();
        cart.add(PUMP, 1, 5).unwrap();
        assert_eq!(
            cart.update(PUMP, 9, 5),
            Adjustment::Set { quantity: 5, capped: true }
        );
        assert_eq!(
            cart.update(PUMP, 3, 5),
            Adjustment::Set { quantity: 3, capped: false }
        );
    }

    #[test]
    fn test_update_missing_line_is_ignored() {
        let mut cart = Cart::new();
        assert_eq!(cart.update(MOTOR, 3, 5), Adjustment::Unchanged);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_with_stock_gone_removes() {
        let mut cart = Cart::new();
        cart.add(PUMP, 1, 5).unwrap();
        assert_eq!(cart.update(PUMP, 1, 0), Adjustment::Removed);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = Cart::new();
        cart.add(PUMP, 1, 5).unwrap();
        cart.add(MOTOR, 1, 5).unwrap();
        assert!(cart.remove(PUMP));
        assert!(!cart.remove(PUMP));
        cart.clear();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_session_serialization_uses_entries() {
        let mut cart = Cart::new();
        cart.add(MOTOR, 1, 5).unwrap();
        cart.add(PUMP, 2, 5).unwrap();

        let value = serde_json::to_value(&cart).unwrap();
        assert_eq!(
            value,
            serde_json::json!([
                {"product_id": 1, "quantity": 2},
                {"product_id": 2, "quantity": 1}
            ])
        );

        let back: Cart = serde_json::from_value(value).unwrap();
        assert_eq!(back, cart);
        assert_eq!(back.item_count(), 3);
    }
}
