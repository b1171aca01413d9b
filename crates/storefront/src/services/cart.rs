//! Cart service.
//!
//! The cart lives in the browsing session. [`CartService`] looks up current
//! stock for each mutation and delegates the clamp rules to
//! [`kec_core::Cart`].

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tower_sessions::Session;
use tracing::instrument;

use kec_core::{Adjustment, Cart, CartError, CheckoutSnapshot, ProductId, money};

use crate::db::RepositoryError;
use crate::models::{Product, session_keys};
use crate::services::catalog::Catalog;

/// Session storage failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartServiceError {
    /// Unknown or unavailable product, or a cart line whose product is gone.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("product {0} is out of stock")]
    OutOfStock(ProductId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<CartError> for CartServiceError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::OutOfStock(id) => Self::OutOfStock(id),
        }
    }
}

/// Where the cart and the pending checkout snapshot are kept.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn load_cart(&self) -> Result<Cart, StoreError>;
    async fn save_cart(&self, cart: &Cart) -> Result<(), StoreError>;
    async fn load_snapshot(&self) -> Result<Option<CheckoutSnapshot>, StoreError>;
    async fn save_snapshot(&self, snapshot: &CheckoutSnapshot) -> Result<(), StoreError>;
    async fn clear_snapshot(&self) -> Result<(), StoreError>;
}

/// [`CartStore`] backed by the tower-sessions session of the current request.
#[derive(Clone)]
pub struct SessionCartStore {
    session: Session,
}

impl SessionCartStore {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl CartStore for SessionCartStore {
    async fn load_cart(&self) -> Result<Cart, StoreError> {
        Ok(self
            .session
            .get::<Cart>(session_keys::CART)
            .await?
            .unwrap_or_default())
    }

    async fn save_cart(&self, cart: &Cart) -> Result<(), StoreError> {
        if cart.is_empty() {
            self.session.remove::<Cart>(session_keys::CART).await?;
        } else {
            self.session.insert(session_keys::CART, cart).await?;
        }
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<Option<CheckoutSnapshot>, StoreError> {
        Ok(self
            .session
            .get::<CheckoutSnapshot>(session_keys::CHECKOUT_SNAPSHOT)
            .await?)
    }

    async fn save_snapshot(&self, snapshot: &CheckoutSnapshot) -> Result<(), StoreError> {
        self.session
            .insert(session_keys::CHECKOUT_SNAPSHOT, snapshot)
            .await?;
        Ok(())
    }

    async fn clear_snapshot(&self) -> Result<(), StoreError> {
        self.session
            .remove::<CheckoutSnapshot>(session_keys::CHECKOUT_SNAPSHOT)
            .await?;
        Ok(())
    }
}

/// One materialized cart line.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
    pub subtotal: Decimal,
}

/// A cart resolved against the catalog at current prices.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub total: Decimal,
    pub item_count: u64,
}

impl CartView {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Resolve every cart line against the catalog at current prices.
///
/// # Errors
///
/// Returns `CartServiceError::ProductNotFound` if a line's product no longer
/// exists; stale lines are never dropped silently.
pub async fn materialize(catalog: &dyn Catalog, cart: &Cart) -> Result<CartView, CartServiceError> {
    if cart.is_empty() {
        return Ok(CartView {
            lines: Vec::new(),
            total: Decimal::ZERO,
            item_count: 0,
        });
    }

    let ids: Vec<ProductId> = cart.product_ids().collect();
    let mut products = catalog.products(&ids).await?;

    let mut lines = Vec::with_capacity(cart.len());
    for (product_id, quantity) in cart.iter() {
        let index = products
            .iter()
            .position(|p| p.id == product_id)
            .ok_or(CartServiceError::ProductNotFound(product_id))?;
        let product = products.swap_remove(index);
        let subtotal = money::line_subtotal(product.price, quantity);
        lines.push(CartLine {
            product,
            quantity,
            subtotal,
        });
    }

    Ok(CartView {
        total: money::sum(lines.iter().map(|l| l.subtotal)),
        item_count: cart.item_count(),
        lines,
    })
}

/// Cart operations for one browsing session.
pub struct CartService<'a> {
    catalog: &'a dyn Catalog,
    store: &'a dyn CartStore,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(catalog: &'a dyn Catalog, store: &'a dyn CartStore) -> Self {
        Self { catalog, store }
    }

    /// Add units of a product, capped at its stock.
    ///
    /// # Errors
    ///
    /// `ProductNotFound` for unknown or unavailable products, `OutOfStock`
    /// when the product has no stock.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Adjustment, CartServiceError> {
        let product = self
            .catalog
            .product(product_id)
            .await?
            .filter(|p| p.is_available)
            .ok_or(CartServiceError::ProductNotFound(product_id))?;

        let mut cart = self.store.load_cart().await?;
        let adjustment = cart.add(product_id, quantity, product.stock)?;
        self.store.save_cart(&cart).await?;

        if let Adjustment::Set { quantity, capped: true } = adjustment {
            tracing::debug!(%product_id, quantity, "Cart quantity capped at stock");
        }
        Ok(adjustment)
    }

    /// Set the quantity of a line already in the cart.
    ///
    /// # Errors
    ///
    /// `ProductNotFound` if the line's product no longer exists.
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Adjustment, CartServiceError> {
        let mut cart = self.store.load_cart().await?;
        if cart.quantity(product_id).is_none() {
            return Ok(Adjustment::Unchanged);
        }

        let product = self
            .catalog
            .product(product_id)
            .await?
            .ok_or(CartServiceError::ProductNotFound(product_id))?;

        let adjustment = cart.update(product_id, quantity, product.stock);
        self.store.save_cart(&cart).await?;
        Ok(adjustment)
    }

    /// Remove a line. Returns whether it was present.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError::Store` if the session cannot be written.
    pub async fn remove(&self, product_id: ProductId) -> Result<bool, CartServiceError> {
        let mut cart = self.store.load_cart().await?;
        let removed = cart.remove(product_id);
        if removed {
            self.store.save_cart(&cart).await?;
        }
        Ok(removed)
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError::Store` if the session cannot be written.
    pub async fn clear(&self) -> Result<(), CartServiceError> {
        self.store.save_cart(&Cart::new()).await?;
        Ok(())
    }

    /// The cart at current prices.
    ///
    /// # Errors
    ///
    /// `ProductNotFound` if a line's product has been deleted.
    pub async fn view(&self) -> Result<CartView, CartServiceError> {
        let cart = self.store.load_cart().await?;
        materialize(self.catalog, &cart).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{MemoryCartStore, MemoryShop};

    #[tokio::test]
    async fn test_add_rejects_out_of_stock() {
        let shop = MemoryShop::new();
        let sold_out = shop.add_product("Borewell Pump", "12500.00", 0);
        let store = MemoryCartStore::new();
        let carts = CartService::new(&shop, &store);

        let err = carts.add(sold_out, 1).await.unwrap_err();
        assert!(matches!(err, CartServiceError::OutOfStock(id) if id == sold_out));
        assert!(store.cart().is_empty());
    }

    #[tokio::test]
    async fn test_add_unknown_or_unavailable_product() {
        let shop = MemoryShop::new();
        let hidden = shop.add_product("Discontinued", "100.00", 3);
        shop.set_available(hidden, false);
        let store = MemoryCartStore::new();
        let carts = CartService::new(&shop, &store);

        assert!(matches!(
            carts.add(hidden, 1).await,
            Err(CartServiceError::ProductNotFound(_))
        ));
        assert!(matches!(
            carts.add(ProductId::new(999), 1).await,
            Err(CartServiceError::ProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_add_caps_at_stock() {
        let shop = MemoryShop::new();
        let pump = shop.add_product("Openwell Pump", "500.00", 5);
        let store = MemoryCartStore::new();
        let carts = CartService::new(&shop, &store);

        carts.add(pump, 4).await.unwrap();
        let adj = carts.add(pump, 4).await.unwrap();
        assert_eq!(adj, Adjustment::Set { quantity: 5, capped: true });
        assert_eq!(store.cart().quantity(pump), Some(5));
    }

    #[tokio::test]
    async fn test_update_follows_current_stock() {
        let shop = MemoryShop::new();
        let pump = shop.add_product("Openwell Pump", "500.00", 5);
        let store = MemoryCartStore::new();
        let carts = CartService::new(&shop, &store);

        carts.add(pump, 2).await.unwrap();
        shop.set_stock(pump, 1);
        assert_eq!(
            carts.update(pump, 3).await.unwrap(),
            Adjustment::Set { quantity: 1, capped: true }
        );
        assert_eq!(carts.update(pump, 0).await.unwrap(), Adjustment::Removed);
        assert_eq!(carts.update(pump, 2).await.unwrap(), Adjustment::Unchanged);
    }

    #[tokio::test]
    async fn test_view_uses_live_prices() {
        let shop = MemoryShop::new();
        let pump = shop.add_product("Openwell Pump", "500.00", 5);
        let store = MemoryCartStore::new();
        let carts = CartService::new(&shop, &store);

        carts.add(pump, 2).await.unwrap();
        assert_eq!(carts.view().await.unwrap().total, Decimal::new(100_000, 2));

        shop.set_price(pump, Decimal::new(45_000, 2));
        let view = carts.view().await.unwrap();
        assert_eq!(view.total, Decimal::new(90_000, 2));
        assert_eq!(view.item_count, 2);
    }

    #[tokio::test]
    async fn test_view_reports_deleted_products() {
        let shop = MemoryShop::new();
        let pump = shop.add_product("Openwell Pump", "500.00", 5);
        let store = MemoryCartStore::new();
        let carts = CartService::new(&shop, &store);

        carts.add(pump, 1).await.unwrap();
        shop.remove_product(pump);
        assert!(matches!(
            carts.view().await,
            Err(CartServiceError::ProductNotFound(id)) if id == pump
        ));

        assert!(carts.remove(pump).await.unwrap());
        assert!(carts.view().await.unwrap().is_empty());
    }
}
