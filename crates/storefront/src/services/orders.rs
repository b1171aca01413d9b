//! Order ledger seam.

use async_trait::async_trait;
use thiserror::Error;

use kec_core::{Cart, OrderId, ProductId, UserId};

use crate::db::RepositoryError;
use crate::models::{Order, OrderDraft};

/// Errors from committing an order.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("cannot commit an empty cart")]
    EmptyCart,

    /// A cart line points at a product that has been deleted.
    #[error("product {0} no longer exists")]
    MissingProduct(ProductId),

    /// An order already carries this gateway payment id.
    #[error("payment {0} is already recorded")]
    DuplicatePayment(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Persistent record of orders.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Commit an order as one unit.
    ///
    /// Within a single transaction: lock the cart's products, price every
    /// line at the product's current price, insert the order and its items,
    /// and decrement stock floored at zero. Nothing is written on error.
    async fn commit(&self, draft: &OrderDraft, cart: &Cart) -> Result<Order, CommitError>;

    /// The order recorded for a gateway payment id, if any.
    async fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<Order>, RepositoryError>;

    /// An order, only if it belongs to `user_id`.
    async fn find_for_user(
        &self,
        id: OrderId,
        user_id: UserId,
    ) -> Result<Option<Order>, RepositoryError>;
}
