//! Checkout error types.

use thiserror::Error;

use kec_core::{AddressId, FieldErrors, InvalidTransition, MoneyError, ProductId};

use crate::db::RepositoryError;
use crate::services::cart::{CartServiceError, StoreError};
use crate::services::orders::CommitError;
use crate::services::payments::GatewayError;

/// Errors that can occur while placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing to check out.
    #[error("your cart is empty")]
    EmptyCart,

    /// Contact details are incomplete or malformed.
    #[error("please correct the highlighted fields")]
    Validation(FieldErrors),

    /// A cart line points at a product that no longer exists.
    #[error("product {0} is no longer available")]
    ProductNotFound(ProductId),

    /// The selected saved address is unknown or belongs to someone else.
    #[error("address {0} not found")]
    AddressNotFound(AddressId),

    /// Signature mismatch, gateway failure or timeout.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// No usable snapshot for this payment.
    #[error("your checkout session has expired, please try again")]
    SessionExpired,

    #[error(transparent)]
    Transition(#[from] InvalidTransition),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("amount cannot be charged: {0}")]
    Money(#[from] MoneyError),
}

impl From<CartServiceError> for CheckoutError {
    fn from(err: CartServiceError) -> Self {
        match err {
            CartServiceError::ProductNotFound(id) | CartServiceError::OutOfStock(id) => {
                Self::ProductNotFound(id)
            }
            CartServiceError::Store(e) => Self::Store(e),
            CartServiceError::Repository(e) => Self::Repository(e),
        }
    }
}

impl From<CommitError> for CheckoutError {
    fn from(err: CommitError) -> Self {
        match err {
            CommitError::EmptyCart => Self::EmptyCart,
            CommitError::MissingProduct(id) => Self::ProductNotFound(id),
            CommitError::DuplicatePayment(payment_id) => {
                Self::Repository(RepositoryError::Conflict(format!(
                    "payment {payment_id} already recorded"
                )))
            }
            CommitError::Repository(e) => Self::Repository(e),
        }
    }
}
