//! Order ledger repository.
//!
//! Orders are only ever created through [`OrderLedger::commit`], which
//! prices, inserts and decrements stock in a single transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;

use kec_core::{
    Cart, ContactDetails, Email, OrderId, OrderItemId, OrderStatus, PaymentMethod, PaymentStatus,
    ProductId, UserId,
};

use super::{RepositoryError, is_unique_violation, non_negative};
use crate::models::{GatewayReference, Order, OrderDraft, OrderItem, StatusSummary};
use crate::services::orders::{CommitError, OrderLedger};

const ORDER_COLUMNS: &str = "id, user_id, full_name, email, phone, address, city, postal_code, \
     notes, status, payment_method, payment_status, gateway_order_id, gateway_payment_id, \
     gateway_signature, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, price, quantity";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: Option<UserId>,
    full_name: String,
    email: String,
    phone: String,
    address: String,
    city: String,
    postal_code: String,
    notes: Option<String>,
    status: OrderStatus,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    gateway_order_id: Option<String>,
    gateway_payment_id: Option<String>,
    gateway_signature: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: Option<ProductId>,
    product_name: String,
    price: Decimal,
    quantity: i32,
}

#[derive(sqlx::FromRow)]
struct LockedProduct {
    id: ProductId,
    name: String,
    price: Decimal,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        let email = Email::parse(&self.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email on order {}: {e}", self.id))
        })?;

        let gateway = match (
            self.gateway_order_id,
            self.gateway_payment_id,
            self.gateway_signature,
        ) {
            (Some(order_id), Some(payment_id), Some(signature)) => Some(GatewayReference {
                order_id,
                payment_id,
                signature,
            }),
            (None, None, None) => None,
            _ => {
                return Err(RepositoryError::DataCorruption(format!(
                    "order {} has partial gateway identifiers",
                    self.id
                )));
            }
        };

        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            contact: ContactDetails {
                full_name: self.full_name,
                email,
                phone: self.phone,
                address: self.address,
                city: self.city,
                postal_code: self.postal_code,
                notes: self.notes,
            },
            status: self.status,
            payment_method: self.payment_method,
            payment_status: self.payment_status,
            gateway,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl TryFrom<ItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            product_name: row.product_name,
            price: row.price,
            quantity: non_negative(row.quantity, "order item quantity")?,
        })
    }
}

/// Errors from staff status changes.
#[derive(Debug, Error)]
pub enum StatusChangeError {
    #[error("order {0} not found")]
    NotFound(OrderId),

    #[error("cannot move order from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for the order ledger.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an order by ID regardless of owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM store.order WHERE id = $1");
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        self.with_items(row).await
    }

    /// Move an order to a new status, enforcing the fulfilment state machine.
    ///
    /// Returns the previous status.
    ///
    /// # Errors
    ///
    /// Returns `StatusChangeError::NotFound` for unknown orders and
    /// `StatusChangeError::IllegalTransition` if the move is not allowed.
    pub async fn set_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<OrderStatus, StatusChangeError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<OrderStatus> =
            sqlx::query_scalar("SELECT status FROM store.order WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let current = current.ok_or(StatusChangeError::NotFound(id))?;

        if !current.can_transition_to(next) {
            return Err(StatusChangeError::IllegalTransition {
                from: current,
                to: next,
            });
        }

        sqlx::query("UPDATE store.order SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(next)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(current)
    }

    /// Order counts and paid revenue per status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn status_report(&self) -> Result<Vec<StatusSummary>, RepositoryError> {
        let rows: Vec<(OrderStatus, i64, Decimal)> = sqlx::query_as(
            r"
            SELECT o.status,
                   COUNT(DISTINCT o.id) AS orders,
                   COALESCE(SUM(i.price * i.quantity) FILTER (WHERE o.payment_status = 'paid'), 0)
                       AS paid_revenue
            FROM store.order o
            LEFT JOIN store.order_item i ON i.order_id = o.id
            GROUP BY o.status
            ORDER BY o.status
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(status, orders, paid_revenue)| StatusSummary {
                status,
                orders,
                paid_revenue,
            })
            .collect())
    }

    async fn with_items(&self, row: Option<OrderRow>) -> Result<Option<Order>, RepositoryError> {
        let Some(row) = row else {
            return Ok(None);
        };

        let sql = format!("SELECT {ITEM_COLUMNS} FROM store.order_item WHERE order_id = $1 ORDER BY id");
        let items: Vec<ItemRow> = sqlx::query_as(&sql)
            .bind(row.id)
            .fetch_all(self.pool)
            .await?;
        let items = items
            .into_iter()
            .map(OrderItem::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        row.into_order(items).map(Some)
    }
}

#[async_trait]
impl OrderLedger for OrderRepository<'_> {
    #[tracing::instrument(skip_all, fields(lines = cart.len(), method = ?draft.payment_method))]
    async fn commit(&self, draft: &OrderDraft, cart: &Cart) -> Result<Order, CommitError> {
        if cart.is_empty() {
            return Err(CommitError::EmptyCart);
        }

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let products = lock_products(&mut tx, cart).await?;
        let header = insert_header(&mut tx, draft).await?;

        let mut items = Vec::with_capacity(cart.len());
        for (product_id, quantity) in cart.iter() {
            let product = products
                .get(&product_id)
                .ok_or(CommitError::MissingProduct(product_id))?;
            let quantity_db = i32::try_from(quantity).map_err(|_| {
                RepositoryError::DataCorruption(format!("quantity out of range: {quantity}"))
            })?;

            let sql = format!(
                "INSERT INTO store.order_item (order_id, product_id, product_name, price, quantity) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING {ITEM_COLUMNS}"
            );
            let item: ItemRow = sqlx::query_as(&sql)
                .bind(header.id)
                .bind(product.id)
                .bind(&product.name)
                .bind(product.price)
                .bind(quantity_db)
                .fetch_one(&mut *tx)
                .await
                .map_err(RepositoryError::from)?;
            items.push(OrderItem::try_from(item)?);

            // Oversell is tolerated: stock floors at zero instead of failing the order.
            sqlx::query("UPDATE store.product SET stock = GREATEST(stock - $2, 0) WHERE id = $1")
                .bind(product.id)
                .bind(quantity_db)
                .execute(&mut *tx)
                .await
                .map_err(RepositoryError::from)?;
        }

        tx.commit().await.map_err(RepositoryError::from)?;

        let order = header.into_order(items)?;
        tracing::info!(order_id = %order.id, total = %order.total(), "Order committed");
        Ok(order)
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM store.order WHERE gateway_payment_id = $1");
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(payment_id)
            .fetch_optional(self.pool)
            .await?;
        self.with_items(row).await
    }

    async fn find_for_user(
        &self,
        id: OrderId,
        user_id: UserId,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM store.order WHERE id = $1 AND user_id = $2");
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?;
        self.with_items(row).await
    }
}

/// Lock every product in the cart, in ascending id order so concurrent
/// checkouts cannot deadlock.
async fn lock_products(
    tx: &mut Transaction<'_, Postgres>,
    cart: &Cart,
) -> Result<HashMap<ProductId, LockedProduct>, CommitError> {
    let ids: Vec<i32> = cart.product_ids().map(|id| id.as_i32()).collect();
    let rows: Vec<LockedProduct> = sqlx::query_as(
        "SELECT id, name, price FROM store.product WHERE id = ANY($1) ORDER BY id FOR UPDATE",
    )
    .bind(ids)
    .fetch_all(&mut **tx)
    .await
    .map_err(RepositoryError::from)?;

    Ok(rows.into_iter().map(|p| (p.id, p)).collect())
}

async fn insert_header(
    tx: &mut Transaction<'_, Postgres>,
    draft: &OrderDraft,
) -> Result<OrderRow, CommitError> {
    let contact = &draft.contact;
    let gateway = draft.gateway.as_ref();

    let sql = format!(
        "INSERT INTO store.order (user_id, full_name, email, phone, address, city, postal_code, \
         notes, payment_method, payment_status, gateway_order_id, gateway_payment_id, \
         gateway_signature) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
         RETURNING {ORDER_COLUMNS}"
    );

    sqlx::query_as(&sql)
        .bind(draft.user_id)
        .bind(&contact.full_name)
        .bind(contact.email.as_str())
        .bind(&contact.phone)
        .bind(&contact.address)
        .bind(&contact.city)
        .bind(&contact.postal_code)
        .bind(contact.notes.as_deref())
        .bind(draft.payment_method)
        .bind(draft.payment_status)
        .bind(gateway.map(|g| g.order_id.as_str()))
        .bind(gateway.map(|g| g.payment_id.as_str()))
        .bind(gateway.map(|g| g.signature.as_str()))
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                let payment_id = gateway.map(|g| g.payment_id.clone()).unwrap_or_default();
                return CommitError::DuplicatePayment(payment_id);
            }
            CommitError::Repository(RepositoryError::Database(e))
        })
}
