//! Cart route handlers.
//!
//! The cart lives in the session. Every mutation answers with the
//! re-materialized cart so the page can redraw without a second request.

use axum::{
    Form, Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use kec_core::{Adjustment, ProductId};

use crate::db::ProductRepository;
use crate::error::{Result, add_breadcrumb};
use crate::services::cart::{CartService, CartView, SessionCartStore};
use crate::state::AppState;

/// Quantity form data for add and update.
///
/// Kept as text so a missing or garbled quantity means one unit instead of
/// a form rejection.
#[derive(Debug, Default, Deserialize)]
pub struct QuantityForm {
    pub quantity: Option<String>,
}

impl QuantityForm {
    fn quantity(&self) -> i64 {
        self.quantity
            .as_deref()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(1)
    }
}

/// Cart JSON response.
#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    pub cart: CartView,
}

impl CartResponse {
    fn new(cart: CartView, notice: Option<String>) -> Self {
        Self {
            success: true,
            notice,
            cart,
        }
    }
}

/// Customer-facing message for a clamped or dropped line.
fn notice(adjustment: Adjustment) -> Option<String> {
    match adjustment {
        Adjustment::Set {
            quantity,
            capped: true,
        } => Some(format!("Only {quantity} in stock; quantity adjusted")),
        Adjustment::Removed => Some("Item removed from cart".to_string()),
        Adjustment::Set { capped: false, .. } | Adjustment::Unchanged => None,
    }
}

/// Display the cart.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CartResponse>> {
    let products = ProductRepository::new(state.pool());
    let store = SessionCartStore::new(session);
    let cart = CartService::new(&products, &store).view().await?;
    Ok(Json(CartResponse::new(cart, None)))
}

/// Add units of a product. A missing quantity means one.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<ProductId>,
    Form(form): Form<QuantityForm>,
) -> Result<Json<CartResponse>> {
    let products = ProductRepository::new(state.pool());
    let store = SessionCartStore::new(session);
    let service = CartService::new(&products, &store);

    let quantity = form.quantity();
    let adjustment = service.add(product_id, quantity).await?;
    let (id, units) = (product_id.to_string(), quantity.to_string());
    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product_id", id.as_str()), ("quantity", units.as_str())]),
    );

    let cart = service.view().await?;
    Ok(Json(CartResponse::new(cart, notice(adjustment))))
}

/// Set the quantity of a cart line. Zero or less removes it; a missing
/// quantity means one.
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<ProductId>,
    Form(form): Form<QuantityForm>,
) -> Result<Json<CartResponse>> {
    let products = ProductRepository::new(state.pool());
    let store = SessionCartStore::new(session);
    let service = CartService::new(&products, &store);

    let adjustment = service.update(product_id, form.quantity()).await?;
    let cart = service.view().await?;
    Ok(Json(CartResponse::new(cart, notice(adjustment))))
}

/// Remove a cart line.
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartResponse>> {
    let products = ProductRepository::new(state.pool());
    let store = SessionCartStore::new(session);
    let service = CartService::new(&products, &store);

    service.remove(product_id).await?;
    let cart = service.view().await?;
    Ok(Json(CartResponse::new(cart, None)))
}

/// Empty the cart.
#[instrument(skip(state, session))]
pub async fn clear(State(state): State<AppState>, session: Session) -> Result<Json<CartResponse>> {
    let products = ProductRepository::new(state.pool());
    let store = SessionCartStore::new(session);
    let service = CartService::new(&products, &store);

    service.clear().await?;
    let cart = service.view().await?;
    Ok(Json(CartResponse::new(cart, None)))
}
