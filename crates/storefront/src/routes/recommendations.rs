//! Pump recommendation handler.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Serialize;
use tracing::instrument;

use crate::db::ProductRepository;
use crate::error::{AppError, Result};
use crate::models::{Product, RecommendationQuery};
use crate::services::catalog::Catalog;
use crate::state::AppState;

/// How many pumps a recommendation lists.
const RECOMMENDATION_LIMIT: i64 = 5;

/// Recommendation JSON response.
#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub success: bool,
    pub products: Vec<Product>,
}

/// Suggest pumps for a depth, usage and phase.
#[instrument(skip(state))]
pub async fn recommend(
    State(state): State<AppState>,
    Query(query): Query<RecommendationQuery>,
) -> Result<Json<RecommendationResponse>> {
    if query.depth_ft.is_sign_negative() {
        return Err(AppError::BadRequest("Depth cannot be negative".to_string()));
    }

    let products = ProductRepository::new(state.pool())
        .recommend(&query, RECOMMENDATION_LIMIT)
        .await?;

    tracing::debug!(matches = products.len(), "Recommendation served");
    Ok(Json(RecommendationResponse {
        success: true,
        products,
    }))
}
