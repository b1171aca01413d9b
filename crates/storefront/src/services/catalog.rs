//! Catalog seam.

use async_trait::async_trait;

use kec_core::ProductId;

use crate::db::RepositoryError;
use crate::models::{Product, RecommendationQuery};

/// Read access to products.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// A single product, available or not.
    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Every product in `ids` that still exists, ordered by id.
    async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError>;

    /// Products suited to `query`, best match first.
    async fn recommend(
        &self,
        query: &RecommendationQuery,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError>;
}
