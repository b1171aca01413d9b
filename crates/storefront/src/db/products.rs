//! Product repository: the catalog as seen by cart and checkout.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use kec_core::ProductId;

use super::{RepositoryError, non_negative};
use crate::models::{Product, RecommendationQuery};
use crate::services::catalog::Catalog;

const PRODUCT_COLUMNS: &str = "id, slug, name, price, stock, is_available, motor_power_hp, \
     max_head_m, max_flow_lpm, max_depth_ft, phase, usage_type";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    slug: String,
    name: String,
    price: Decimal,
    stock: i32,
    is_available: bool,
    motor_power_hp: Option<Decimal>,
    max_head_m: Option<Decimal>,
    max_flow_lpm: Option<Decimal>,
    max_depth_ft: Option<Decimal>,
    phase: Option<String>,
    usage_type: Option<String>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            slug: row.slug,
            name: row.name,
            price: row.price,
            stock: non_negative(row.stock, "stock")?,
            is_available: row.is_available,
            motor_power_hp: row.motor_power_hp,
            max_head_m: row.max_head_m,
            max_flow_lpm: row.max_flow_lpm,
            max_depth_ft: row.max_depth_ft,
            phase: row.phase,
            usage_type: row.usage_type,
        })
    }
}

/// Repository for product lookups.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Catalog for ProductRepository<'_> {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM store.product WHERE id = $1");
        let row: Option<ProductRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(Product::try_from).transpose()
    }

    async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM store.product WHERE id = ANY($1) ORDER BY id"
        );
        let rows: Vec<ProductRow> = sqlx::query_as(&sql)
            .bind(raw)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    async fn recommend(
        &self,
        query: &RecommendationQuery,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM store.product
            WHERE is_available
              AND usage_type = $1
              AND phase = $2
              AND max_depth_ft >= $3
              AND ($4::NUMERIC IS NULL OR price <= $4)
            ORDER BY price ASC, motor_power_hp DESC NULLS LAST, max_flow_lpm DESC NULLS LAST
            LIMIT $5
            "
        );
        let rows: Vec<ProductRow> = sqlx::query_as(&sql)
            .bind(&query.usage_type)
            .bind(&query.phase)
            .bind(query.depth_ft)
            .bind(query.max_budget)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(Product::try_from).collect()
    }
}
