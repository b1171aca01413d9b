//! Catalog products as seen by the cart and checkout.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kec_core::ProductId;

/// A catalog product.
///
/// The pump attributes are optional because accessories carry none of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub slug: String,
    pub name: String,
    pub price: Decimal,
    pub stock: u32,
    pub is_available: bool,
    pub motor_power_hp: Option<Decimal>,
    pub max_head_m: Option<Decimal>,
    pub max_flow_lpm: Option<Decimal>,
    pub max_depth_ft: Option<Decimal>,
    pub phase: Option<String>,
    pub usage_type: Option<String>,
}

impl Product {
    /// Whether this product satisfies a recommendation request.
    #[must_use]
    pub fn suits(&self, query: &RecommendationQuery) -> bool {
        self.is_available
            && self.usage_type.as_deref() == Some(query.usage_type.as_str())
            && self.phase.as_deref() == Some(query.phase.as_str())
            && self.max_depth_ft.is_some_and(|d| d >= query.depth_ft)
            && query.max_budget.is_none_or(|budget| self.price <= budget)
    }

    /// Recommendation ranking: cheapest first, then more motor power, then
    /// more flow.
    #[must_use]
    pub fn recommendation_order(&self, other: &Self) -> Ordering {
        self.price
            .cmp(&other.price)
            .then_with(|| other.motor_power_hp.cmp(&self.motor_power_hp))
            .then_with(|| other.max_flow_lpm.cmp(&self.max_flow_lpm))
    }
}

/// Customer requirements for a pump recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecommendationQuery {
    /// Required pumping depth in feet.
    pub depth_ft: Decimal,
    /// e.g. `domestic`, `agriculture`, `industrial`.
    pub usage_type: String,
    /// `single` or `three`.
    pub phase: String,
    pub max_budget: Option<Decimal>,
}
