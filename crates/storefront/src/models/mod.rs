//! Domain models for the storefront.
//!
//! These are validated domain types, separate from the database row types
//! in [`crate::db`].

pub mod address;
pub mod order;
pub mod password_reset;
pub mod product;
pub mod session;
pub mod user;

pub use address::Address;
pub use order::{GatewayReference, Order, OrderDraft, OrderItem, StatusSummary};
pub use password_reset::PasswordResetOtp;
pub use product::{Product, RecommendationQuery};
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
