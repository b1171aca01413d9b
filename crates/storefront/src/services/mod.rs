//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `catalog` - Product lookups the cart and checkout depend on
//! - `cart` - Session cart with stock clamping and materialization
//! - `checkout` - Cash-on-delivery and online-payment checkout
//! - `orders` - The order ledger seam (atomic commit)
//! - `payments` - Payment gateway adapter (intents and signature checks)
//! - `receipt` - PDF receipts delivered after online payment
//! - `email` - SMTP delivery with Askama templates
//! - `password_reset` - One-time passcode password reset
//! - `auth` - Password login
//!
//! Services borrow their collaborators as trait objects so the same logic
//! runs against `PostgreSQL` repositories in production and in-memory
//! doubles in tests.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod email;
pub mod orders;
pub mod password_reset;
pub mod payments;
pub mod receipt;
