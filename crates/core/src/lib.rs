//! KEC Core - domain types shared across the store.
//!
//! This crate provides the types used by every KEC component:
//! - `storefront` - Public storefront, cart and checkout service
//! - `cli` - Migrations and staff tooling
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. Everything here can be exercised in a plain unit
//! test.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, money helpers and status enums
//! - [`cart`] - Session cart with stock clamping
//! - [`contact`] - Contact/shipping snapshot and field validation
//! - [`checkout`] - Checkout state machine and the frozen payment snapshot
//! - [`otp`] - Password-reset passcode rules

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod contact;
pub mod otp;
pub mod types;

pub use cart::{Adjustment, Cart, CartEntry, CartError};
pub use checkout::{CheckoutEvent, CheckoutSnapshot, CheckoutStage, InvalidTransition};
pub use contact::{ContactDetails, ContactForm, FieldErrors};
pub use types::*;
