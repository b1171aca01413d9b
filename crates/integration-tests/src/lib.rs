//! Integration tests for the KEC store.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p kec-integration-tests
//! ```
//!
//! The tests drive the storefront services end to end through the
//! in-memory collaborators of `kec_storefront::testing`; no database, SMTP
//! server or payment gateway is needed.
//!
//! # Test Categories
//!
//! - `cart` - Cart clamping and materialization at current prices
//! - `checkout` - Cash and online checkout, payment reconciliation, stock
//! - `password_reset` - Passcode issue, verify and consume
//! - `http` - Router-level checks with an in-memory session store

use chrono::{DateTime, Utc};

use kec_core::{ContactForm, Email};
use kec_storefront::models::CurrentUser;
use kec_storefront::services::checkout::{CheckoutService, CheckoutSettings};
use kec_storefront::services::payments::{PaymentCallback, sign};
use kec_storefront::testing::{
    FakeGateway, MemoryCartStore, MemoryShop, RecordingMailer, RecordingNotifier,
};

/// Customer email used across scenarios.
pub const CUSTOMER: &str = "asha@example.com";

/// One shop with one logged-in customer and fake outbound services.
pub struct Shopfront {
    pub shop: MemoryShop,
    pub carts: MemoryCartStore,
    pub gateway: FakeGateway,
    pub mailer: RecordingMailer,
    pub receipts: RecordingNotifier,
    pub settings: CheckoutSettings,
    pub customer: CurrentUser,
}

impl Default for Shopfront {
    fn default() -> Self {
        Self::new()
    }
}

impl Shopfront {
    /// # Panics
    ///
    /// Never; the customer email is a valid literal.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let shop = MemoryShop::new();
        let id = shop.add_user(CUSTOMER);
        Self {
            shop,
            carts: MemoryCartStore::new(),
            gateway: FakeGateway::new(),
            mailer: RecordingMailer::default(),
            receipts: RecordingNotifier::default(),
            settings: CheckoutSettings::default(),
            customer: CurrentUser {
                id,
                email: Email::parse(CUSTOMER).expect("valid email"),
            },
        }
    }

    #[must_use]
    pub fn checkout(&self) -> CheckoutService<'_> {
        CheckoutService::new(
            &self.shop,
            &self.shop,
            &self.shop,
            &self.carts,
            &self.gateway,
            &self.receipts,
            &self.settings,
        )
    }

    /// A callback signed the way the gateway signs it.
    #[must_use]
    pub fn signed_callback(order_id: &str, payment_id: &str) -> PaymentCallback {
        PaymentCallback {
            payment_id: payment_id.to_string(),
            order_id: order_id.to_string(),
            signature: sign(FakeGateway::SECRET, order_id, payment_id),
        }
    }
}

/// A complete contact form.
#[must_use]
pub fn contact_form() -> ContactForm {
    ContactForm {
        full_name: Some("Asha Nair".into()),
        email: Some(CUSTOMER.into()),
        phone: Some("9845012345".into()),
        address: Some("12 MG Road".into()),
        city: Some("Kochi".into()),
        postal_code: Some("682001".into()),
        notes: Some("Call before delivery".into()),
    }
}

/// Fixed clock for scenarios.
///
/// # Panics
///
/// Never; the timestamp is a valid literal.
#[must_use]
#[allow(clippy::expect_used)]
pub fn noon() -> DateTime<Utc> {
    "2026-03-01T12:00:00Z".parse().expect("valid timestamp")
}
