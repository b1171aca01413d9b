//! Checkout orchestration.
//!
//! Turns the session cart plus contact details into an order, either
//! immediately (cash on delivery) or after the payment gateway confirms an
//! online payment.
//!
//! The online path never builds the order from the live cart. On submit the
//! cart and contact details are frozen into a [`CheckoutSnapshot`] and the
//! gateway intent is created for the snapshot's server-computed amount. The
//! callback is then reconciled against that snapshot:
//!
//! 1. the signature must verify
//! 2. a payment id already on an order is answered with that order
//! 3. the snapshot must exist, be unexpired and match the gateway order id
//! 4. the order is committed as paid
//! 5. the live cart and the snapshot are cleared
//! 6. a receipt is queued, and its failure never reaches the caller
//!
//! Only step 4 is transactional. Orders, items and stock commit together in
//! the database; the session is cleared afterwards, and a failure there is
//! logged without undoing the order. A leftover snapshot is harmless because
//! a replayed callback is answered by step 2.
//!
//! A rejected callback leaves the cart and snapshot in place so the customer
//! can retry.

mod error;

pub use error::CheckoutError;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::instrument;

use kec_core::{
    AddressId, Cart, CheckoutEvent, CheckoutSnapshot, CheckoutStage, ContactForm, PaymentMethod,
    UserId, money,
};

use crate::config::StorefrontConfig;
use crate::db::RepositoryError;
use crate::models::{Address, CurrentUser, GatewayReference, Order, OrderDraft};
use crate::services::cart::{CartStore, materialize};
use crate::services::catalog::Catalog;
use crate::services::orders::{CommitError, OrderLedger};
use crate::services::payments::{GatewayError, PaymentCallback, PaymentGateway, PaymentIntent};
use crate::services::receipt::ReceiptNotifier;

/// Saved addresses, as far as checkout is concerned.
#[async_trait]
pub trait AddressBook: Send + Sync {
    /// An address, only if it belongs to `user_id`.
    async fn address_for_user(
        &self,
        id: AddressId,
        user_id: UserId,
    ) -> Result<Option<Address>, RepositoryError>;
}

/// Tunables for the online path.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// How long a frozen snapshot stays usable.
    pub snapshot_ttl: chrono::Duration,
    /// ISO currency code sent to the gateway.
    pub currency: String,
    /// Upper bound on the intent call.
    pub gateway_timeout: std::time::Duration,
}

impl CheckoutSettings {
    #[must_use]
    pub fn from_config(config: &StorefrontConfig) -> Self {
        Self {
            snapshot_ttl: config.checkout.snapshot_ttl,
            currency: config.razorpay.currency.clone(),
            gateway_timeout: config.razorpay.timeout,
        }
    }
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            snapshot_ttl: chrono::Duration::minutes(CheckoutSnapshot::DEFAULT_TTL_MINUTES),
            currency: "INR".to_string(),
            gateway_timeout: std::time::Duration::from_secs(15),
        }
    }
}

/// Result of a checkout submission.
#[derive(Debug)]
pub enum CheckoutOutcome {
    /// Cash on delivery: the order exists.
    Placed(Order),
    /// Online: the browser must complete payment with this intent.
    AwaitingPayment(PaymentIntent),
}

/// Collaborators a checkout needs.
pub struct CheckoutService<'a> {
    catalog: &'a dyn Catalog,
    ledger: &'a dyn OrderLedger,
    addresses: &'a dyn AddressBook,
    carts: &'a dyn CartStore,
    gateway: &'a dyn PaymentGateway,
    receipts: &'a dyn ReceiptNotifier,
    settings: &'a CheckoutSettings,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(
        catalog: &'a dyn Catalog,
        ledger: &'a dyn OrderLedger,
        addresses: &'a dyn AddressBook,
        carts: &'a dyn CartStore,
        gateway: &'a dyn PaymentGateway,
        receipts: &'a dyn ReceiptNotifier,
        settings: &'a CheckoutSettings,
    ) -> Self {
        Self {
            catalog,
            ledger,
            addresses,
            carts,
            gateway,
            receipts,
            settings,
        }
    }

    /// Submit the checkout form.
    ///
    /// A selected saved address overrides the name, phone and address fields
    /// of `form`. Notes come from the form, and a blank email falls back to
    /// the account's.
    ///
    /// # Errors
    ///
    /// - `EmptyCart` if there is nothing to buy
    /// - `AddressNotFound` for an unknown or foreign `address_id`
    /// - `Validation` with per-field messages for incomplete contact details
    /// - `ProductNotFound` if the cart references a deleted product
    /// - `Gateway` if the payment intent cannot be created in time
    #[instrument(skip(self, form), fields(user_id = %user.id))]
    pub async fn submit(
        &self,
        user: &CurrentUser,
        form: &ContactForm,
        address_id: Option<AddressId>,
        method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let cart = self.carts.load_cart().await?;
        let stage = CheckoutStage::for_cart(&cart);
        if stage == CheckoutStage::EmptyCart {
            return Err(CheckoutError::EmptyCart);
        }

        let form = match address_id {
            Some(id) => self
                .addresses
                .address_for_user(id, user.id)
                .await?
                .ok_or(CheckoutError::AddressNotFound(id))?
                .overlay(form),
            None => form.clone(),
        }
        .with_account_email(&user.email);
        let contact = form.validate().map_err(CheckoutError::Validation)?;

        match method {
            PaymentMethod::CashOnDelivery => {
                stage.advance(CheckoutEvent::SubmitCashOnDelivery)?;

                let draft = OrderDraft::cash_on_delivery(Some(user.id), contact);
                let order = self.ledger.commit(&draft, &cart).await?;
                self.clear_session(&order).await;

                tracing::info!(order_id = %order.id, total = %order.total(), "Cash on delivery order placed");
                Ok(CheckoutOutcome::Placed(order))
            }
            PaymentMethod::Online => {
                stage.advance(CheckoutEvent::SubmitOnline)?;

                let view = materialize(self.catalog, &cart).await?;
                let amount = money::round(view.total);
                let minor = money::to_minor_units(amount)?;
                let mut snapshot =
                    CheckoutSnapshot::new(contact, cart, amount, now, self.settings.snapshot_ttl);

                let receipt = format!("kec_{}_{}", user.id, now.timestamp_millis());
                let intent = tokio::time::timeout(
                    self.settings.gateway_timeout,
                    self.gateway
                        .create_intent(minor, &self.settings.currency, &receipt),
                )
                .await
                .map_err(|_| GatewayError::Timeout)?
                .inspect_err(|e| tracing::warn!(error = %e, "Payment intent failed"))?;

                snapshot.gateway_order_id = Some(intent.gateway_order_id.clone());
                self.carts.save_snapshot(&snapshot).await?;

                tracing::info!(
                    gateway_order_id = %intent.gateway_order_id,
                    amount = %amount,
                    expires_at = %snapshot.expires_at,
                    "Checkout awaiting payment"
                );
                Ok(CheckoutOutcome::AwaitingPayment(intent))
            }
        }
    }

    /// Reconcile a payment callback with the frozen snapshot.
    ///
    /// Replaying a callback for a payment that already has an order returns
    /// that order and writes nothing.
    ///
    /// # Errors
    ///
    /// - `Gateway(InvalidSignature)` if the signature does not verify
    /// - `SessionExpired` if the snapshot is missing, expired or for a
    ///   different gateway order
    /// - `ProductNotFound` if a snapshot line's product has been deleted
    #[instrument(
        skip(self, callback),
        fields(user_id = %user.id, gateway_order_id = %callback.order_id, payment_id = %callback.payment_id)
    )]
    pub async fn confirm_payment(
        &self,
        user: &CurrentUser,
        callback: &PaymentCallback,
        now: DateTime<Utc>,
    ) -> Result<Order, CheckoutError> {
        let stage = CheckoutStage::AwaitingGateway;

        if !self.gateway.verify_callback(callback) {
            let stage = stage.advance(CheckoutEvent::GatewayRejected)?;
            tracing::warn!(%stage, "Payment signature rejected");
            return Err(GatewayError::InvalidSignature.into());
        }

        if let Some(order) = self.ledger.find_by_payment_id(&callback.payment_id).await? {
            tracing::info!(order_id = %order.id, "Payment already recorded");
            return Ok(order);
        }

        let Some(snapshot) = self
            .carts
            .load_snapshot()
            .await?
            .filter(|s| !s.is_expired(now) && s.matches_gateway_order(&callback.order_id))
        else {
            let stage = stage.advance(CheckoutEvent::GatewayRejected)?;
            tracing::warn!(%stage, "No usable checkout snapshot for payment");
            return Err(CheckoutError::SessionExpired);
        };

        stage.advance(CheckoutEvent::GatewayConfirmed)?;
        let draft = OrderDraft::paid_online(
            Some(user.id),
            snapshot.contact,
            GatewayReference {
                order_id: callback.order_id.clone(),
                payment_id: callback.payment_id.clone(),
                signature: callback.signature.clone(),
            },
        );

        let order = match self.ledger.commit(&draft, &snapshot.cart).await {
            Ok(order) => order,
            Err(CommitError::DuplicatePayment(payment_id)) => {
                // Lost a race with a concurrent delivery of the same callback.
                return self
                    .ledger
                    .find_by_payment_id(&payment_id)
                    .await?
                    .ok_or(CheckoutError::Repository(RepositoryError::NotFound));
            }
            Err(e) => return Err(e.into()),
        };

        self.clear_session(&order).await;
        self.receipts.order_placed(&order);

        tracing::info!(order_id = %order.id, total = %order.total(), "Online order placed");
        Ok(order)
    }

    /// Empty the cart and drop any snapshot after a commit.
    ///
    /// The order already exists at this point, so a session failure is only
    /// logged.
    async fn clear_session(&self, order: &Order) {
        if let Err(e) = self.carts.save_cart(&Cart::new()).await {
            tracing::warn!(order_id = %order.id, error = %e, "Failed to clear cart after order");
        }
        if let Err(e) = self.carts.clear_snapshot().await {
            tracing::warn!(order_id = %order.id, error = %e, "Failed to clear checkout snapshot");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal::Decimal;

    use kec_core::{Email, PaymentStatus};

    use crate::services::cart::StoreError;
    use crate::services::payments::sign;
    use crate::testing::{FakeGateway, MemoryCartStore, MemoryShop, RecordingNotifier};

    struct Harness {
        shop: MemoryShop,
        store: MemoryCartStore,
        gateway: FakeGateway,
        receipts: RecordingNotifier,
        settings: CheckoutSettings,
        user: CurrentUser,
    }

    impl Harness {
        fn new() -> Self {
            let shop = MemoryShop::new();
            let user_id = shop.add_user("asha@example.com");
            Self {
                shop,
                store: MemoryCartStore::new(),
                gateway: FakeGateway::new(),
                receipts: RecordingNotifier::default(),
                settings: CheckoutSettings::default(),
                user: CurrentUser {
                    id: user_id,
                    email: Email::parse("asha@example.com").unwrap(),
                },
            }
        }

        fn service(&self) -> CheckoutService<'_> {
            CheckoutService::new(
                &self.shop,
                &self.shop,
                &self.shop,
                &self.store,
                &self.gateway,
                &self.receipts,
                &self.settings,
            )
        }

        fn callback(&self, order_id: &str, payment_id: &str) -> PaymentCallback {
            PaymentCallback {
                payment_id: payment_id.to_string(),
                order_id: order_id.to_string(),
                signature: sign(FakeGateway::SECRET, order_id, payment_id),
            }
        }
    }

    fn form() -> ContactForm {
        ContactForm {
            full_name: Some("Asha Nair".into()),
            email: Some("asha@example.com".into()),
            phone: Some("+91 98450 12345".into()),
            address: Some("12 MG Road".into()),
            city: Some("Kochi".into()),
            postal_code: Some("682001".into()),
            notes: None,
        }
    }

    fn now() -> DateTime<Utc> {
        "2026-03-01T10:00:00Z".parse().unwrap()
    }

    async fn start_online(h: &Harness) -> PaymentIntent {
        match h
            .service()
            .submit(&h.user, &form(), None, PaymentMethod::Online, now())
            .await
            .unwrap()
        {
            CheckoutOutcome::AwaitingPayment(intent) => intent,
            CheckoutOutcome::Placed(_) => panic!("expected a payment intent"),
        }
    }

    #[tokio::test]
    async fn test_cash_on_delivery_commits_and_clears_cart() {
        let h = Harness::new();
        let pump = h.shop.add_product("Openwell Pump", "500.00", 5);
        h.store.set_cart([(pump, 2)]);

        let outcome = h
            .service()
            .submit(&h.user, &form(), None, PaymentMethod::CashOnDelivery, now())
            .await
            .unwrap();

        let CheckoutOutcome::Placed(order) = outcome else {
            panic!("expected a placed order");
        };
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].quantity, 2);
        assert_eq!(order.items[0].price, Decimal::new(50_000, 2));
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(h.shop.stock(pump), Some(3));
        assert!(h.store.cart().is_empty());
        assert!(h.receipts.orders().is_empty());
    }

    #[tokio::test]
    async fn test_submit_empty_cart() {
        let h = Harness::new();
        let err = h
            .service()
            .submit(&h.user, &form(), None, PaymentMethod::CashOnDelivery, now())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[tokio::test]
    async fn test_submit_validation_keeps_cart() {
        let h = Harness::new();
        let pump = h.shop.add_product("Openwell Pump", "500.00", 5);
        h.store.set_cart([(pump, 1)]);

        let mut incomplete = form();
        incomplete.city = None;
        let err = h
            .service()
            .submit(&h.user, &incomplete, None, PaymentMethod::CashOnDelivery, now())
            .await
            .unwrap_err();

        let CheckoutError::Validation(errors) = err else {
            panic!("expected validation errors");
        };
        assert!(errors.get("city").is_some());
        assert_eq!(h.store.cart().quantity(pump), Some(1));
        assert_eq!(h.shop.order_count(), 0);
    }

    #[tokio::test]
    async fn test_saved_address_overrides_form() {
        let h = Harness::new();
        let pump = h.shop.add_product("Openwell Pump", "500.00", 5);
        h.store.set_cart([(pump, 1)]);
        let address = h.shop.add_address(h.user.id, "Ravi Menon", "Thrissur");

        let mut sparse = form();
        sparse.full_name = None;
        sparse.city = None;
        let outcome = h
            .service()
            .submit(&h.user, &sparse, Some(address), PaymentMethod::CashOnDelivery, now())
            .await
            .unwrap();

        let CheckoutOutcome::Placed(order) = outcome else {
            panic!("expected a placed order");
        };
        assert_eq!(order.contact.full_name, "Ravi Menon");
        assert_eq!(order.contact.city, "Thrissur");
        assert_eq!(order.contact.email.as_str(), "asha@example.com");
    }

    #[tokio::test]
    async fn test_saved_address_with_blank_form_uses_account_email() {
        let h = Harness::new();
        let pump = h.shop.add_product("Openwell Pump", "500.00", 5);
        h.store.set_cart([(pump, 1)]);
        let address = h.shop.add_address(h.user.id, "Ravi Menon", "Thrissur");

        let outcome = h
            .service()
            .submit(
                &h.user,
                &ContactForm::default(),
                Some(address),
                PaymentMethod::CashOnDelivery,
                now(),
            )
            .await
            .unwrap();

        let CheckoutOutcome::Placed(order) = outcome else {
            panic!("expected a placed order");
        };
        assert_eq!(order.contact.full_name, "Ravi Menon");
        assert_eq!(order.contact.email.as_str(), "asha@example.com");
        assert_eq!(h.shop.stock(pump), Some(4));
    }

    #[tokio::test]
    async fn test_foreign_address_is_not_found() {
        let h = Harness::new();
        let pump = h.shop.add_product("Openwell Pump", "500.00", 5);
        h.store.set_cart([(pump, 1)]);
        let stranger = h.shop.add_user("other@example.com");
        let address = h.shop.add_address(stranger, "Someone Else", "Chennai");

        let err = h
            .service()
            .submit(&h.user, &form(), Some(address), PaymentMethod::CashOnDelivery, now())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::AddressNotFound(id) if id == address));
    }

    #[tokio::test]
    async fn test_online_submit_freezes_snapshot() {
        let h = Harness::new();
        let pump = h.shop.add_product("Submersible Pump", "12499.50", 5);
        h.store.set_cart([(pump, 2)]);

        let intent = start_online(&h).await;
        assert_eq!(intent.amount, 2_499_900);
        assert_eq!(intent.currency, "INR");

        let snapshot = h.store.snapshot().unwrap();
        assert_eq!(snapshot.amount, Decimal::new(2_499_900, 2));
        assert!(snapshot.matches_gateway_order(&intent.gateway_order_id));
        assert_eq!(snapshot.expires_at, now() + Duration::minutes(30));
        assert_eq!(h.store.cart().quantity(pump), Some(2));
        assert_eq!(h.shop.order_count(), 0);
    }

    #[tokio::test]
    async fn test_online_submit_times_out() {
        let mut h = Harness::new();
        h.settings.gateway_timeout = std::time::Duration::from_millis(10);
        h.gateway.set_delay(std::time::Duration::from_secs(5));
        let pump = h.shop.add_product("Submersible Pump", "100.00", 5);
        h.store.set_cart([(pump, 1)]);

        let err = h
            .service()
            .submit(&h.user, &form(), None, PaymentMethod::Online, now())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Gateway(GatewayError::Timeout)));
        assert!(h.store.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_confirm_payment_builds_order_from_snapshot() {
        let h = Harness::new();
        let pump = h.shop.add_product("Submersible Pump", "500.00", 5);
        h.store.set_cart([(pump, 2)]);
        let intent = start_online(&h).await;

        // The live cart keeps changing while the customer pays.
        h.store.set_cart([(pump, 4)]);

        let callback = h.callback(&intent.gateway_order_id, "pay_001");
        let order = h
            .service()
            .confirm_payment(&h.user, &callback, now() + Duration::minutes(5))
            .await
            .unwrap();

        assert_eq!(order.items[0].quantity, 2);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.payment_id(), Some("pay_001"));
        assert_eq!(h.shop.stock(pump), Some(3));
        assert!(h.store.cart().is_empty());
        assert!(h.store.snapshot().is_none());
        assert_eq!(h.receipts.orders(), vec![order.id]);
    }

    #[tokio::test]
    async fn test_confirm_payment_replay_is_noop() {
        let h = Harness::new();
        let pump = h.shop.add_product("Submersible Pump", "500.00", 5);
        h.store.set_cart([(pump, 1)]);
        let intent = start_online(&h).await;
        let callback = h.callback(&intent.gateway_order_id, "pay_002");

        let first = h
            .service()
            .confirm_payment(&h.user, &callback, now())
            .await
            .unwrap();
        let second = h
            .service()
            .confirm_payment(&h.user, &callback, now())
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(h.shop.order_count(), 1);
        assert_eq!(h.shop.stock(pump), Some(4));
        assert_eq!(h.receipts.orders().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_signature_creates_nothing() {
        let h = Harness::new();
        let pump = h.shop.add_product("Submersible Pump", "500.00", 5);
        h.store.set_cart([(pump, 1)]);
        let intent = start_online(&h).await;

        let mut callback = h.callback(&intent.gateway_order_id, "pay_003");
        callback.signature = sign("wrong-secret", &intent.gateway_order_id, "pay_003");
        let err = h
            .service()
            .confirm_payment(&h.user, &callback, now())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::Gateway(GatewayError::InvalidSignature)
        ));
        assert_eq!(h.shop.order_count(), 0);
        assert_eq!(h.store.cart().quantity(pump), Some(1));
        assert!(h.store.snapshot().is_some());
    }

    #[tokio::test]
    async fn test_expired_snapshot_is_rejected() {
        let h = Harness::new();
        let pump = h.shop.add_product("Submersible Pump", "500.00", 5);
        h.store.set_cart([(pump, 1)]);
        let intent = start_online(&h).await;
        let callback = h.callback(&intent.gateway_order_id, "pay_004");

        let err = h
            .service()
            .confirm_payment(&h.user, &callback, now() + Duration::minutes(31))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::SessionExpired));
        assert_eq!(h.shop.order_count(), 0);
    }

    #[tokio::test]
    async fn test_mismatched_gateway_order_is_rejected() {
        let h = Harness::new();
        let pump = h.shop.add_product("Submersible Pump", "500.00", 5);
        h.store.set_cart([(pump, 1)]);
        start_online(&h).await;
        let callback = h.callback("order_someone_else", "pay_005");

        let err = h
            .service()
            .confirm_payment(&h.user, &callback, now())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::SessionExpired));
    }

    /// Session that accepts checkout but refuses to be cleared.
    struct StickySession(MemoryCartStore);

    fn session_down() -> StoreError {
        StoreError::Session(tower_sessions::session::Error::Store(
            tower_sessions::session_store::Error::Backend("session table unavailable".into()),
        ))
    }

    #[async_trait]
    impl CartStore for StickySession {
        async fn load_cart(&self) -> Result<Cart, StoreError> {
            self.0.load_cart().await
        }

        async fn save_cart(&self, cart: &Cart) -> Result<(), StoreError> {
            if cart.is_empty() {
                return Err(session_down());
            }
            self.0.save_cart(cart).await
        }

        async fn load_snapshot(&self) -> Result<Option<CheckoutSnapshot>, StoreError> {
            self.0.load_snapshot().await
        }

        async fn save_snapshot(&self, snapshot: &CheckoutSnapshot) -> Result<(), StoreError> {
            self.0.save_snapshot(snapshot).await
        }

        async fn clear_snapshot(&self) -> Result<(), StoreError> {
            Err(session_down())
        }
    }

    #[tokio::test]
    async fn test_session_clear_failure_keeps_committed_order() {
        let h = Harness::new();
        let pump = h.shop.add_product("Submersible Pump", "500.00", 5);
        let sticky = StickySession(MemoryCartStore::new());
        sticky.0.set_cart([(pump, 2)]);
        let service = CheckoutService::new(
            &h.shop,
            &h.shop,
            &h.shop,
            &sticky,
            &h.gateway,
            &h.receipts,
            &h.settings,
        );

        let CheckoutOutcome::AwaitingPayment(intent) = service
            .submit(&h.user, &form(), None, PaymentMethod::Online, now())
            .await
            .unwrap()
        else {
            panic!("expected a payment intent");
        };
        let callback = h.callback(&intent.gateway_order_id, "pay_007");

        let order = service
            .confirm_payment(&h.user, &callback, now())
            .await
            .unwrap();
        assert_eq!(h.shop.order_count(), 1);
        assert_eq!(h.shop.stock(pump), Some(3));
        assert!(sticky.0.snapshot().is_some());
        assert_eq!(h.receipts.orders(), vec![order.id]);

        // The stale snapshot cannot place a second order.
        let replay = service
            .confirm_payment(&h.user, &callback, now())
            .await
            .unwrap();
        assert_eq!(replay.id, order.id);
        assert_eq!(h.shop.order_count(), 1);
    }

    #[tokio::test]
    async fn test_stock_floors_at_zero_on_oversell() {
        let h = Harness::new();
        let pump = h.shop.add_product("Submersible Pump", "500.00", 5);
        h.store.set_cart([(pump, 3)]);
        let intent = start_online(&h).await;

        // Someone else bought most of the stock meanwhile.
        h.shop.set_stock(pump, 1);

        let callback = h.callback(&intent.gateway_order_id, "pay_006");
        let order = h
            .service()
            .confirm_payment(&h.user, &callback, now())
            .await
            .unwrap();
        assert_eq!(order.items[0].quantity, 3);
        assert_eq!(h.shop.stock(pump), Some(0));
    }
}
