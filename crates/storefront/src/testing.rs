//! In-memory collaborators for tests.
//!
//! [`MemoryShop`] stands in for the catalog, order ledger, address book and
//! password-reset store at once, holding everything behind one lock so a
//! commit is as atomic as the database transaction it replaces.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::missing_panics_doc)]

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use kec_core::{
    AddressId, Cart, CheckoutSnapshot, ContactDetails, Email, OrderId, OrderItemId, OrderStatus,
    PasswordResetId, PaymentMethod, PaymentStatus, ProductId, UserId,
};

use crate::config::{CheckoutConfig, EmailConfig, RazorpayConfig, StorefrontConfig};
use crate::db::RepositoryError;
use crate::models::{
    Address, GatewayReference, Order, OrderDraft, OrderItem, PasswordResetOtp, Product,
    RecommendationQuery, User,
};
use crate::services::cart::{CartStore, StoreError};
use crate::services::catalog::Catalog;
use crate::services::checkout::AddressBook;
use crate::services::email::{EmailError, Mailer};
use crate::services::orders::{CommitError, OrderLedger};
use crate::services::password_reset::PasswordResetStore;
use crate::services::payments::{
    GatewayError, PaymentCallback, PaymentGateway, PaymentIntent, verify_signature,
};
use crate::services::receipt::ReceiptNotifier;
use crate::state::AppState;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct ShopState {
    next_id: i32,
    products: BTreeMap<ProductId, Product>,
    users: BTreeMap<UserId, User>,
    addresses: Vec<Address>,
    orders: Vec<Order>,
    resets: Vec<PasswordResetOtp>,
}

impl ShopState {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Products, users, addresses, orders and reset codes in memory.
#[derive(Default)]
pub struct MemoryShop {
    state: Mutex<ShopState>,
}

impl MemoryShop {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an available product; `price` is a decimal string like `"500.00"`.
    pub fn add_product(&self, name: &str, price: &str, stock: u32) -> ProductId {
        let mut state = lock(&self.state);
        let id = ProductId::new(state.next_id());
        state.products.insert(
            id,
            Product {
                id,
                slug: name.to_lowercase().replace(' ', "-"),
                name: name.to_string(),
                price: Decimal::from_str(price).expect("valid price"),
                stock,
                is_available: true,
                motor_power_hp: None,
                max_head_m: None,
                max_flow_lpm: None,
                max_depth_ft: None,
                phase: None,
                usage_type: None,
            },
        );
        id
    }

    /// Insert a fully specified product, keeping its id.
    pub fn insert_product(&self, product: Product) {
        lock(&self.state).products.insert(product.id, product);
    }

    pub fn set_available(&self, id: ProductId, available: bool) {
        if let Some(p) = lock(&self.state).products.get_mut(&id) {
            p.is_available = available;
        }
    }

    pub fn set_stock(&self, id: ProductId, stock: u32) {
        if let Some(p) = lock(&self.state).products.get_mut(&id) {
            p.stock = stock;
        }
    }

    pub fn set_price(&self, id: ProductId, price: Decimal) {
        if let Some(p) = lock(&self.state).products.get_mut(&id) {
            p.price = price;
        }
    }

    pub fn remove_product(&self, id: ProductId) {
        lock(&self.state).products.remove(&id);
    }

    #[must_use]
    pub fn stock(&self, id: ProductId) -> Option<u32> {
        lock(&self.state).products.get(&id).map(|p| p.stock)
    }

    /// Add an account with an unusable password hash.
    pub fn add_user(&self, email: &str) -> UserId {
        let mut state = lock(&self.state);
        let id = UserId::new(state.next_id());
        let now = Utc::now();
        state.users.insert(
            id,
            User {
                id,
                email: Email::parse(email).expect("valid email"),
                password_hash: "!".to_string(),
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    #[must_use]
    pub fn password_hash(&self, id: UserId) -> Option<String> {
        lock(&self.state)
            .users
            .get(&id)
            .map(|u| u.password_hash.clone())
    }

    pub fn add_address(&self, user_id: UserId, full_name: &str, city: &str) -> AddressId {
        let mut state = lock(&self.state);
        let id = AddressId::new(state.next_id());
        state.addresses.push(Address {
            id,
            user_id,
            label: "Home".to_string(),
            full_name: full_name.to_string(),
            phone: "9876543210".to_string(),
            address_line: "4 Temple Street".to_string(),
            city: city.to_string(),
            postal_code: "680001".to_string(),
            is_default: false,
        });
        id
    }

    #[must_use]
    pub fn order_count(&self) -> usize {
        lock(&self.state).orders.len()
    }

    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        lock(&self.state).orders.clone()
    }
}

#[async_trait]
impl Catalog for MemoryShop {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(lock(&self.state).products.get(&id).cloned())
    }

    async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let state = lock(&self.state);
        Ok(state
            .products
            .values()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn recommend(
        &self,
        query: &RecommendationQuery,
        limit: i64,
    ) -> Result<Vec<Product>, RepositoryError> {
        let state = lock(&self.state);
        let mut matches: Vec<Product> = state
            .products
            .values()
            .filter(|p| p.suits(query))
            .cloned()
            .collect();
        matches.sort_by(Product::recommendation_order);
        matches.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(matches)
    }
}

#[async_trait]
impl OrderLedger for MemoryShop {
    async fn commit(&self, draft: &OrderDraft, cart: &Cart) -> Result<Order, CommitError> {
        if cart.is_empty() {
            return Err(CommitError::EmptyCart);
        }

        let mut state = lock(&self.state);
        if let Some(payment_id) = draft.gateway.as_ref().map(|g| &g.payment_id)
            && state.orders.iter().any(|o| o.payment_id() == Some(payment_id))
        {
            return Err(CommitError::DuplicatePayment(payment_id.clone()));
        }

        // Check every line before touching stock so a failure writes nothing.
        for (product_id, _) in cart.iter() {
            if !state.products.contains_key(&product_id) {
                return Err(CommitError::MissingProduct(product_id));
            }
        }

        let order_id = OrderId::new(state.next_id());
        let mut items = Vec::with_capacity(cart.len());
        for (product_id, quantity) in cart.iter() {
            let item_id = OrderItemId::new(state.next_id());
            let product = state
                .products
                .get_mut(&product_id)
                .ok_or(CommitError::MissingProduct(product_id))?;
            product.stock = product.stock.saturating_sub(quantity);
            items.push(OrderItem {
                id: item_id,
                order_id,
                product_id: Some(product_id),
                product_name: product.name.clone(),
                price: product.price,
                quantity,
            });
        }

        let now = Utc::now();
        let order = Order {
            id: order_id,
            user_id: draft.user_id,
            contact: draft.contact.clone(),
            status: OrderStatus::Pending,
            payment_method: draft.payment_method,
            payment_status: draft.payment_status,
            gateway: draft.gateway.clone(),
            items,
            created_at: now,
            updated_at: now,
        };
        state.orders.push(order.clone());
        Ok(order)
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<Order>, RepositoryError> {
        Ok(lock(&self.state)
            .orders
            .iter()
            .find(|o| o.payment_id() == Some(payment_id))
            .cloned())
    }

    async fn find_for_user(
        &self,
        id: OrderId,
        user_id: UserId,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(lock(&self.state)
            .orders
            .iter()
            .find(|o| o.id == id && o.is_owned_by(user_id))
            .cloned())
    }
}

#[async_trait]
impl AddressBook for MemoryShop {
    async fn address_for_user(
        &self,
        id: AddressId,
        user_id: UserId,
    ) -> Result<Option<Address>, RepositoryError> {
        Ok(lock(&self.state)
            .addresses
            .iter()
            .find(|a| a.id == id && a.user_id == user_id)
            .cloned())
    }
}

#[async_trait]
impl PasswordResetStore for MemoryShop {
    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        Ok(lock(&self.state)
            .users
            .values()
            .find(|u| &u.email == email)
            .cloned())
    }

    async fn create_code(
        &self,
        user_id: UserId,
        code: &str,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> Result<PasswordResetOtp, RepositoryError> {
        let mut state = lock(&self.state);
        let reset = PasswordResetOtp {
            id: PasswordResetId::new(state.next_id()),
            user_id,
            code: code.to_string(),
            token,
            created_at: now,
            is_verified: false,
        };
        state.resets.push(reset.clone());
        Ok(reset)
    }

    async fn latest_unverified(
        &self,
        user_id: UserId,
        code: &str,
    ) -> Result<Option<PasswordResetOtp>, RepositoryError> {
        Ok(lock(&self.state)
            .resets
            .iter()
            .filter(|r| r.user_id == user_id && r.code == code && !r.is_verified)
            .max_by_key(|r| r.id)
            .cloned())
    }

    async fn mark_verified(&self, id: PasswordResetId) -> Result<(), RepositoryError> {
        let mut state = lock(&self.state);
        let reset = state
            .resets
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(RepositoryError::NotFound)?;
        reset.is_verified = true;
        Ok(())
    }

    async fn verified_by_token(
        &self,
        token: Uuid,
    ) -> Result<Option<PasswordResetOtp>, RepositoryError> {
        Ok(lock(&self.state)
            .resets
            .iter()
            .find(|r| r.token == token && r.is_verified)
            .cloned())
    }

    async fn replace_password(
        &self,
        reset: &PasswordResetOtp,
        password_hash: &str,
    ) -> Result<bool, RepositoryError> {
        let mut state = lock(&self.state);
        let before = state.resets.len();
        state
            .resets
            .retain(|r| !(r.id == reset.id && r.user_id == reset.user_id && r.is_verified));
        if state.resets.len() == before {
            return Ok(false);
        }

        let user = state
            .users
            .get_mut(&reset.user_id)
            .ok_or(RepositoryError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(true)
    }
}

/// Session cart and snapshot in memory.
#[derive(Default)]
pub struct MemoryCartStore {
    cart: Mutex<Cart>,
    snapshot: Mutex<Option<CheckoutSnapshot>>,
}

impl MemoryCartStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn cart(&self) -> Cart {
        lock(&self.cart).clone()
    }

    pub fn set_cart(&self, lines: impl IntoIterator<Item = (ProductId, u32)>) {
        *lock(&self.cart) = lines.into_iter().collect();
    }

    #[must_use]
    pub fn snapshot(&self) -> Option<CheckoutSnapshot> {
        lock(&self.snapshot).clone()
    }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn load_cart(&self) -> Result<Cart, StoreError> {
        Ok(self.cart())
    }

    async fn save_cart(&self, cart: &Cart) -> Result<(), StoreError> {
        *lock(&self.cart) = cart.clone();
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<Option<CheckoutSnapshot>, StoreError> {
        Ok(self.snapshot())
    }

    async fn save_snapshot(&self, snapshot: &CheckoutSnapshot) -> Result<(), StoreError> {
        *lock(&self.snapshot) = Some(snapshot.clone());
        Ok(())
    }

    async fn clear_snapshot(&self) -> Result<(), StoreError> {
        *lock(&self.snapshot) = None;
        Ok(())
    }
}

/// Gateway that signs with [`FakeGateway::SECRET`] and never leaves the process.
#[derive(Default)]
pub struct FakeGateway {
    created: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    intents: Mutex<Vec<PaymentIntent>>,
}

impl FakeGateway {
    pub const SECRET: &'static str = "test_gateway_secret";
    pub const KEY_ID: &'static str = "rzp_test_key";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `create_intent` take this long.
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    #[must_use]
    pub fn intents(&self) -> Vec<PaymentIntent> {
        lock(&self.intents).clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
        _receipt: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if amount <= 0 {
            return Err(GatewayError::InvalidAmount(amount.to_string()));
        }

        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let intent = PaymentIntent {
            gateway_order_id: format!("order_test_{n}"),
            amount,
            currency: currency.to_string(),
            key_id: Self::KEY_ID.to_string(),
        };
        lock(&self.intents).push(intent.clone());
        Ok(intent)
    }

    fn verify_callback(&self, callback: &PaymentCallback) -> bool {
        verify_signature(
            Self::SECRET,
            &callback.order_id,
            &callback.payment_id,
            &callback.signature,
        )
    }
}

/// Mailer that keeps what it was asked to send.
#[derive(Default)]
pub struct RecordingMailer {
    fail: bool,
    attempts: AtomicUsize,
    codes: Mutex<Vec<(Email, String)>>,
    receipts: Mutex<Vec<(OrderId, Vec<u8>)>>,
}

impl RecordingMailer {
    /// A mailer whose every send fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn codes(&self) -> Vec<(Email, String)> {
        lock(&self.codes).clone()
    }

    #[must_use]
    pub fn receipts(&self) -> Vec<(OrderId, Vec<u8>)> {
        lock(&self.receipts).clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_password_reset_code(&self, to: &Email, code: &str) -> Result<(), EmailError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EmailError::InvalidAddress(to.to_string()));
        }
        lock(&self.codes).push((to.clone(), code.to_string()));
        Ok(())
    }

    async fn send_receipt(&self, order: &Order, pdf: Vec<u8>) -> Result<(), EmailError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EmailError::InvalidAddress(order.contact.email.to_string()));
        }
        lock(&self.receipts).push((order.id, pdf));
        Ok(())
    }
}

/// Notifier that records which orders it was told about.
#[derive(Default)]
pub struct RecordingNotifier {
    orders: Mutex<Vec<OrderId>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn orders(&self) -> Vec<OrderId> {
        lock(&self.orders).clone()
    }
}

impl ReceiptNotifier for RecordingNotifier {
    fn order_placed(&self, order: &Order) {
        lock(&self.orders).push(order.id);
    }
}

/// A paid online order with one line.
#[must_use]
pub fn sample_order() -> Order {
    let now = Utc::now();
    Order {
        id: OrderId::new(7),
        user_id: Some(UserId::new(1)),
        contact: ContactDetails {
            full_name: "Asha Nair".to_string(),
            email: Email::parse("asha@example.com").expect("valid email"),
            phone: "9845012345".to_string(),
            address: "12 MG Road".to_string(),
            city: "Kochi".to_string(),
            postal_code: "682001".to_string(),
            notes: None,
        },
        status: OrderStatus::Pending,
        payment_method: PaymentMethod::Online,
        payment_status: PaymentStatus::Paid,
        gateway: Some(GatewayReference {
            order_id: "order_test_1".to_string(),
            payment_id: "pay_test_1".to_string(),
            signature: "deadbeef".to_string(),
        }),
        items: vec![OrderItem {
            id: OrderItemId::new(1),
            order_id: OrderId::new(7),
            product_id: Some(ProductId::new(3)),
            product_name: "Openwell Pump".to_string(),
            price: Decimal::new(50_000, 2),
            quantity: 2,
        }],
        created_at: now,
        updated_at: now,
    }
}

/// Configuration pointing at local placeholders; nothing is contacted.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/kec_test"),
        host: "127.0.0.1".parse().expect("valid ip"),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        session_secret: SecretString::from("k".repeat(32)),
        razorpay: RazorpayConfig {
            key_id: FakeGateway::KEY_ID.to_string(),
            key_secret: SecretString::from(FakeGateway::SECRET),
            api_base: "http://127.0.0.1:9".to_string(),
            currency: "INR".to_string(),
            timeout: Duration::from_secs(2),
        },
        email: EmailConfig {
            smtp_host: "localhost".to_string(),
            smtp_port: 2525,
            smtp_username: "test".to_string(),
            smtp_password: SecretString::from("test"),
            from_address: "orders@kecpumps.in".to_string(),
            store_name: "KEC Pumps".to_string(),
        },
        checkout: CheckoutConfig::default(),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// Application state over [`test_config`] with in-memory outbound services.
///
/// The pool connects lazily, so routes that never touch the database can be
/// driven without one.
#[must_use]
pub fn test_state() -> AppState {
    let config = test_config();
    let pool = PgPoolOptions::new()
        .connect_lazy(config.database_url.expose_secret())
        .expect("valid database url");
    AppState::with_services(
        config,
        pool,
        Arc::new(FakeGateway::new()),
        Arc::new(RecordingMailer::default()),
        Arc::new(RecordingNotifier::default()),
    )
}
