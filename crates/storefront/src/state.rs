//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::checkout::CheckoutSettings;
use crate::services::email::{EmailService, Mailer};
use crate::services::payments::{GatewayError, PaymentGateway, RazorpayClient};
use crate::services::receipt::{ReceiptNotifier, ReceiptService};

/// Error building the outbound clients.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment gateway client: {0}")]
    Gateway(#[from] GatewayError),
    #[error("SMTP transport: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    checkout: CheckoutSettings,
    gateway: Arc<dyn PaymentGateway>,
    mailer: Arc<dyn Mailer>,
    receipts: Arc<dyn ReceiptNotifier>,
}

impl AppState {
    /// Create the application state with the Razorpay and SMTP clients.
    ///
    /// # Errors
    ///
    /// Returns an error if either client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let gateway: Arc<dyn PaymentGateway> = Arc::new(RazorpayClient::new(&config.razorpay)?);
        let mailer: Arc<dyn Mailer> = Arc::new(EmailService::new(&config.email)?);
        let receipts: Arc<dyn ReceiptNotifier> = Arc::new(ReceiptService::new(
            Arc::clone(&mailer),
            config.email.store_name.clone(),
        ));

        Ok(Self::with_services(config, pool, gateway, mailer, receipts))
    }

    /// Create the application state around existing collaborators.
    #[must_use]
    pub fn with_services(
        config: StorefrontConfig,
        pool: PgPool,
        gateway: Arc<dyn PaymentGateway>,
        mailer: Arc<dyn Mailer>,
        receipts: Arc<dyn ReceiptNotifier>,
    ) -> Self {
        let checkout = CheckoutSettings::from_config(&config);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                checkout,
                gateway,
                mailer,
                receipts,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn checkout_settings(&self) -> &CheckoutSettings {
        &self.inner.checkout
    }

    #[must_use]
    pub fn gateway(&self) -> &dyn PaymentGateway {
        self.inner.gateway.as_ref()
    }

    #[must_use]
    pub fn mailer(&self) -> &dyn Mailer {
        self.inner.mailer.as_ref()
    }

    #[must_use]
    pub fn receipts(&self) -> &dyn ReceiptNotifier {
        self.inner.receipts.as_ref()
    }
}
