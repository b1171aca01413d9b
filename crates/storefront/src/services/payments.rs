//! Payment gateway adapter (Razorpay).
//!
//! Two operations cross the boundary:
//!
//! - creating a payment intent (a remote "order") for an amount in minor units
//! - verifying the signature on the browser callback after payment
//!
//! The callback signature is `hex(HMAC-SHA256(key_secret, "{order_id}|{payment_id}"))`.
//!
//! # API Reference
//!
//! - Base URL: `https://api.razorpay.com`
//! - Authentication: HTTP basic auth with key id and key secret
//! - `POST /v1/orders` with `{amount, currency, receipt}`

use std::sync::Arc;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::instrument;

use crate::config::RazorpayConfig;

type HmacSha256 = Hmac<Sha256>;

/// Errors from the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The callback signature does not match.
    #[error("payment signature verification failed")]
    InvalidSignature,

    /// The gateway did not answer in time.
    #[error("payment gateway timed out")]
    Timeout,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway returned an error response.
    #[error("gateway error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Amount cannot be charged.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

/// A remote order created at the gateway, handed to the browser widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentIntent {
    /// Remote order id (`order_...`).
    pub gateway_order_id: String,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
    /// Public key id the widget needs.
    pub key_id: String,
}

/// Identifiers posted back by the browser after payment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentCallback {
    #[serde(rename = "razorpay_payment_id")]
    pub payment_id: String,
    #[serde(rename = "razorpay_order_id")]
    pub order_id: String,
    #[serde(rename = "razorpay_signature")]
    pub signature: String,
}

/// The payment gateway seam.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a remote order for `amount` minor units.
    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<PaymentIntent, GatewayError>;

    /// Whether the callback signature is authentic.
    fn verify_callback(&self, callback: &PaymentCallback) -> bool;
}

/// Compute the callback signature for an order/payment pair.
#[must_use]
pub fn sign(secret: &str, order_id: &str, payment_id: &str) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a callback signature in constant time.
#[must_use]
pub fn verify_signature(secret: &str, order_id: &str, payment_id: &str, signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Deserialize)]
struct CreateOrderResponse {
    id: String,
    amount: i64,
    currency: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    description: Option<String>,
}

/// Razorpay REST client.
#[derive(Clone)]
pub struct RazorpayClient {
    inner: Arc<RazorpayClientInner>,
}

struct RazorpayClientInner {
    client: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: SecretString,
}

impl RazorpayClient {
    /// Create a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &RazorpayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            inner: Arc::new(RazorpayClientInner {
                client,
                api_base: config.api_base.clone(),
                key_id: config.key_id.clone(),
                key_secret: config.key_secret.clone(),
            }),
        })
    }

    async fn parse_error(response: reqwest::Response) -> GatewayError {
        let status = response.status().as_u16();
        let message = response
            .json::<ErrorEnvelope>()
            .await
            .ok()
            .and_then(|e| e.error.description)
            .unwrap_or_else(|| "unexpected response".to_string());
        GatewayError::Api { status, message }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    #[instrument(skip(self), fields(gateway = "razorpay"))]
    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        if amount <= 0 {
            return Err(GatewayError::InvalidAmount(amount.to_string()));
        }

        let url = format!("{}/v1/orders", self.inner.api_base);
        let response = self
            .inner
            .client
            .post(&url)
            .basic_auth(&self.inner.key_id, Some(self.inner.key_secret.expose_secret()))
            .json(&CreateOrderRequest {
                amount,
                currency,
                receipt,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Http(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(Self::parse_error(response).await);
        }

        let created: CreateOrderResponse = response.json().await?;
        tracing::info!(gateway_order_id = %created.id, amount, "Payment intent created");

        Ok(PaymentIntent {
            gateway_order_id: created.id,
            amount: created.amount,
            currency: created.currency,
            key_id: self.inner.key_id.clone(),
        })
    }

    fn verify_callback(&self, callback: &PaymentCallback) -> bool {
        verify_signature(
            self.inner.key_secret.expose_secret(),
            &callback.order_id,
            &callback.payment_id,
            &callback.signature,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "rzp_test_secret_Kx9";

    #[test]
    fn test_sign_matches_manual_hmac() {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(b"order_9A33XWu170gUtm|pay_29QQoUBi66xm2f");
        let expected = hex::encode(mac.finalize().into_bytes());

        assert_eq!(
            sign(SECRET, "order_9A33XWu170gUtm", "pay_29QQoUBi66xm2f"),
            expected
        );
    }

    #[test]
    fn test_verify_signature_accepts_valid() {
        let signature = sign(SECRET, "order_1", "pay_1");
        assert!(verify_signature(SECRET, "order_1", "pay_1", &signature));
    }

    #[test]
    fn test_verify_signature_rejects_tampering() {
        let signature = sign(SECRET, "order_1", "pay_1");
        assert!(!verify_signature(SECRET, "order_1", "pay_2", &signature));
        assert!(!verify_signature(SECRET, "order_2", "pay_1", &signature));
        assert!(!verify_signature("other-secret", "order_1", "pay_1", &signature));
        assert!(!verify_signature(SECRET, "order_1", "pay_1", "not-hex"));
        assert!(!verify_signature(SECRET, "order_1", "pay_1", ""));
    }

    #[test]
    fn test_callback_field_names() {
        let callback: PaymentCallback = serde_json::from_str(
            r#"{"razorpay_payment_id":"pay_1","razorpay_order_id":"order_1","razorpay_signature":"ab"}"#,
        )
        .unwrap();
        assert_eq!(callback.payment_id, "pay_1");
        assert_eq!(callback.order_id, "order_1");
    }
}
