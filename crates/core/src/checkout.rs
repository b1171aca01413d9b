//! Checkout lifecycle and the frozen snapshot used by online payments.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Cart, ContactDetails};

/// Where a single checkout attempt currently stands.
///
/// ```text
/// EmptyCart --CartFilled--> Review
/// Review --SubmitCashOnDelivery--> Committed
/// Review --SubmitOnline--> AwaitingGateway
/// AwaitingGateway --GatewayConfirmed--> Committed
/// AwaitingGateway --GatewayRejected--> Failed
/// ```
///
/// A validation failure in `Review` is not an event; the attempt simply
/// stays in `Review`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStage {
    EmptyCart,
    Review,
    AwaitingGateway,
    Committed,
    Failed,
}

/// Inputs that move a checkout between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckoutEvent {
    CartFilled,
    SubmitCashOnDelivery,
    SubmitOnline,
    GatewayConfirmed,
    /// Bad signature, expired snapshot or gateway timeout.
    GatewayRejected,
}

/// An event that is not legal in the current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot apply {event:?} while checkout is {stage:?}")]
pub struct InvalidTransition {
    pub stage: CheckoutStage,
    pub event: CheckoutEvent,
}

impl CheckoutStage {
    /// Initial stage for a cart.
    #[must_use]
    pub fn for_cart(cart: &Cart) -> Self {
        if cart.is_empty() {
            Self::EmptyCart
        } else {
            Self::Review
        }
    }

    /// Apply an event.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] if the event is not accepted in this
    /// stage.
    pub const fn advance(self, event: CheckoutEvent) -> Result<Self, InvalidTransition> {
        use CheckoutEvent as E;

        let next = match (self, event) {
            (Self::EmptyCart, E::CartFilled) => Self::Review,
            (Self::Review, E::SubmitCashOnDelivery) | (Self::AwaitingGateway, E::GatewayConfirmed) => {
                Self::Committed
            }
            (Self::Review, E::SubmitOnline) => Self::AwaitingGateway,
            (Self::AwaitingGateway, E::GatewayRejected) => Self::Failed,
            (stage, event) => return Err(InvalidTransition { stage, event }),
        };
        Ok(next)
    }

    /// Whether this attempt is over.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Failed)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmptyCart => "empty_cart",
            Self::Review => "review",
            Self::AwaitingGateway => "awaiting_gateway",
            Self::Committed => "committed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for CheckoutStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cart and contact data frozen when an online payment starts.
///
/// The live cart stays usable while the customer is at the gateway; the
/// order is later built from this snapshot, not from the live cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSnapshot {
    pub contact: ContactDetails,
    pub cart: Cart,
    /// Amount quoted to the gateway, in major units.
    pub amount: Decimal,
    /// Remote order id, filled in once the gateway accepts the intent.
    pub gateway_order_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CheckoutSnapshot {
    /// Default lifetime of a snapshot.
    pub const DEFAULT_TTL_MINUTES: i64 = 30;

    /// Freeze a snapshot that expires `ttl` after `now`.
    #[must_use]
    pub fn new(
        contact: ContactDetails,
        cart: Cart,
        amount: Decimal,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            contact,
            cart,
            amount,
            gateway_order_id: None,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Whether the snapshot can no longer be used at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whether a gateway callback for `gateway_order_id` belongs to this
    /// snapshot.
    #[must_use]
    pub fn matches_gateway_order(&self, gateway_order_id: &str) -> bool {
        self.gateway_order_id.as_deref() == Some(gateway_order_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{ContactForm, ProductId};

    #[test]
    fn test_cash_on_delivery_path() {
        let stage = CheckoutStage::EmptyCart
            .advance(CheckoutEvent::CartFilled)
            .unwrap()
            .advance(CheckoutEvent::SubmitCashOnDelivery)
            .unwrap();
        assert_eq!(stage, CheckoutStage::Committed);
        assert!(stage.is_terminal());
    }

    #[test]
    fn test_online_path() {
        let awaiting = CheckoutStage::Review
            .advance(CheckoutEvent::SubmitOnline)
            .unwrap();
        assert_eq!(awaiting, CheckoutStage::AwaitingGateway);
        assert_eq!(
            awaiting.advance(CheckoutEvent::GatewayConfirmed).unwrap(),
            CheckoutStage::Committed
        );
        assert_eq!(
            awaiting.advance(CheckoutEvent::GatewayRejected).unwrap(),
            CheckoutStage::Failed
        );
    }

    #[test]
    fn test_illegal_transitions() {
        let err = CheckoutStage::EmptyCart
            .advance(CheckoutEvent::SubmitCashOnDelivery)
            .unwrap_err();
        assert_eq!(err.stage, CheckoutStage::EmptyCart);
        assert!(CheckoutStage::Review.advance(CheckoutEvent::GatewayConfirmed).is_err());
        assert!(CheckoutStage::Committed.advance(CheckoutEvent::CartFilled).is_err());
        assert!(CheckoutStage::Failed.advance(CheckoutEvent::GatewayConfirmed).is_err());
    }

    #[test]
    fn test_stage_for_cart() {
        let mut cart = Cart::new();
        assert_eq!(CheckoutStage::for_cart(&cart), CheckoutStage::EmptyCart);
        cart.add(ProductId::new(1), 1, 3).unwrap();
        assert_eq!(CheckoutStage::for_cart(&cart), CheckoutStage::Review);
    }

    fn snapshot(now: DateTime<Utc>) -> CheckoutSnapshot {
        let contact = ContactForm {
            full_name: Some("Arun".into()),
            email: Some("arun@example.com".into()),
            phone: Some("9840012345".into()),
            address: Some("1 Main Street".into()),
            city: Some("Salem".into()),
            postal_code: Some("636001".into()),
            notes: None,
        }
        .validate()
        .unwrap();
        let mut cart = Cart::new();
        cart.add(ProductId::new(3), 2, 10).unwrap();
        CheckoutSnapshot::new(contact, cart, Decimal::new(100_000, 2), now, Duration::minutes(30))
    }

    #[test]
    fn test_snapshot_expiry() {
        let now = Utc::now();
        let snap = snapshot(now);
        assert!(!snap.is_expired(now + Duration::minutes(30)));
        assert!(snap.is_expired(now + Duration::minutes(30) + Duration::seconds(1)));
    }

    #[test]
    fn test_snapshot_gateway_order_match() {
        let mut snap = snapshot(Utc::now());
        assert!(!snap.matches_gateway_order("order_abc"));
        snap.gateway_order_id = Some("order_abc".into());
        assert!(snap.matches_gateway_order("order_abc"));
        assert!(!snap.matches_gateway_order("order_xyz"));
    }

    #[test]
    fn test_snapshot_survives_session_serialization() {
        let snap = snapshot(Utc::now());
        let json = serde_json::to_string(&snap).unwrap();
        let back: CheckoutSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }
}
