//! Orders and their line items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use kec_core::{
    ContactDetails, OrderId, OrderItemId, OrderStatus, PaymentMethod, PaymentStatus, ProductId,
    UserId, money,
};

/// A committed order.
///
/// Line items never change after commit; the total is always derived from
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    /// `None` once the owning account has been deleted.
    pub user_id: Option<UserId>,
    pub contact: ContactDetails,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub gateway: Option<GatewayReference>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Sum of line subtotals.
    #[must_use]
    pub fn total(&self) -> Decimal {
        money::sum(self.items.iter().map(OrderItem::subtotal))
    }

    /// Gateway payment id, for online orders.
    #[must_use]
    pub fn payment_id(&self) -> Option<&str> {
        self.gateway.as_ref().map(|g| g.payment_id.as_str())
    }

    #[must_use]
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == Some(user_id)
    }
}

/// One line of an order, priced at commit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    /// `None` once the product has been deleted from the catalog.
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub price: Decimal,
    pub quantity: u32,
}

impl OrderItem {
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        money::line_subtotal(self.price, self.quantity)
    }
}

/// The three identifiers the payment gateway returns for a captured payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayReference {
    pub order_id: String,
    pub payment_id: String,
    #[serde(skip)]
    pub signature: String,
}

/// Everything the ledger needs to commit an order, apart from the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub user_id: Option<UserId>,
    pub contact: ContactDetails,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub gateway: Option<GatewayReference>,
}

impl OrderDraft {
    /// A cash-on-delivery order: unpaid until the courier collects.
    #[must_use]
    pub const fn cash_on_delivery(user_id: Option<UserId>, contact: ContactDetails) -> Self {
        Self {
            user_id,
            contact,
            payment_method: PaymentMethod::CashOnDelivery,
            payment_status: PaymentStatus::Pending,
            gateway: None,
        }
    }

    /// An online order whose payment the gateway has already captured.
    #[must_use]
    pub const fn paid_online(
        user_id: Option<UserId>,
        contact: ContactDetails,
        gateway: GatewayReference,
    ) -> Self {
        Self {
            user_id,
            contact,
            payment_method: PaymentMethod::Online,
            payment_status: PaymentStatus::Paid,
            gateway: Some(gateway),
        }
    }
}

/// One row of the staff order report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub status: OrderStatus,
    pub orders: i64,
    /// Sum of line subtotals over paid orders in this status.
    pub paid_revenue: Decimal,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use kec_core::ContactForm;

    fn item(price: &str, quantity: u32) -> OrderItem {
        OrderItem {
            id: OrderItemId::new(1),
            order_id: OrderId::new(1),
            product_id: Some(ProductId::new(1)),
            product_name: "Openwell Pump".into(),
            price: price.parse().unwrap(),
            quantity,
        }
    }

    #[test]
    fn test_total_is_sum_of_subtotals() {
        let contact = ContactForm {
            full_name: Some("Latha".into()),
            email: Some("latha@example.com".into()),
            phone: Some("9840012345".into()),
            address: Some("7 River Street".into()),
            city: Some("Erode".into()),
            postal_code: Some("638001".into()),
            notes: None,
        }
        .validate()
        .unwrap();

        let order = Order {
            id: OrderId::new(1),
            user_id: Some(UserId::new(3)),
            contact,
            status: OrderStatus::Pending,
            payment_method: PaymentMethod::CashOnDelivery,
            payment_status: PaymentStatus::Pending,
            gateway: None,
            items: vec![item("500.00", 2), item("0.10", 3)],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(order.total(), "1000.30".parse::<Decimal>().unwrap());
        assert!(order.is_owned_by(UserId::new(3)));
        assert!(!order.is_owned_by(UserId::new(4)));
        assert_eq!(order.payment_id(), None);
    }
}
