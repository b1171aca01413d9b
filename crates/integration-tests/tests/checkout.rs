//! Checkout and payment reconciliation scenarios.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use rust_decimal::Decimal;

use kec_core::{Cart, OrderStatus, PaymentMethod, PaymentStatus};
use kec_integration_tests::{Shopfront, contact_form, noon};
use kec_storefront::models::OrderDraft;
use kec_storefront::services::cart::CartService;
use kec_storefront::services::checkout::{CheckoutError, CheckoutOutcome};
use kec_storefront::services::orders::OrderLedger;
use kec_storefront::services::payments::{GatewayError, PaymentIntent};
use kec_storefront::testing::MemoryShop;

async fn start_online(s: &Shopfront) -> PaymentIntent {
    let outcome = s
        .checkout()
        .submit(&s.customer, &contact_form(), None, PaymentMethod::Online, noon())
        .await
        .unwrap();
    match outcome {
        CheckoutOutcome::AwaitingPayment(intent) => intent,
        CheckoutOutcome::Placed(order) => panic!("order {} placed without payment", order.id),
    }
}

#[tokio::test]
async fn test_cash_checkout_scenario() {
    let s = Shopfront::new();
    let pump = s.shop.add_product("Openwell Pump", "500.00", 5);
    CartService::new(&s.shop, &s.carts).add(pump, 2).await.unwrap();

    let outcome = s
        .checkout()
        .submit(&s.customer, &contact_form(), None, PaymentMethod::CashOnDelivery, noon())
        .await
        .unwrap();
    let CheckoutOutcome::Placed(order) = outcome else {
        panic!("cash checkout must place the order");
    };

    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].quantity, 2);
    assert_eq!(order.items[0].price, Decimal::new(50_000, 2));
    assert_eq!(order.total(), Decimal::new(100_000, 2));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(s.shop.stock(pump), Some(3));
    assert!(s.carts.cart().is_empty());
    assert_eq!(s.shop.order_count(), 1);
}

#[tokio::test]
async fn test_online_payment_end_to_end() {
    let s = Shopfront::new();
    let pump = s.shop.add_product("Openwell Pump", "1250.75", 4);
    s.carts.set_cart([(pump, 2)]);

    let intent = start_online(&s).await;
    assert_eq!(intent.amount, 250_150);
    assert_eq!(intent.currency, "INR");
    assert_eq!(s.shop.order_count(), 0);
    assert!(s.carts.snapshot().is_some());

    let callback = Shopfront::signed_callback(&intent.gateway_order_id, "pay_E2E1");
    let order = s
        .checkout()
        .confirm_payment(&s.customer, &callback, noon())
        .await
        .unwrap();

    assert_eq!(order.payment_method, PaymentMethod::Online);
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.payment_id(), Some("pay_E2E1"));
    assert_eq!(order.contact.city, "Kochi");
    assert_eq!(s.shop.stock(pump), Some(2));
    assert!(s.carts.cart().is_empty());
    assert!(s.carts.snapshot().is_none());
    assert_eq!(s.receipts.orders(), vec![order.id]);
}

#[tokio::test]
async fn test_replayed_callback_creates_one_order() {
    let s = Shopfront::new();
    let pump = s.shop.add_product("Openwell Pump", "500.00", 5);
    s.carts.set_cart([(pump, 1)]);

    let intent = start_online(&s).await;
    let callback = Shopfront::signed_callback(&intent.gateway_order_id, "pay_R1");

    let first = s
        .checkout()
        .confirm_payment(&s.customer, &callback, noon())
        .await
        .unwrap();
    let second = s
        .checkout()
        .confirm_payment(&s.customer, &callback, noon())
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(s.shop.order_count(), 1);
    assert_eq!(s.shop.stock(pump), Some(4));
    assert_eq!(s.receipts.orders().len(), 1);
}

#[tokio::test]
async fn test_invalid_signature_changes_nothing() {
    let s = Shopfront::new();
    let pump = s.shop.add_product("Openwell Pump", "500.00", 5);
    s.carts.set_cart([(pump, 2)]);

    let intent = start_online(&s).await;
    let mut callback = Shopfront::signed_callback(&intent.gateway_order_id, "pay_BAD");
    callback.signature = "0".repeat(64);

    let err = s
        .checkout()
        .confirm_payment(&s.customer, &callback, noon())
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::Gateway(GatewayError::InvalidSignature)));
    assert_eq!(s.shop.order_count(), 0);
    assert_eq!(s.carts.cart().quantity(pump), Some(2));
    assert!(s.carts.snapshot().is_some());
    assert_eq!(s.shop.stock(pump), Some(5));
}

#[tokio::test]
async fn test_concurrent_commits_never_take_stock_below_zero() {
    let shop = Arc::new(MemoryShop::new());
    let user = shop.add_user("bulk@example.com");
    let pump = shop.add_product("Openwell Pump", "500.00", 5);
    let contact = contact_form().validate().unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let shop = Arc::clone(&shop);
        let draft = OrderDraft::cash_on_delivery(Some(user), contact.clone());
        tasks.push(tokio::spawn(async move {
            let cart: Cart = [(pump, 2)].into_iter().collect();
            shop.commit(&draft, &cart).await.map(|order| order.id)
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(shop.order_count(), 8);
    assert_eq!(shop.stock(pump), Some(0));
}
