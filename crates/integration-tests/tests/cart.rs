//! Cart behaviour against the in-memory catalog.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;

use kec_core::Adjustment;
use kec_integration_tests::Shopfront;
use kec_storefront::services::cart::{CartService, CartServiceError};

#[tokio::test]
async fn test_materialized_total_follows_current_price() {
    let s = Shopfront::new();
    let pump = s.shop.add_product("Openwell Pump", "500.00", 5);
    let cable = s.shop.add_product("Submersible Cable", "75.50", 40);
    let carts = CartService::new(&s.shop, &s.carts);

    carts.add(pump, 2).await.unwrap();
    carts.add(cable, 3).await.unwrap();
    assert_eq!(carts.view().await.unwrap().total, Decimal::new(122_650, 2));

    s.shop.set_price(pump, Decimal::new(45_000, 2));
    let view = carts.view().await.unwrap();
    assert_eq!(view.total, Decimal::new(112_650, 2));
    assert_eq!(
        view.total,
        view.lines.iter().map(|l| l.product.price * Decimal::from(l.quantity)).sum::<Decimal>()
    );
}

#[tokio::test]
async fn test_add_out_of_stock_leaves_cart_empty() {
    let s = Shopfront::new();
    let sold_out = s.shop.add_product("Borewell Pump", "12500.00", 0);
    let carts = CartService::new(&s.shop, &s.carts);

    let err = carts.add(sold_out, 1).await.unwrap_err();
    assert!(matches!(err, CartServiceError::OutOfStock(_)));
    assert!(s.carts.cart().is_empty());
}

#[tokio::test]
async fn test_quantities_clamp_to_stock() {
    let s = Shopfront::new();
    let pump = s.shop.add_product("Openwell Pump", "500.00", 3);
    let carts = CartService::new(&s.shop, &s.carts);

    assert_eq!(
        carts.add(pump, 2).await.unwrap(),
        Adjustment::Set { quantity: 2, capped: false }
    );
    assert_eq!(
        carts.add(pump, 5).await.unwrap(),
        Adjustment::Set { quantity: 3, capped: true }
    );
    assert_eq!(
        carts.update(pump, 10).await.unwrap(),
        Adjustment::Set { quantity: 3, capped: true }
    );
    assert_eq!(carts.update(pump, 0).await.unwrap(), Adjustment::Removed);
    assert!(s.carts.cart().is_empty());
}

#[tokio::test]
async fn test_deleted_product_is_reported_not_dropped() {
    let s = Shopfront::new();
    let pump = s.shop.add_product("Openwell Pump", "500.00", 3);
    let carts = CartService::new(&s.shop, &s.carts);
    carts.add(pump, 1).await.unwrap();

    s.shop.remove_product(pump);
    let err = carts.view().await.unwrap_err();
    assert!(matches!(err, CartServiceError::ProductNotFound(id) if id == pump));
    assert_eq!(s.carts.cart().quantity(pump), Some(1));
}
