//! Router-level checks that need no database.

#![allow(clippy::unwrap_used)]

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use kec_storefront::app;
use kec_storefront::middleware::session::{SESSION_COOKIE_NAME, session_layer};
use kec_storefront::testing::test_state;

fn router() -> axum::Router {
    app(test_state(), session_layer(MemoryStore::default(), false))
}

#[tokio::test]
async fn test_liveness() {
    let response = router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn test_order_lookup_requires_login() {
    let response = router()
        .oneshot(
            Request::get("/orders/1")
                .header(header::ACCEPT, "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_reset_confirm_rejects_malformed_token() {
    let response = router()
        .oneshot(
            Request::post("/password-reset/confirm")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"token":"not-a-uuid","password":"long-enough-1"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Invalid token");
}

#[tokio::test]
async fn test_cart_view_sets_no_cookie_for_untouched_session() {
    let response = router()
        .oneshot(Request::get("/cart").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookies: Vec<_> = response.headers().get_all(header::SET_COOKIE).iter().collect();
    assert!(
        cookies
            .iter()
            .all(|c| !c.to_str().unwrap().starts_with(SESSION_COOKIE_NAME))
    );
}
