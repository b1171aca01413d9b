//! Password reset across request, verify and consume.

#![allow(clippy::unwrap_used)]

use chrono::Duration;

use kec_integration_tests::{CUSTOMER, Shopfront, noon};
use kec_storefront::services::auth::AuthError;
use kec_storefront::services::password_reset::PasswordResetService;

async fn issue_code(s: &Shopfront) -> String {
    PasswordResetService::new(&s.shop, &s.mailer)
        .request_reset(CUSTOMER, noon())
        .await
        .unwrap();
    s.mailer.codes().last().unwrap().1.clone()
}

#[tokio::test]
async fn test_token_is_consumed_exactly_once() {
    let s = Shopfront::new();
    let code = issue_code(&s).await;
    let resets = PasswordResetService::new(&s.shop, &s.mailer);

    let token = resets.verify(CUSTOMER, &code, noon()).await.unwrap();
    resets.consume(token, "fresh-password-1").await.unwrap();

    let err = resets.consume(token, "fresh-password-2").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidToken));
}

#[tokio::test]
async fn test_expiry_is_decided_at_verify() {
    let s = Shopfront::new();
    let resets = PasswordResetService::new(&s.shop, &s.mailer);

    let code = issue_code(&s).await;
    let at = noon() + Duration::minutes(9) + Duration::seconds(59);
    let token = resets.verify(CUSTOMER, &code, at).await.unwrap();
    // Consumed well past the window: still accepted.
    resets.consume(token, "fresh-password-1").await.unwrap();

    let code = issue_code(&s).await;
    let at = noon() + Duration::minutes(10) + Duration::seconds(1);
    let err = resets.verify(CUSTOMER, &code, at).await.unwrap_err();
    assert!(matches!(err, AuthError::CodeExpired));
}

#[tokio::test]
async fn test_unknown_email_is_reported() {
    let s = Shopfront::new();
    let err = PasswordResetService::new(&s.shop, &s.mailer)
        .request_reset("stranger@example.com", noon())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UserNotFound));
    assert_eq!(s.mailer.attempts(), 0);
}
