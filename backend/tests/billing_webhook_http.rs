mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use backend::axum_http::routers::billing_webhook::{SIGNATURE_HEADER, routes};
use common::{Harness, sign};
use serde_json::json;
use subscription_core::domain::value_objects::enums::user_roles::UserRole;
use tower::ServiceExt;

fn webhook_request(body: &str, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn forged_signature_is_rejected_without_state_change() {
    let h = Harness::new();
    let vendor = h.store.add_user("vendor@example.test", UserRole::Vendor);
    let session = h
        .subscriptions
        .subscribe(&vendor, Some("PLN_vendor_pro"))
        .await
        .unwrap();
    let body = json!({
        "event": "charge.success",
        "data": { "metadata": { "transactionId": session.transaction_id.to_string() } }
    })
    .to_string();

    let app = routes(Arc::clone(&h.webhooks));
    let forged = app
        .clone()
        .oneshot(webhook_request(&body, Some(&"ab".repeat(64))))
        .await
        .unwrap();
    let unsigned = app.oneshot(webhook_request(&body, None)).await.unwrap();

    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);
    assert!(!h.store.subscription(session.subscription_id).active);
    assert_eq!(h.billing.created_subscriptions(), 0);
}

#[tokio::test]
async fn signed_event_is_acknowledged_and_applied() {
    let h = Harness::new();
    let vendor = h.store.add_user("vendor@example.test", UserRole::Vendor);
    let session = h
        .subscriptions
        .subscribe(&vendor, Some("PLN_vendor_pro"))
        .await
        .unwrap();
    let body = json!({
        "event": "charge.success",
        "data": {
            "fees": 7500,
            "metadata": { "transactionId": session.transaction_id.to_string() }
        }
    })
    .to_string();
    let signature = sign(body.as_bytes());

    let response = routes(Arc::clone(&h.webhooks))
        .oneshot(webhook_request(&body, Some(&signature)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(h.store.subscription(session.subscription_id).is_live());
}

#[tokio::test]
async fn signed_event_for_unknown_subscription_is_still_acknowledged() {
    let h = Harness::new();
    let body = json!({
        "event": "subscription.disable",
        "data": { "subscription_code": "SUB_unknown" }
    })
    .to_string();
    let signature = sign(body.as_bytes());

    let response = routes(Arc::clone(&h.webhooks))
        .oneshot(webhook_request(&body, Some(&signature)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
