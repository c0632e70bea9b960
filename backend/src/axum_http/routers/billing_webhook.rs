use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::json;
use subscription_core::domain::repositories::{
    app_users::UserRepository, notifications::SubscriptionNotifier,
    subscriptions::SubscriptionRepository, transactions::TransactionRepository,
};

use crate::usecases::{billing_gateway::BillingGateway, billing_webhook::BillingWebhookUseCase};

pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

pub fn routes<S, T, U, B, N>(usecase: Arc<BillingWebhookUseCase<S, T, U, B, N>>) -> Router
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    B: BillingGateway + 'static,
    N: SubscriptionNotifier + Send + Sync + 'static,
{
    Router::new()
        .route("/webhook", post(receive_event))
        .with_state(usecase)
}

/// The body is taken as raw bytes: the signature covers the exact payload.
pub async fn receive_event<S, T, U, B, N>(
    State(usecase): State<Arc<BillingWebhookUseCase<S, T, U, B, N>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    B: BillingGateway + 'static,
    N: SubscriptionNotifier + Send + Sync + 'static,
{
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match usecase.handle(&body, signature).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "received": true }))).into_response(),
        Err(err) => err.into_response(),
    }
}
