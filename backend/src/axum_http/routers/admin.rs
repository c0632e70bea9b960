use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::post,
};
use subscription_core::domain::repositories::{
    app_users::UserRepository, notifications::SubscriptionNotifier,
    subscriptions::SubscriptionRepository, transactions::TransactionRepository,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    axum_http::error_responses::error_response,
    usecases::{billing_gateway::BillingGateway, subscriptions::SubscriptionUseCase},
};

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT_BACKEND/api/v1/admin/subscriptions/$ID/sync" \
//     -H "Authorization: Bearer $ADMIN_TOKEN"

pub struct AdminRouteState<S, T, U, B, N>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    B: BillingGateway + 'static,
    N: SubscriptionNotifier + Send + Sync + 'static,
{
    usecase: Arc<SubscriptionUseCase<S, T, U, B, N>>,
    admin_token: Option<Arc<str>>,
}

impl<S, T, U, B, N> Clone for AdminRouteState<S, T, U, B, N>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    B: BillingGateway + 'static,
    N: SubscriptionNotifier + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            usecase: Arc::clone(&self.usecase),
            admin_token: self.admin_token.clone(),
        }
    }
}

pub fn routes<S, T, U, B, N>(
    usecase: Arc<SubscriptionUseCase<S, T, U, B, N>>,
    admin_token: Option<String>,
) -> Router
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    B: BillingGateway + 'static,
    N: SubscriptionNotifier + Send + Sync + 'static,
{
    Router::new()
        .route("/subscriptions/:id/sync", post(sync_subscription))
        .with_state(AdminRouteState {
            usecase,
            admin_token: admin_token.map(Arc::from),
        })
}

pub async fn sync_subscription<S, T, U, B, N>(
    State(state): State<AdminRouteState<S, T, U, B, N>>,
    headers: HeaderMap,
    Path(subscription_id): Path<Uuid>,
) -> Response
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    B: BillingGateway + 'static,
    N: SubscriptionNotifier + Send + Sync + 'static,
{
    let Some(expected_token) = state.admin_token.as_deref() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "admin token is not configured",
        );
    };

    if let Err(status) = authorize_bearer(&headers, expected_token) {
        warn!(%subscription_id, "admin: rejected sync request");
        return error_response(status, "unauthorized");
    }

    info!(%subscription_id, "admin: subscription sync requested");
    match state.usecase.sync_subscription(subscription_id).await {
        Ok(status) => Json(status).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) fn authorize_bearer(headers: &HeaderMap, expected_token: &str) -> Result<(), StatusCode> {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if token == expected_token {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}
