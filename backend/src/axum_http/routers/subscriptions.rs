use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use subscription_core::domain::{
    repositories::{
        app_users::UserRepository, notifications::SubscriptionNotifier,
        subscriptions::SubscriptionRepository, transactions::TransactionRepository,
    },
    value_objects::subscriptions::{PaymentCallbackQuery, SubscribeRequest},
};
use tracing::info;

use crate::{
    auth::{AuthUser, UserJwtSecret},
    axum_http::error_responses::error_response,
    usecases::{billing_gateway::BillingGateway, subscriptions::SubscriptionUseCase},
};

pub struct SubscriptionRouteState<S, T, U, B, N>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    B: BillingGateway + 'static,
    N: SubscriptionNotifier + Send + Sync + 'static,
{
    usecase: Arc<SubscriptionUseCase<S, T, U, B, N>>,
    jwt_secret: UserJwtSecret,
}

impl<S, T, U, B, N> Clone for SubscriptionRouteState<S, T, U, B, N>
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
            jwt_secret: self.jwt_secret.clone(),
        }
    }
}

impl<S, T, U, B, N> FromRef<SubscriptionRouteState<S, T, U, B, N>> for UserJwtSecret
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    B: BillingGateway + 'static,
    N: SubscriptionNotifier + Send + Sync + 'static,
{
    fn from_ref(state: &SubscriptionRouteState<S, T, U, B, N>) -> Self {
        state.jwt_secret.clone()
    }
}

pub fn routes<S, T, U, B, N>(
    usecase: Arc<SubscriptionUseCase<S, T, U, B, N>>,
    jwt_secret: UserJwtSecret,
) -> Router
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    B: BillingGateway + 'static,
    N: SubscriptionNotifier + Send + Sync + 'static,
{
    Router::new()
        .route("/plans", get(list_plans))
        .route("/current", get(current_subscription))
        .route("/subscribe", post(subscribe))
        .route("/upgrade", post(upgrade))
        .route("/cancel", post(cancel))
        .route("/reactivate", post(reactivate))
        .route("/callback", get(payment_callback))
        .with_state(SubscriptionRouteState {
            usecase,
            jwt_secret,
        })
}

pub async fn list_plans<S, T, U, B, N>(
    State(state): State<SubscriptionRouteState<S, T, U, B, N>>,
    auth: AuthUser,
) -> Response
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    B: BillingGateway + 'static,
    N: SubscriptionNotifier + Send + Sync + 'static,
{
    match state.usecase.list_plans(auth.role).await {
        Ok(plans) => Json(plans).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn current_subscription<S, T, U, B, N>(
    State(state): State<SubscriptionRouteState<S, T, U, B, N>>,
    AuthUser { user_id, .. }: AuthUser,
) -> Response
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    B: BillingGateway + 'static,
    N: SubscriptionNotifier + Send + Sync + 'static,
{
    match state.usecase.current_subscription(user_id).await {
        Ok(current) => Json(current).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn subscribe<S, T, U, B, N>(
    State(state): State<SubscriptionRouteState<S, T, U, B, N>>,
    auth: AuthUser,
    Json(request): Json<SubscribeRequest>,
) -> Response
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    B: BillingGateway + 'static,
    N: SubscriptionNotifier + Send + Sync + 'static,
{
    match state
        .usecase
        .subscribe(&auth.subscriber(), request.plan_id.as_deref())
        .await
    {
        Ok(session) => Json(session).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn upgrade<S, T, U, B, N>(
    State(state): State<SubscriptionRouteState<S, T, U, B, N>>,
    auth: AuthUser,
    Json(request): Json<SubscribeRequest>,
) -> Response
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    B: BillingGateway + 'static,
    N: SubscriptionNotifier + Send + Sync + 'static,
{
    match state
        .usecase
        .upgrade(&auth.subscriber(), request.plan_id.as_deref())
        .await
    {
        Ok(session) => Json(session).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn cancel<S, T, U, B, N>(
    State(state): State<SubscriptionRouteState<S, T, U, B, N>>,
    AuthUser { user_id, .. }: AuthUser,
) -> Response
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    B: BillingGateway + 'static,
    N: SubscriptionNotifier + Send + Sync + 'static,
{
    info!(%user_id, "subscriptions: cancel request received");
    match state.usecase.cancel(user_id).await {
        Ok(cancellation) => Json(cancellation).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn reactivate<S, T, U, B, N>(
    State(state): State<SubscriptionRouteState<S, T, U, B, N>>,
    auth: AuthUser,
) -> Response
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    B: BillingGateway + 'static,
    N: SubscriptionNotifier + Send + Sync + 'static,
{
    match state.usecase.reactivate(&auth.subscriber()).await {
        Ok(status) => Json(status).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Landing point after the hosted payment page; the payer's browser carries no token.
pub async fn payment_callback<S, T, U, B, N>(
    State(state): State<SubscriptionRouteState<S, T, U, B, N>>,
    Query(query): Query<PaymentCallbackQuery>,
) -> Response
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    B: BillingGateway + 'static,
    N: SubscriptionNotifier + Send + Sync + 'static,
{
    let Some(reference) = query.reference() else {
        return error_response(
            axum::http::StatusCode::BAD_REQUEST,
            "reference is required",
        );
    };

    match state
        .usecase
        .verify_callback(query.subscription_id, reference)
        .await
    {
        Ok(result) => Json(result).into_response(),
        Err(err) => err.into_response(),
    }
}
