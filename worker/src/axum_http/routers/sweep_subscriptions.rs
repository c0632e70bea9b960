use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::Utc;
use tracing::{error, info};

use crate::usecases::expire_subscriptions::ExpirySweepUseCase;

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT_WORKER/internal/v1/sweep/subscriptions" \
//     -H "Authorization: Bearer $INTERNAL_SWEEP_TOKEN"

#[derive(Clone)]
pub struct SweepRouteState {
    internal_token: Option<Arc<str>>,
    usecase: Arc<ExpirySweepUseCase>,
}

pub fn routes(internal_token: Option<String>, usecase: Arc<ExpirySweepUseCase>) -> Router {
    Router::new()
        .route("/subscriptions", post(sweep_subscriptions))
        .with_state(SweepRouteState {
            internal_token: internal_token.map(Arc::from),
            usecase,
        })
}

pub async fn sweep_subscriptions(
    State(state): State<SweepRouteState>,
    headers: HeaderMap,
) -> Response {
    let Some(expected_token) = state.internal_token.as_deref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "sweep token is not configured",
        )
            .into_response();
    };

    if let Err(status) = authorize_bearer(&headers, expected_token) {
        return (status, "unauthorized").into_response();
    }

    info!("expiry_sweep: manual sweep requested");
    match state.usecase.run(Utc::now()).await {
        Ok(report) => Json(report).into_response(),
        Err(err) => {
            error!(error = ?err, "expiry_sweep: manual sweep failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "sweep failed").into_response()
        }
    }
}

fn authorize_bearer(headers: &HeaderMap, expected_token: &str) -> Result<(), StatusCode> {
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
