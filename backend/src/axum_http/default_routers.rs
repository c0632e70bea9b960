use axum::{
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use tracing::info;

use crate::axum_http::error_responses::error_response;

pub async fn not_found(uri: Uri) -> Response {
    info!(path = %uri.path(), "backend router: no route matched");
    error_response(StatusCode::NOT_FOUND, "Resource not found")
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
