use axum::{
    Json,
    http::{StatusCode, Uri},
    response::IntoResponse,
};
use serde_json::json;
use tracing::info;

pub async fn not_found(uri: Uri) -> impl IntoResponse {
    info!(path = %uri.path(), "worker router: no route matched");
    (StatusCode::NOT_FOUND, Json(json!({ "code": 404, "message": "Resource not found" })))
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok", "component": "worker" })))
}
