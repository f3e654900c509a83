use axum::response::IntoResponse;
use http::StatusCode;

/// Liveness probe; the answer source is not consulted
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
