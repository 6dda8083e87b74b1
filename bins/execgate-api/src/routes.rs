use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/execute", post(handlers::execute_code))
        .route("/languages", get(handlers::get_languages))
        .route("/health", get(handlers::health_check))
        .route("/rate-limit", get(handlers::rate_limit_status))
        .layer(cors)
        .layer(CatchPanicLayer::custom(handle_panic))
}

/// Last-resort shaping: a panicking handler still answers with the JSON
/// envelope instead of a dropped connection.
fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> axum::response::Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("panic");
    error!(detail, "Handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "success": false,
            "statusCode": 500,
            "error": "Internal server error",
        })),
    )
        .into_response()
}
