//! Built-in handlers.

use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::http::response;
use crate::http::server::AppState;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `GET /v1/healthcheck`
pub async fn healthcheck(State(state): State<AppState>) -> Response {
    let body = json!({
        "status": "available",
        "system_info": {
            "environment": state.config.listener.environment,
            "version": VERSION,
        },
    });
    (StatusCode::OK, Json(body)).into_response()
}

pub async fn not_found() -> Response {
    response::not_found()
}

pub async fn method_not_allowed(method: Method) -> Response {
    response::method_not_allowed(&method)
}
