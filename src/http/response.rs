//! JSON error envelopes.
//!
//! Every error leaves the server as `{"error": <message>}` with a matching
//! status code.

use axum::{
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

/// Build an error response with the standard envelope.
pub fn error_response(status: StatusCode, message: impl Into<Value>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

pub fn server_error() -> Response {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "the server encountered an error and could not process your request",
    )
}

pub fn rate_limit_exceeded() -> Response {
    error_response(StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded")
}

pub fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "the requested resource cannot be found")
}

pub fn method_not_allowed(method: &Method) -> Response {
    error_response(
        StatusCode::METHOD_NOT_ALLOWED,
        format!("method {} is not supported for this resource", method),
    )
}

/// 500 for a request whose handler panicked. The connection is not reused.
pub fn panic_response() -> Response {
    let mut response = server_error();
    response
        .headers_mut()
        .insert(header::CONNECTION, header::HeaderValue::from_static("close"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_rate_limit_envelope() {
        let response = rate_limit_exceeded();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "rate limit exceeded" })
        );
    }

    #[tokio::test]
    async fn test_method_not_allowed_names_method() {
        let response = method_not_allowed(&Method::DELETE);
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            body_json(response).await["error"],
            "method DELETE is not supported for this resource"
        );
    }

    #[test]
    fn test_panic_response_closes_connection() {
        let response = panic_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::CONNECTION], "close");
    }
}
