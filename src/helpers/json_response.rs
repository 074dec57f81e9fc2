use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

/// `{"Results": ...}` with the given status.
pub fn results_response<T: Serialize>(status: StatusCode, results: T) -> Response {
    (status, Json(json!({ "Results": results }))).into_response()
}

/// `{"Error": "..."}` with the given status.
pub fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "Error": message }))).into_response()
}
