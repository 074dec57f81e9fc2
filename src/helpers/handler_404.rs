use axum::http::StatusCode;
use axum::response::IntoResponse;
use crate::helpers::json_response::error_response;

pub async fn page_not_found_handler() -> impl IntoResponse {
    error_response(StatusCode::NOT_FOUND, "Oops looks like you landed at the wrong endpoint")
}
