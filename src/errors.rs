use axum::response::{IntoResponse, Response};
use reqwest::StatusCode;
use thiserror::Error;
use crate::helpers::json_response::error_response;

#[derive(Error, Debug)]
pub enum HttpClientError {
    #[error("Invalid request to {url}: {message}")]
    InvalidRequest { url: String, message: String },

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} gave up after {attempts} attempt(s), last failure: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: String,
    },
}

#[derive(Error, Debug)]
pub enum ReservationError {
    #[error(transparent)]
    Http(#[from] HttpClientError),

    #[error("Could not build request headers: {0}")]
    InvalidHeader(String),

    #[error("No auth token was generated with the provided email and password")]
    Auth,

    #[error("Upstream response is missing {0}")]
    Lookup(&'static str),

    #[error("Could not decode upstream response from {endpoint}: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Upstream {endpoint} answered with {status}")]
    UnexpectedStatus {
        endpoint: &'static str,
        status: StatusCode,
    },
}

/// Failures surfaced by the REST handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Failed to make request due to missing {}", .missing.join(","))]
    MissingParams { missing: Vec<&'static str> },

    #[error("Invalid value for {0}")]
    InvalidField(&'static str),

    #[error("Request body must be a JSON object")]
    MalformedBody,

    #[error(transparent)]
    Upstream(#[from] ReservationError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let upstream = match self {
            ApiError::Upstream(e) => e,
            validation => return error_response(StatusCode::BAD_REQUEST, &validation.to_string()),
        };

        let status = match upstream {
            ReservationError::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error_response(status, "Failed to complete the request with the reservation service, please try again.")
    }
}
