use std::collections::HashMap;
use std::sync::Arc;
use axum::body::Bytes;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Router};
use serde_json::{Map, Value};
use tracing::{info, warn};
use crate::controller::AppState;
use crate::errors::ApiError;
use crate::helpers::json_response::results_response;
use crate::models::reservation::{parse_day, BookingRequest, ReservationQuery};
use crate::repositories::resy_repo::ResyRepo;

const FIND_TABLE_PARAMS: [&str; 3] = ["reservation_date", "num_people", "venue_id"];
const MAKE_RESERVATION_PARAMS: [&str; 3] = ["reservation_date", "num_people", "config_id"];

type Fields = Map<String, Value>;

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/find_table", get(find_table))
        .route("/make_reservation", post(make_reservation))
        .route_layer(Extension(app_state.resy_repo))
}

pub async fn find_table(
    Extension(resy_repo): Extension<Arc<ResyRepo>>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> impl IntoResponse {
    let reservation_query = match collect_fields(query, &body).and_then(|fields| to_reservation_query(&fields)) {
        Ok(reservation_query) => reservation_query,
        Err(e) => return e.into_response(),
    };

    return match resy_repo.find_table(&reservation_query).await {
        Ok(tables) => {
            info!("Found {} open slot(s) for venue {}", tables.len(), reservation_query.venue_id);
            results_response(StatusCode::OK, tables)
        }
        Err(e) => {
            warn!("Something went wrong finding tables for venue {} due to: {}", reservation_query.venue_id, e);
            ApiError::from(e).into_response()
        }
    };
}

pub async fn make_reservation(
    Extension(resy_repo): Extension<Arc<ResyRepo>>,
    body: Bytes,
) -> impl IntoResponse {
    let booking = match collect_fields(HashMap::new(), &body).and_then(|fields| to_booking_request(&fields)) {
        Ok(booking) => booking,
        Err(e) => return e.into_response(),
    };

    return match resy_repo.make_reservation(&booking).await {
        Ok(successful) => results_response(StatusCode::OK, successful),
        Err(e) => {
            warn!("Something went wrong making a reservation due to: {}", e);
            ApiError::from(e).into_response()
        }
    };
}

/// Merges query string parameters with a JSON object body. Body fields win.
fn collect_fields(
    query: HashMap<String, String>,
    body: &[u8],
) -> Result<Fields, ApiError> {
    let mut fields: Fields = query
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();

    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(fields);
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => {
            fields.extend(map);
            Ok(fields)
        }
        Ok(Value::Null) => Ok(fields),
        _ => Err(ApiError::MalformedBody),
    }
}

/// Required fields absent from the request, in the order they were asked for.
pub fn missing_params(fields: &Fields, required: &[&'static str]) -> Vec<&'static str> {
    required
        .iter()
        .copied()
        .filter(|param| fields.get(*param).map_or(true, Value::is_null))
        .collect()
}

fn require(fields: &Fields, required: &[&'static str]) -> Result<(), ApiError> {
    let missing = missing_params(fields, required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::MissingParams { missing })
    }
}

fn to_reservation_query(fields: &Fields) -> Result<ReservationQuery, ApiError> {
    require(fields, &FIND_TABLE_PARAMS)?;
    Ok(ReservationQuery {
        venue_id: integer_field(fields, "venue_id")?,
        num_people: party_size(fields)?,
        date: date_field(fields)?,
    })
}

fn to_booking_request(fields: &Fields) -> Result<BookingRequest, ApiError> {
    require(fields, &MAKE_RESERVATION_PARAMS)?;
    let config_id = match fields.get("config_id") {
        Some(Value::String(config_id)) if !config_id.is_empty() => config_id.clone(),
        _ => return Err(ApiError::InvalidField("config_id")),
    };

    Ok(BookingRequest {
        config_id,
        num_people: party_size(fields)?,
        date: date_field(fields)?,
    })
}

fn integer_field(fields: &Fields, name: &'static str) -> Result<i64, ApiError> {
    let value = match fields.get(name) {
        Some(Value::Number(number)) => number.as_i64(),
        Some(Value::String(raw)) => raw.trim().parse().ok(),
        _ => None,
    };
    value.ok_or(ApiError::InvalidField(name))
}

fn party_size(fields: &Fields) -> Result<u32, ApiError> {
    let num_people = integer_field(fields, "num_people")?;
    u32::try_from(num_people)
        .ok()
        .filter(|size| *size > 0)
        .ok_or(ApiError::InvalidField("num_people"))
}

fn date_field(fields: &Fields) -> Result<time::Date, ApiError> {
    fields
        .get("reservation_date")
        .and_then(Value::as_str)
        .and_then(parse_day)
        .ok_or(ApiError::InvalidField("reservation_date"))
}
