use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::Date;

/// Availability search for one venue on one day.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ReservationQuery {
    pub venue_id: i64,
    pub num_people: u32,
    pub date: Date,
}

/// Booking attempt for a config slot previously returned by a search.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BookingRequest {
    pub config_id: String,
    pub num_people: u32,
    pub date: Date,
}

/// Renders a date the way the upstream `day` parameter expects it.
pub fn format_day(date: Date) -> String {
    let format = format_description!("[year]-[month]-[day]");
    date.format(&format).unwrap_or_else(|_| date.to_string())
}

pub fn parse_day(raw: &str) -> Option<Date> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(raw, &format).ok()
}
