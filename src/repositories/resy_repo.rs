use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Response;
use serde::de::DeserializeOwned;
use tracing::{info, warn};
use crate::config::Config;
use crate::errors::{HttpClientError, ReservationError};
use crate::http_client::retry_policy::{connect_only_predicate, RetryPredicate};
use crate::http_client::{Payload, RetryingClient};
use crate::models::reservation::{format_day, BookingRequest, ReservationQuery};
use crate::models::resy::{AuthResponse, DetailsResponse, FindResponse};

const AUTH_PATH: &str = "3/auth/mobile";
const FIND_PATH: &str = "4/find";
const DETAILS_PATH: &str = "3/details";
const BOOK_PATH: &str = "3/book";

const RESY_AUTH_TOKEN: &str = "x-resy-auth-token";

/// Client for the Resy reservation API.
///
/// Search and detail lookups only need the API key. Booking additionally
/// needs a user auth token, which is fetched fresh for every booking and
/// dropped once the booking call returns.
pub struct ResyRepo {
    http: RetryingClient,
    booking_predicate: RetryPredicate,
    base_url: String,
    api_key: String,
    email: String,
    password: String,
}

impl ResyRepo {
    pub fn new(
        http: RetryingClient,
        base_url: &str,
        api_key: &str,
        email: &str,
        password: &str,
    ) -> Self {
        Self {
            http,
            booking_predicate: connect_only_predicate(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, HttpClientError> {
        let http = RetryingClient::new(config.retry_policy(), config.request_timeout())?;
        Ok(Self::new(
            http,
            &config.resy_base_url,
            &config.resy_api_key,
            &config.resy_account_email,
            &config.resy_account_password,
        ))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn header_value(value: &str) -> Result<HeaderValue, ReservationError> {
        HeaderValue::from_str(value).map_err(|e| ReservationError::InvalidHeader(e.to_string()))
    }

    /// Headers for read only calls.
    fn browse_headers(&self) -> Result<HeaderMap, ReservationError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            Self::header_value(&format!("ResyAPI api_key=\"{}\"", self.api_key))?,
        );
        Ok(headers)
    }

    /// Headers for the booking commit, carrying the user's session.
    fn transact_headers(&self, auth_token: &str) -> Result<HeaderMap, ReservationError> {
        let mut headers = self.browse_headers()?;
        headers.insert(HeaderName::from_static(RESY_AUTH_TOKEN), Self::header_value(auth_token)?);
        Ok(headers)
    }

    async fn decode<T: DeserializeOwned>(
        endpoint: &'static str,
        response: Response,
    ) -> Result<T, ReservationError> {
        response
            .json::<T>()
            .await
            .map_err(|source| ReservationError::Decode { endpoint, source })
    }

    /// Lists the config ids of every open slot, in the order the API gives them.
    pub async fn find_table(
        &self,
        query: &ReservationQuery,
    ) -> Result<Vec<String>, ReservationError> {
        let params = Payload::Query(vec![
            ("venue_id".to_string(), query.venue_id.to_string()),
            ("num_people".to_string(), query.num_people.to_string()),
            ("day".to_string(), format_day(query.date)),
        ]);
        let headers = self.browse_headers()?;
        let response = self.http
            .get(&self.endpoint(FIND_PATH), Some(&headers), &params)
            .await?;

        if !response.status().is_success() {
            return Err(ReservationError::UnexpectedStatus {
                endpoint: FIND_PATH,
                status: response.status(),
            });
        }

        let availabilities: FindResponse = Self::decode(FIND_PATH, response).await?;
        let slots = availabilities.slots.ok_or(ReservationError::Lookup("slots"))?;

        Ok(slots.into_iter().map(|slot| slot.config).collect())
    }

    /// Books a config slot. `Ok(false)` means the API turned the booking
    /// down; errors mean the workflow could not get that far.
    pub async fn make_reservation(
        &self,
        booking: &BookingRequest,
    ) -> Result<bool, ReservationError> {
        let book_token = self.get_book_token(booking).await?;
        let auth_token = self.get_auth_token().await?;
        self.confirm_booking(&book_token, &auth_token).await
    }

    async fn get_book_token(
        &self,
        booking: &BookingRequest,
    ) -> Result<String, ReservationError> {
        let params = Payload::Query(vec![
            ("config_id".to_string(), booking.config_id.clone()),
            ("num_people".to_string(), booking.num_people.to_string()),
            ("day".to_string(), format_day(booking.date)),
        ]);
        let headers = self.browse_headers()?;
        let response = self.http
            .get(&self.endpoint(DETAILS_PATH), Some(&headers), &params)
            .await?;

        if !response.status().is_success() {
            return Err(ReservationError::UnexpectedStatus {
                endpoint: DETAILS_PATH,
                status: response.status(),
            });
        }

        let details: DetailsResponse = Self::decode(DETAILS_PATH, response).await?;
        details.book_token
            .and_then(|token| token.value)
            .filter(|value| !value.is_empty())
            .ok_or(ReservationError::Lookup("book_token"))
    }

    async fn get_auth_token(&self) -> Result<String, ReservationError> {
        let body = Payload::Form(vec![
            ("email".to_string(), self.email.clone()),
            ("password".to_string(), self.password.clone()),
        ]);
        let headers = self.browse_headers()?;
        let response = self.http
            .post(&self.endpoint(AUTH_PATH), Some(&headers), &body)
            .await?;

        if !response.status().is_success() {
            warn!("Authentication was rejected with status {}", response.status());
            return Err(ReservationError::Auth);
        }

        let auth: AuthResponse = Self::decode(AUTH_PATH, response).await?;
        auth.token
            .filter(|token| !token.is_empty())
            .ok_or(ReservationError::Auth)
    }

    // Resent only when the request never reached the upstream.
    async fn confirm_booking(
        &self,
        book_token: &str,
        auth_token: &str,
    ) -> Result<bool, ReservationError> {
        let body = Payload::Form(vec![("book_token".to_string(), book_token.to_string())]);
        let headers = self.transact_headers(auth_token)?;
        let response = self.http
            .send_with_predicate(
                reqwest::Method::POST,
                &self.endpoint(BOOK_PATH),
                Some(&headers),
                &body,
                &self.booking_predicate,
            )
            .await?;

        let status = response.status();
        if status.is_success() {
            info!("Booking confirmed");
            Ok(true)
        } else {
            warn!("Booking was declined with status {}", status);
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use serde_json::json;
    use time::macros::date;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use crate::http_client::retry_policy::RetryPolicy;
    use super::*;

    const API_AUTH: &str = "ResyAPI api_key=\"test-key\"";

    fn repo(server: &MockServer) -> ResyRepo {
        repo_with_timeout(server, Duration::from_secs(5))
    }

    fn repo_with_timeout(server: &MockServer, timeout: Duration) -> ResyRepo {
        let http = RetryingClient::new(RetryPolicy::new(3, 0), timeout).unwrap();
        ResyRepo::new(http, &server.uri(), "test-key", "me@example.com", "hunter2")
    }

    fn booking() -> BookingRequest {
        BookingRequest {
            config_id: "rgs://resy/2042632/108580/2/2024-06-23/2024-06-23/18:00:00/2/Dining%20Room".to_string(),
            num_people: 2,
            date: date!(2024 - 06 - 23),
        }
    }

    async fn mount_details(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/3/details"))
            .and(header("authorization", API_AUTH))
            .and(query_param("num_people", "2"))
            .and(query_param("day", "2024-06-23"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn mount_auth(server: &MockServer, body: serde_json::Value, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/3/auth/mobile"))
            .and(header("authorization", API_AUTH))
            .and(body_string_contains("email=me%40example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn find_table_keeps_upstream_slot_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/4/find"))
            .and(header("authorization", API_AUTH))
            .and(query_param("venue_id", "2042632"))
            .and(query_param("num_people", "2"))
            .and(query_param("day", "2024-06-23"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "slots": [
                    {"config": "slot-c", "time": "21:00"},
                    {"config": "slot-a"},
                    {"config": "slot-b"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let query = ReservationQuery { venue_id: 2042632, num_people: 2, date: date!(2024 - 06 - 23) };
        let configs = repo(&server).find_table(&query).await.unwrap();

        assert_eq!(configs, vec!["slot-c", "slot-a", "slot-b"]);
        server.verify().await;
    }

    #[tokio::test]
    async fn find_table_with_no_slots_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/4/find"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"slots": []})))
            .mount(&server)
            .await;

        let query = ReservationQuery { venue_id: 1, num_people: 4, date: date!(2024 - 06 - 23) };
        assert!(repo(&server).find_table(&query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn find_table_without_slots_field_is_a_lookup_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/4/find"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": {}})))
            .mount(&server)
            .await;

        let query = ReservationQuery { venue_id: 1, num_people: 4, date: date!(2024 - 06 - 23) };
        let err = repo(&server).find_table(&query).await.unwrap_err();
        assert!(matches!(err, ReservationError::Lookup("slots")));
    }

    #[tokio::test]
    async fn make_reservation_books_with_both_tokens() {
        let server = MockServer::start().await;
        mount_details(&server, json!({"book_token": {"value": "book-123"}})).await;
        mount_auth(&server, json!({"token": "auth-456"}), 1).await;
        Mock::given(method("POST"))
            .and(path("/3/book"))
            .and(header("authorization", API_AUTH))
            .and(header("x-resy-auth-token", "auth-456"))
            .and(body_string_contains("book_token=book-123"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        assert!(repo(&server).make_reservation(&booking()).await.unwrap());
        server.verify().await;
    }

    #[tokio::test]
    async fn declined_booking_is_false_not_an_error() {
        let server = MockServer::start().await;
        mount_details(&server, json!({"book_token": {"value": "book-123"}})).await;
        mount_auth(&server, json!({"token": "auth-456"}), 1).await;
        Mock::given(method("POST"))
            .and(path("/3/book"))
            .respond_with(ResponseTemplate::new(412))
            .expect(1)
            .mount(&server)
            .await;

        assert!(!repo(&server).make_reservation(&booking()).await.unwrap());
        server.verify().await;
    }

    #[tokio::test]
    async fn booking_is_not_resent_on_server_errors() {
        let server = MockServer::start().await;
        mount_details(&server, json!({"book_token": {"value": "book-123"}})).await;
        mount_auth(&server, json!({"token": "auth-456"}), 1).await;
        Mock::given(method("POST"))
            .and(path("/3/book"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        assert!(!repo(&server).make_reservation(&booking()).await.unwrap());
        server.verify().await;
    }

    #[tokio::test]
    async fn missing_auth_token_fails_before_booking() {
        let server = MockServer::start().await;
        mount_details(&server, json!({"book_token": {"value": "book-123"}})).await;
        mount_auth(&server, json!({}), 1).await;
        Mock::given(method("POST"))
            .and(path("/3/book"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let err = repo(&server).make_reservation(&booking()).await.unwrap_err();
        assert!(matches!(err, ReservationError::Auth));
        server.verify().await;
    }

    #[tokio::test]
    async fn rejected_credentials_are_an_auth_error() {
        let server = MockServer::start().await;
        mount_details(&server, json!({"book_token": {"value": "book-123"}})).await;
        Mock::given(method("POST"))
            .and(path("/3/auth/mobile"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let err = repo(&server).make_reservation(&booking()).await.unwrap_err();
        assert!(matches!(err, ReservationError::Auth));
        server.verify().await;
    }

    #[tokio::test]
    async fn missing_book_token_stops_the_workflow() {
        let server = MockServer::start().await;
        mount_details(&server, json!({"config": {}})).await;
        mount_auth(&server, json!({"token": "auth-456"}), 0).await;

        let err = repo(&server).make_reservation(&booking()).await.unwrap_err();
        assert!(matches!(err, ReservationError::Lookup("book_token")));
        server.verify().await;
    }

    #[tokio::test]
    async fn auth_token_is_fetched_for_every_booking() {
        let server = MockServer::start().await;
        mount_details(&server, json!({"book_token": {"value": "book-123"}})).await;
        mount_auth(&server, json!({"token": "auth-456"}), 2).await;
        Mock::given(method("POST"))
            .and(path("/3/book"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let repo = repo(&server);
        assert!(repo.make_reservation(&booking()).await.unwrap());
        assert!(repo.make_reservation(&booking()).await.unwrap());
        server.verify().await;
    }

    #[tokio::test]
    async fn exhausted_lookup_propagates_as_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3/details"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let err = repo(&server).make_reservation(&booking()).await.unwrap_err();
        assert!(matches!(err, ReservationError::Http(HttpClientError::Exhausted { attempts: 3, .. })));
        server.verify().await;
    }

    #[tokio::test]
    async fn timed_out_booking_is_not_resent() {
        let server = MockServer::start().await;
        mount_details(&server, json!({"book_token": {"value": "book-123"}})).await;
        mount_auth(&server, json!({"token": "auth-456"}), 1).await;
        Mock::given(method("POST"))
            .and(path("/3/book"))
            .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_millis(500)))
            .expect(1)
            .mount(&server)
            .await;

        let err = repo_with_timeout(&server, Duration::from_millis(100))
            .make_reservation(&booking())
            .await
            .unwrap_err();

        match err {
            ReservationError::Http(HttpClientError::Transport { source, .. }) => assert!(source.is_timeout()),
            other => panic!("unexpected error: {other:?}"),
        }
        server.verify().await;
    }

    #[tokio::test]
    async fn unusable_api_key_fails_before_any_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"slots": []})))
            .expect(0)
            .mount(&server)
            .await;

        let http = RetryingClient::new(RetryPolicy::new(3, 0), Duration::from_secs(5)).unwrap();
        let repo = ResyRepo::new(http, &server.uri(), "bad\nkey", "me@example.com", "hunter2");
        let query = ReservationQuery { venue_id: 1, num_people: 2, date: date!(2024 - 06 - 23) };

        let err = repo.find_table(&query).await.unwrap_err();
        assert!(matches!(err, ReservationError::InvalidHeader(_)));
        server.verify().await;
    }
}
