use std::time::Duration;
use reqwest::header::HeaderMap;
use reqwest::{Method, RequestBuilder, Response, Url};
use serde_json::Value;
use tracing::{debug, error, warn};
use crate::errors::HttpClientError;
use crate::http_client::retry_policy::{default_predicate, RetryCandidate, RetryPolicy, RetryPredicate};

pub mod retry_policy;

/// Body or query string carried by a request. Kept owned so the request
/// can be rebuilt for every attempt.
#[derive(Clone, Debug, Default)]
pub enum Payload {
    #[default]
    Empty,
    Query(Vec<(String, String)>),
    Form(Vec<(String, String)>),
    Json(Value),
}

/// Thin wrapper around `reqwest` that retries transient failures.
#[derive(Clone)]
pub struct RetryingClient {
    client: reqwest::Client,
    policy: RetryPolicy,
    predicate: RetryPredicate,
    default_headers: HeaderMap,
}

impl RetryingClient {
    pub fn new(
        policy: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self, HttpClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpClientError::InvalidRequest {
                url: String::new(),
                message: format!("could not build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            policy,
            predicate: default_predicate(),
            default_headers: HeaderMap::new(),
        })
    }

    pub fn with_predicate(mut self, predicate: RetryPredicate) -> Self {
        self.predicate = predicate;
        self
    }

    /// Headers sent on calls that do not bring their own.
    pub fn with_default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = headers;
        self
    }

    pub async fn send(
        &self,
        method: Method,
        url: &str,
        headers: Option<&HeaderMap>,
        payload: &Payload,
    ) -> Result<Response, HttpClientError> {
        self.send_with_predicate(method, url, headers, payload, &self.predicate).await
    }

    /// Same as [`RetryingClient::send`] but classifies failures with the
    /// given predicate instead of the client wide one.
    pub async fn send_with_predicate(
        &self,
        method: Method,
        url: &str,
        headers: Option<&HeaderMap>,
        payload: &Payload,
        predicate: &RetryPredicate,
    ) -> Result<Response, HttpClientError> {
        let target = Url::parse(url).map_err(|e| HttpClientError::InvalidRequest {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let headers = headers.unwrap_or(&self.default_headers);
        let max_attempts = self.policy.max_attempts();

        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!("Sending {} {} (attempt {}/{})", method, target, attempt, max_attempts);

            let last_failure = match self
                .build(method.clone(), target.clone(), headers, payload)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() || !predicate(&RetryCandidate::Status(status)) {
                        return Ok(response);
                    }
                    format!("status {}", status)
                }
                Err(e) => {
                    if !predicate(&RetryCandidate::Transport(&e)) {
                        return Err(if e.is_builder() {
                            HttpClientError::InvalidRequest {
                                url: url.to_string(),
                                message: e.to_string(),
                            }
                        } else {
                            HttpClientError::Transport { url: url.to_string(), source: e }
                        });
                    }
                    e.to_string()
                }
            };

            if attempt >= max_attempts {
                error!("{} {} failed after {} attempt(s), last failure: {}", method, target, attempt, last_failure);
                return Err(HttpClientError::Exhausted {
                    url: url.to_string(),
                    attempts: attempt,
                    last: last_failure,
                });
            }

            let delay = self.policy.delay_for(attempt);
            warn!("{} {} failed due to: {}, retrying in {:?}", method, target, last_failure, delay);
            tokio::time::sleep(delay).await;
        }
    }

    fn build(
        &self,
        method: Method,
        url: Url,
        headers: &HeaderMap,
        payload: &Payload,
    ) -> RequestBuilder {
        let builder = self.client
            .request(method, url)
            .headers(headers.clone());

        match payload {
            Payload::Empty => builder,
            Payload::Query(params) => builder.query(params),
            Payload::Form(fields) => builder.form(fields),
            Payload::Json(body) => builder.json(body),
        }
    }

    pub async fn get(&self, url: &str, headers: Option<&HeaderMap>, payload: &Payload) -> Result<Response, HttpClientError> {
        self.send(Method::GET, url, headers, payload).await
    }

    pub async fn post(&self, url: &str, headers: Option<&HeaderMap>, payload: &Payload) -> Result<Response, HttpClientError> {
        self.send(Method::POST, url, headers, payload).await
    }

    pub async fn put(&self, url: &str, headers: Option<&HeaderMap>, payload: &Payload) -> Result<Response, HttpClientError> {
        self.send(Method::PUT, url, headers, payload).await
    }

    pub async fn patch(&self, url: &str, headers: Option<&HeaderMap>, payload: &Payload) -> Result<Response, HttpClientError> {
        self.send(Method::PATCH, url, headers, payload).await
    }

    pub async fn delete(&self, url: &str, headers: Option<&HeaderMap>, payload: &Payload) -> Result<Response, HttpClientError> {
        self.send(Method::DELETE, url, headers, payload).await
    }

    pub async fn head(&self, url: &str, headers: Option<&HeaderMap>) -> Result<Response, HttpClientError> {
        self.send(Method::HEAD, url, headers, &Payload::Empty).await
    }

    pub async fn options(&self, url: &str, headers: Option<&HeaderMap>) -> Result<Response, HttpClientError> {
        self.send(Method::OPTIONS, url, headers, &Payload::Empty).await
    }
}
