use std::fmt;
use std::time::Duration;
use clap::{Parser, ValueEnum};
use crate::http_client::retry_policy::{Backoff, RetryPolicy};

#[derive(Parser, Clone)]
pub struct Config {
    #[clap(env, long, default_value = "development")]
    pub environment: String,

    #[clap(env, long)]
    pub resy_api_key: String,

    #[clap(env, long)]
    pub resy_account_email: String,

    #[clap(env, long)]
    pub resy_account_password: String,

    #[clap(env, long, default_value = "https://staging-api.resy.com")]
    pub resy_base_url: String,

    #[clap(env, long, default_value_t = 3000)]
    pub port: u16,

    /// Comma separated list of origins allowed through CORS
    #[clap(env, long, default_value = "")]
    pub origin_urls: String,

    #[clap(env, long, default_value_t = true, action = clap::ArgAction::Set)]
    pub retries_enabled: bool,

    #[clap(env, long, default_value_t = 10)]
    pub retry_max_attempts: u32,

    #[clap(env, long, default_value_t = 5000)]
    pub retry_backoff_ms: u64,

    #[clap(env, long, value_enum, default_value_t = BackoffKind::Linear)]
    pub retry_backoff: BackoffKind,

    #[clap(env, long, default_value_t = 60_000)]
    pub retry_max_backoff_ms: u64,

    /// Timeout applied to every single upstream attempt
    #[clap(env, long, default_value_t = 10)]
    pub request_timeout_secs: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackoffKind {
    Linear,
    Exponential,
}

impl Config {
    pub fn retry_policy(&self) -> RetryPolicy {
        if !self.retries_enabled {
            return RetryPolicy::disabled();
        }

        let backoff = match self.retry_backoff {
            BackoffKind::Linear => Backoff::Linear,
            BackoffKind::Exponential => Backoff::Exponential,
        };

        RetryPolicy::new(self.retry_max_attempts, self.retry_backoff_ms)
            .with_backoff(backoff)
            .with_max_backoff(Duration::from_millis(self.retry_max_backoff_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// Credentials stay out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("environment", &self.environment)
            .field("resy_base_url", &self.resy_base_url)
            .field("port", &self.port)
            .field("origin_urls", &self.origin_urls)
            .field("retries_enabled", &self.retries_enabled)
            .field("retry_max_attempts", &self.retry_max_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("retry_backoff", &self.retry_backoff)
            .field("retry_max_backoff_ms", &self.retry_max_backoff_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish_non_exhaustive()
    }
}
