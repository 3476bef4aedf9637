// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup and handed to the components that
//! need it; nothing mutates the process environment afterwards.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Where athlete credentials are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialBackend {
    Firestore,
    Memory,
}

impl FromStr for CredentialBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(Self::Firestore),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::Invalid("CREDENTIAL_BACKEND")),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Public base URL of this service (used for the OAuth redirect)
    pub public_url: String,
    /// Webhook callback URL registered with Strava
    pub callback_url: String,
    /// Frontend URL for post-link redirects
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Known push subscription id, if already registered
    pub strava_subscription_id: Option<u64>,
    /// Re-register the push subscription at startup
    pub register_webhook: bool,
    /// Upper bound on any single call to Strava, Firestore or the dataset
    pub external_call_timeout: Duration,
    /// Enrichment jobs processed concurrently
    pub worker_concurrency: usize,
    /// Jobs buffered between the webhook handler and the worker
    pub queue_capacity: usize,
    /// Attempts per enrichment job (1 = no retry)
    pub enrich_max_attempts: u32,
    /// Base delay between enrichment attempts
    pub enrich_retry_backoff: Duration,
    pub credential_backend: CredentialBackend,
    /// JSON dataset of city distances; Firestore is used when unset
    pub city_dataset_path: Option<String>,

    // --- Secrets ---
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Webhook verification token
    pub webhook_verify_token: String,
    /// HS256 key shared with the account service that issues session tokens
    pub session_signing_key: Vec<u8>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("strava_client_id", &self.strava_client_id)
            .field("public_url", &self.public_url)
            .field("callback_url", &self.callback_url)
            .field("frontend_url", &self.frontend_url)
            .field("gcp_project_id", &self.gcp_project_id)
            .field("port", &self.port)
            .field("strava_subscription_id", &self.strava_subscription_id)
            .field("register_webhook", &self.register_webhook)
            .field("external_call_timeout", &self.external_call_timeout)
            .field("worker_concurrency", &self.worker_concurrency)
            .field("queue_capacity", &self.queue_capacity)
            .field("enrich_max_attempts", &self.enrich_max_attempts)
            .field("enrich_retry_backoff", &self.enrich_retry_backoff)
            .field("credential_backend", &self.credential_backend)
            .field("city_dataset_path", &self.city_dataset_path)
            .field("strava_client_secret", &"<redacted>")
            .field("webhook_verify_token", &"<redacted>")
            .field("session_signing_key", &"<redacted>")
            .finish()
    }
}

impl Config {
    /// Fixed configuration for tests.
    pub fn test_default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            public_url: "http://localhost:8080".to_string(),
            callback_url: "http://localhost:8080/webhook".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            strava_subscription_id: None,
            register_webhook: false,
            external_call_timeout: Duration::from_secs(2),
            worker_concurrency: 4,
            queue_capacity: 16,
            enrich_max_attempts: 1,
            enrich_retry_backoff: Duration::from_millis(10),
            credential_backend: CredentialBackend::Memory,
            city_dataset_path: None,
            strava_client_secret: "test_secret".to_string(),
            webhook_verify_token: "test_verify_token".to_string(),
            session_signing_key: b"test_session_key_32_bytes_min!!!".to_vec(),
        }
    }

    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let public_url = env::var("PUBLIC_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| "http://localhost:8080".to_string());
        let callback_url =
            env::var("CALLBACK_URL").unwrap_or_else(|_| format!("{}/webhook", public_url));

        Ok(Self {
            strava_client_id: required("STRAVA_CLIENT_ID")?,
            public_url,
            callback_url,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: parse_or("PORT", 8080)?,
            strava_subscription_id: parse_optional("STRAVA_SUBSCRIPTION_ID")?,
            register_webhook: parse_or("STRAVA_REGISTER_WEBHOOK", false)?,
            external_call_timeout: Duration::from_secs(parse_or("EXTERNAL_CALL_TIMEOUT_SECS", 10)?),
            worker_concurrency: parse_or("WORKER_CONCURRENCY", 8)?,
            queue_capacity: parse_or("QUEUE_CAPACITY", 256)?,
            enrich_max_attempts: parse_or("ENRICH_MAX_ATTEMPTS", 1)?,
            enrich_retry_backoff: Duration::from_millis(parse_or("ENRICH_RETRY_BACKOFF_MS", 2000)?),
            credential_backend: parse_or("CREDENTIAL_BACKEND", CredentialBackend::Firestore)?,
            city_dataset_path: env::var("CITY_DATASET_PATH").ok(),

            strava_client_secret: required("STRAVA_CLIENT_SECRET")?,
            webhook_verify_token: required("WEBHOOK_VERIFY_TOKEN")?,
            session_signing_key: required("SESSION_SIGNING_KEY")?.into_bytes(),
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

fn parse_optional<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(name)),
        _ => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
