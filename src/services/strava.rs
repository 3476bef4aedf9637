// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for reading activities and writing descriptions.
//!
//! Handles:
//! - Authorization code exchange and token refresh
//! - Activity type and lifetime ride totals
//! - Activity description updates
//! - Push subscription management
//! - Rate limit and expired-token detection

use crate::db::CredentialStore;
use crate::error::AppError;
use crate::models::AthleteCredentials;
use async_trait::async_trait;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const STRAVA_API_BASE: &str = "https://www.strava.com/api/v3";
const STRAVA_OAUTH_BASE: &str = "https://www.strava.com/oauth";

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    api_base: String,
    oauth_base: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials and a per-request timeout.
    pub fn new(client_id: String, client_secret: String, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            http,
            api_base: STRAVA_API_BASE.to_string(),
            oauth_base: STRAVA_OAUTH_BASE.to_string(),
            client_id,
            client_secret,
        }
    }

    /// Point the client at another host (tests, proxies).
    pub fn with_base_urls(mut self, api_base: &str, oauth_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.oauth_base = oauth_base.trim_end_matches('/').to_string();
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Get the sport type of an activity (e.g. "Ride", "Run").
    pub async fn get_activity_type(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<String, AppError> {
        let url = format!("{}/activities/{}", self.api_base, activity_id);
        let activity: StravaActivityType = self.get_json(&url, access_token).await?;

        activity
            .sport_type
            .or(activity.legacy_type)
            .ok_or_else(|| AppError::StravaApi(format!("Activity {} has no type", activity_id)))
    }

    /// Get an athlete's lifetime ride distance in meters.
    pub async fn get_lifetime_ride_distance(
        &self,
        access_token: &str,
        athlete_id: u64,
    ) -> Result<f64, AppError> {
        let url = format!("{}/athletes/{}/stats", self.api_base, athlete_id);
        let stats: AthleteStats = self.get_json(&url, access_token).await?;
        Ok(stats.all_ride_totals.distance)
    }

    /// Replace an activity's description.
    pub async fn update_activity_description(
        &self,
        access_token: &str,
        activity_id: u64,
        description: &str,
    ) -> Result<(), AppError> {
        let url = format!("{}/activities/{}", self.api_base, activity_id);

        let body = serde_json::json!({
            "description": description
        });

        let response = self
            .http
            .put(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        self.check_response(response).await
    }

    /// Refresh an expired access token.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_base))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        self.check_response_json(response).await
    }

    /// Exchange an authorization code for tokens and athlete info.
    pub async fn exchange_code(&self, code: &str) -> Result<StravaTokenExchangeResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_base))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        self.check_response_json(response).await
    }

    // ─── Push Subscriptions ──────────────────────────────────────

    /// List the application's push subscriptions.
    pub async fn list_push_subscriptions(&self) -> Result<Vec<PushSubscription>, AppError> {
        let response = self
            .http
            .get(format!("{}/push_subscriptions", self.api_base))
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        self.check_response_json(response).await
    }

    /// Register a webhook callback. Strava validates it with a GET handshake
    /// before this call returns.
    pub async fn create_push_subscription(
        &self,
        callback_url: &str,
        verify_token: &str,
    ) -> Result<PushSubscription, AppError> {
        let response = self
            .http
            .post(format!("{}/push_subscriptions", self.api_base))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("callback_url", callback_url),
                ("verify_token", verify_token),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        self.check_response_json(response).await
    }

    /// Delete a push subscription.
    pub async fn delete_push_subscription(&self, subscription_id: u64) -> Result<(), AppError> {
        let response = self
            .http
            .delete(format!(
                "{}/push_subscriptions/{}",
                self.api_base, subscription_id
            ))
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        self.check_response(response).await
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport_error)?;

        self.check_response_json(response).await
    }

    /// Check response status and return error if not successful.
    async fn check_response(&self, response: reqwest::Response) -> Result<(), AppError> {
        if response.status().is_success() {
            return Ok(());
        }
        Err(status_error(response).await)
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| AppError::StravaApi(format!("JSON parse error: {}", e)))
    }
}

/// Map a non-2xx Strava response onto an error.
async fn status_error(response: reqwest::Response) -> AppError {
    let status = response.status();

    // Rate limit
    if status.as_u16() == 429 {
        tracing::warn!("Strava rate limit hit (429)");
        return AppError::StravaApi(AppError::STRAVA_RATE_LIMIT.to_string());
    }

    // Unauthorized - token may be expired
    if status.as_u16() == 401 {
        return AppError::StravaApi(AppError::STRAVA_TOKEN_ERROR.to_string());
    }

    let body = response.text().await.unwrap_or_default();

    if status.as_u16() == 404 {
        return AppError::NotFound(format!("Strava resource: {}", body));
    }

    AppError::StravaApi(format!("HTTP {}: {}", status, body))
}

fn transport_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::Timeout("Strava API".to_string())
    } else {
        AppError::StravaApi(format!("Request failed: {}", e))
    }
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Token exchange response from Strava OAuth (includes athlete info).
#[derive(Debug, Clone, Deserialize)]
pub struct StravaTokenExchangeResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub athlete: StravaAthlete,
}

/// Athlete info from OAuth token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthlete {
    pub id: u64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StravaActivityType {
    #[serde(default)]
    sport_type: Option<String>,
    #[serde(rename = "type", default)]
    legacy_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AthleteStats {
    all_ride_totals: ActivityTotal,
}

#[derive(Debug, Deserialize)]
struct ActivityTotal {
    /// Meters
    distance: f64,
}

/// A registered webhook callback.
#[derive(Debug, Clone, Deserialize)]
pub struct PushSubscription {
    pub id: u64,
    #[serde(default)]
    pub callback_url: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// TrackingService - token-managed operations used by the pipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Tokens and athlete identity returned by a successful code exchange.
#[derive(Clone)]
pub struct TokenGrant {
    pub athlete_id: u64,
    pub username: Option<String>,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Operations against the activity-tracking service.
///
/// Implementations refresh expired access tokens themselves, retrying a
/// rejected call once before surfacing the failure. A refresh rotates the
/// tokens in `credentials`, so the caller must hand the same record to its
/// next call.
#[async_trait]
pub trait TrackingService: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AppError>;

    async fn get_activity_type(
        &self,
        credentials: &mut AthleteCredentials,
        activity_id: u64,
    ) -> Result<String, AppError>;

    /// Lifetime ride distance in meters.
    async fn get_lifetime_ride_total(
        &self,
        credentials: &mut AthleteCredentials,
    ) -> Result<f64, AppError>;

    /// Overwrite (never append to) the activity's description.
    async fn update_description(
        &self,
        credentials: &mut AthleteCredentials,
        activity_id: u64,
        description: &str,
    ) -> Result<(), AppError>;
}

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Strava service that owns token rotation and persists rotated tokens.
#[derive(Clone)]
pub struct StravaService {
    client: StravaClient,
    credentials: Arc<dyn CredentialStore>,
}

impl StravaService {
    pub fn new(client: StravaClient, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            client,
            credentials,
        }
    }

    /// Refresh tokens with Strava and store them (last writer wins).
    async fn refresh(&self, credentials: &AthleteCredentials) -> Result<AthleteCredentials, AppError> {
        let athlete_id = credentials.athlete_id;
        let tokens = self.client.refresh_token(&credentials.refresh_token).await?;

        let rotated =
            credentials.with_tokens(tokens.access_token, tokens.refresh_token, tokens.expires_at);

        if let Err(e) = self.credentials.set(athlete_id, &rotated).await {
            tracing::warn!(athlete_id, error = %e, "Failed to store refreshed tokens");
        } else {
            tracing::info!(athlete_id, "Token refreshed and stored");
        }

        Ok(rotated)
    }

    /// Run `call` with a usable access token.
    ///
    /// Refreshes up front if the stored token is about to expire; otherwise a
    /// 401 triggers one refresh and one retry. Rotated tokens replace the
    /// ones in `credentials`.
    async fn authorized<T, F, Fut>(
        &self,
        credentials: &mut AthleteCredentials,
        call: F,
    ) -> Result<T, AppError>
    where
        F: Fn(String) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, AppError>> + Send,
    {
        let athlete_id = credentials.athlete_id;
        let now = chrono::Utc::now().timestamp();

        let refreshed = credentials.expires_within(now, TOKEN_REFRESH_MARGIN_SECS);
        if refreshed {
            tracing::info!(athlete_id, "Access token expired, refreshing");
            *credentials = self.refresh(credentials).await?;
        }

        match call(credentials.access_token.clone()).await {
            Err(e) if e.is_unauthorized_response() && !refreshed => {
                tracing::info!(athlete_id, "Access token rejected, refreshing and retrying");
                *credentials = self.refresh(credentials).await?;
                call(credentials.access_token.clone()).await
            }
            result => result,
        }
    }
}

#[async_trait]
impl TrackingService for StravaService {
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AppError> {
        let response = self.client.exchange_code(code).await?;
        Ok(TokenGrant {
            athlete_id: response.athlete.id,
            username: response.athlete.username,
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: response.expires_at,
        })
    }

    async fn get_activity_type(
        &self,
        credentials: &mut AthleteCredentials,
        activity_id: u64,
    ) -> Result<String, AppError> {
        let client = &self.client;
        self.authorized(credentials, |token| async move {
            client.get_activity_type(&token, activity_id).await
        })
        .await
    }

    async fn get_lifetime_ride_total(
        &self,
        credentials: &mut AthleteCredentials,
    ) -> Result<f64, AppError> {
        let client = &self.client;
        let athlete_id = credentials.athlete_id;
        self.authorized(credentials, |token| async move {
            client.get_lifetime_ride_distance(&token, athlete_id).await
        })
        .await
    }

    async fn update_description(
        &self,
        credentials: &mut AthleteCredentials,
        activity_id: u64,
        description: &str,
    ) -> Result<(), AppError> {
        let client = &self.client;
        self.authorized(credentials, |token| async move {
            client
                .update_activity_description(&token, activity_id, description)
                .await
        })
        .await
    }
}
