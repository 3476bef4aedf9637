// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava account linking (OAuth) routes.
//!
//! Both routes sit behind the session middleware: the signed-in site user
//! is who the Strava athlete gets linked to.

use axum::{
    extract::{Extension, Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::AthleteCredentials;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

const STRAVA_AUTHORIZE_URL: &str = "https://www.strava.com/oauth/authorize";

/// Scopes requested when linking.
pub const REQUESTED_SCOPE: &str = "read,activity:write,activity:read";

/// How long a signed OAuth state stays valid.
const STATE_MAX_AGE_SECS: u64 = 10 * 60;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/strava", get(auth_start))
        .route("/auth/strava/callback", get(auth_callback))
}

/// Start OAuth flow - redirect to Strava authorization.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Redirect> {
    let oauth_state = sign_state(&user.user_id, unix_now()?, &state.config.session_signing_key)?;
    let callback_url = format!("{}/auth/strava/callback", state.config.public_url);

    let auth_url = format!(
        "{}?client_id={}&response_type=code&redirect_uri={}&approval_prompt=force&scope={}&state={}",
        STRAVA_AUTHORIZE_URL,
        urlencoding::encode(&state.config.strava_client_id),
        urlencoding::encode(&callback_url),
        urlencoding::encode(REQUESTED_SCOPE),
        oauth_state
    );

    tracing::info!(
        user_id = %user.user_id,
        "Starting OAuth flow, redirecting to Strava"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange the code and link the athlete to the session user.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    let dashboard = format!("{}/dashboard", state.config.frontend_url);

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Strava");
        let redirect = format!("{}?error={}", dashboard, urlencoding::encode(&error));
        return Ok(Redirect::temporary(&redirect));
    }

    let state_user = params
        .state
        .as_deref()
        .and_then(|s| verify_state(s, &state.config.session_signing_key, unix_now().ok()?));
    if state_user.as_deref() != Some(user.user_id.as_str()) {
        tracing::warn!(user_id = %user.user_id, "Invalid, expired or foreign OAuth state");
        return Err(AppError::BadRequest("invalid OAuth state".to_string()));
    }

    if !has_required_scopes(params.scope.as_deref().unwrap_or("")) {
        tracing::info!(
            user_id = %user.user_id,
            scope = params.scope.as_deref().unwrap_or(""),
            "Insufficient scope granted, restarting authorization"
        );
        return Ok(Redirect::temporary("/auth/strava"));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("missing authorization code".to_string()))?;

    tracing::info!("Exchanging authorization code for tokens");
    let grant = state.strava.exchange_code(&code).await?;

    let credentials = AthleteCredentials {
        athlete_id: grant.athlete_id,
        access_token: grant.access_token,
        refresh_token: grant.refresh_token,
        expires_at: Some(grant.expires_at),
        linked_user_id: user.user_id.clone(),
        username: grant.username,
    };
    state.credentials.set(grant.athlete_id, &credentials).await?;

    tracing::info!(
        athlete_id = grant.athlete_id,
        user_id = %user.user_id,
        "Strava athlete linked"
    );

    Ok(Redirect::temporary(&dashboard))
}

/// Strava returns the granted scopes comma-separated.
fn has_required_scopes(granted: &str) -> bool {
    let scopes: Vec<&str> = granted.split(',').map(str::trim).collect();
    scopes.contains(&"activity:write") && scopes.contains(&"activity:read")
}

fn unix_now() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_secs())
}

/// Sign `user_id|timestamp_hex` and base64 the result for the URL.
fn sign_state(user_id: &str, issued_at: u64, secret: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}", user_id, issued_at);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed.as_bytes()))
}

/// Check the signature and age of an OAuth state; returns the bound user id.
fn verify_state(state: &str, secret: &[u8], now: u64) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Split from the right so a '|' inside the user id survives.
    let mut parts = state_str.rsplitn(3, '|');
    let signature_hex = parts.next()?;
    let timestamp_hex = parts.next()?;
    let user_id = parts.next()?;

    let signature = hex::decode(signature_hex).ok()?;
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(format!("{}|{}", user_id, timestamp_hex).as_bytes());
    if mac.verify_slice(&signature).is_err() {
        tracing::error!("OAuth state signature mismatch");
        return None;
    }

    let issued_at = u64::from_str_radix(timestamp_hex, 16).ok()?;
    if issued_at > now || now - issued_at > STATE_MAX_AGE_SECS {
        return None;
    }

    Some(user_id.to_string())
}
