// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook routes for Strava events.

use crate::services::{QueueError, VerificationOutcome};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Json, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Body returned for every POST, whatever happens to the event.
pub const EVENT_RECEIVED: &str = "EVENT_RECEIVED";

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook", get(verify).post(handle_event))
}

/// Strava webhook verification query params.
#[derive(Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
}

/// Verification response.
#[derive(Serialize)]
struct VerifyResponse {
    #[serde(rename = "hub.challenge")]
    challenge: String,
}

#[derive(Serialize)]
struct VerifyError {
    error: &'static str,
}

/// Verify webhook subscription (GET).
async fn verify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> Response {
    match state.verifier.verify(
        params.mode.as_deref(),
        params.verify_token.as_deref(),
        params.challenge.as_deref(),
    ) {
        VerificationOutcome::Verified(challenge) => {
            tracing::info!("Webhook subscription verified");
            (StatusCode::OK, Json(VerifyResponse { challenge })).into_response()
        }
        VerificationOutcome::Forbidden => {
            tracing::warn!(
                mode = params.mode.as_deref().unwrap_or(""),
                "Webhook verification failed: invalid token"
            );
            (
                StatusCode::FORBIDDEN,
                Json(VerifyError {
                    error: "VerificationMismatch",
                }),
            )
                .into_response()
        }
        VerificationOutcome::Ignored => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Handle incoming webhook events (POST).
///
/// Strava retries anything that isn't a prompt 200, so this only parses and
/// enqueues; the ride check and enrichment happen on the worker.
async fn handle_event(State(state): State<Arc<AppState>>, body: Bytes) -> (StatusCode, &'static str) {
    let received = (StatusCode::OK, EVENT_RECEIVED);

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "Webhook body is not JSON");
            return received;
        }
    };

    let event = match state.verifier.parse_event(&payload) {
        Ok(e) => e,
        Err(e) => {
            tracing::info!(error = %e, "Ignoring webhook payload");
            return received;
        }
    };

    tracing::info!(
        object_type = ?event.object_type,
        aspect_type = ?event.aspect_type,
        object_id = event.object_id,
        owner_id = event.owner_id,
        "Webhook event received"
    );

    if !state.subscriptions.accepts(event.subscription_id).await {
        let expected_id = state.subscriptions.current().await;
        tracing::warn!(
            received_id = ?event.subscription_id,
            expected_id = ?expected_id,
            "Webhook subscription ID mismatch, skipping"
        );
        return received;
    }

    let activity_id = event.object_id;
    match state.queue.enqueue(event) {
        Ok(()) => {}
        Err(QueueError::Full) => {
            tracing::error!(activity_id, "Enrichment queue full, dropping event");
        }
        Err(QueueError::Closed) => {
            tracing::error!(activity_id, "Enrichment worker stopped, dropping event");
        }
    }

    received
}
