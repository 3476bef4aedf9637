// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod cities;
pub mod enrichment;
pub mod filter;
pub mod queue;
pub mod strava;
pub mod subscription;
pub mod webhook;

pub use cities::{CityDistanceIndex, CityDistanceLookup, DatasetError};
pub use enrichment::{EnrichOutcome, EnrichmentOrchestrator};
pub use filter::{EventFilter, FilterDecision, SkipReason};
pub use queue::{EnrichmentQueue, EnrichmentWorker, JobOutcome, QueueError, RetryPolicy};
pub use strava::{StravaClient, StravaService, TokenGrant, TrackingService};
pub use subscription::SubscriptionManager;
pub use webhook::{VerificationOutcome, WebhookVerifier};

use crate::error::AppError;
use std::future::Future;
use std::time::Duration;

/// HTTP requests one token-managed Strava call may make: a refresh, the
/// rejected attempt and the retry.
const STRAVA_REQUESTS_PER_CALL: u32 = 3;

/// Outer bound for a token-managed Strava call, given the per-request timeout
/// the HTTP client already enforces.
pub(crate) fn strava_call_limit(per_request: Duration) -> Duration {
    per_request * STRAVA_REQUESTS_PER_CALL
}

/// Bound an external call. Elapsed maps to `AppError::Timeout(dependency)`.
pub(crate) async fn with_timeout<T>(
    limit: Duration,
    dependency: &str,
    fut: impl Future<Output = Result<T, AppError>>,
) -> Result<T, AppError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout(dependency.to_string())),
    }
}
