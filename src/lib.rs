// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Distance Comparison: put a Strava cyclist's lifetime distance in context
//!
//! This crate receives Strava webhook events and, for each new ride, rewrites
//! the activity description with the city pair whose separation best matches
//! the athlete's lifetime cycling distance.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::CredentialStore;
use services::{
    CityDistanceLookup, EnrichmentOrchestrator, EnrichmentQueue, EnrichmentWorker, EventFilter,
    RetryPolicy, SubscriptionManager, TrackingService, WebhookVerifier,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub verifier: WebhookVerifier,
    pub subscriptions: Arc<SubscriptionManager>,
    pub credentials: Arc<dyn CredentialStore>,
    pub strava: Arc<dyn TrackingService>,
    pub cities: Arc<dyn CityDistanceLookup>,
    pub queue: EnrichmentQueue,
}

impl AppState {
    /// Build the worker that drains `queue`, sharing this state's backends.
    pub fn enrichment_worker(&self) -> EnrichmentWorker {
        let timeout = self.config.external_call_timeout;
        let filter = EventFilter::new(self.credentials.clone(), self.strava.clone(), timeout);
        let orchestrator = EnrichmentOrchestrator::new(
            self.credentials.clone(),
            self.strava.clone(),
            self.cities.clone(),
            timeout,
        );
        let retry = RetryPolicy {
            max_attempts: self.config.enrich_max_attempts,
            backoff: self.config.enrich_retry_backoff,
        };

        EnrichmentWorker::new(filter, orchestrator, retry, self.config.worker_concurrency)
    }
}
