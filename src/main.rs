// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Distance Comparison API Server
//!
//! Receives Strava webhook events and annotates new rides with a city pair
//! matching the athlete's lifetime cycling distance.

use distance_comparison::{
    config::{Config, CredentialBackend},
    db::{CredentialStore, FirestoreDb, MemoryCredentialStore},
    services::{
        CityDistanceIndex, CityDistanceLookup, EnrichmentQueue, StravaClient, StravaService,
        SubscriptionManager, WebhookVerifier,
    },
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Distance Comparison API");

    // Firestore is only needed when it backs credentials or the city dataset
    let needs_firestore = config.credential_backend == CredentialBackend::Firestore
        || config.city_dataset_path.is_none();
    let db = if needs_firestore {
        Some(
            FirestoreDb::new(&config.gcp_project_id)
                .await
                .expect("Failed to connect to Firestore"),
        )
    } else {
        None
    };

    let credentials: Arc<dyn CredentialStore> = match (&config.credential_backend, &db) {
        (CredentialBackend::Firestore, Some(db)) => Arc::new(db.clone()),
        _ => {
            tracing::warn!("Using in-memory credential store; links are lost on restart");
            Arc::new(MemoryCredentialStore::new())
        }
    };

    let cities: Arc<dyn CityDistanceLookup> = match (&config.city_dataset_path, &db) {
        (Some(path), _) => {
            tracing::info!(path = %path, "Loading city distances");
            Arc::new(CityDistanceIndex::load_from_file(path).expect("Failed to load city distances"))
        }
        (None, Some(db)) => Arc::new(db.clone()),
        (None, None) => unreachable!("Firestore is connected when no dataset path is set"),
    };

    let strava_client = StravaClient::new(
        config.strava_client_id.clone(),
        config.strava_client_secret.clone(),
        config.external_call_timeout,
    );
    let strava = Arc::new(StravaService::new(
        strava_client.clone(),
        credentials.clone(),
    ));

    let subscriptions = Arc::new(SubscriptionManager::new(
        strava_client,
        config.callback_url.clone(),
        config.webhook_verify_token.clone(),
        config.strava_subscription_id,
    ));

    let (queue, receiver) = EnrichmentQueue::channel(config.queue_capacity);

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        verifier: WebhookVerifier::new(config.webhook_verify_token.clone()),
        subscriptions: subscriptions.clone(),
        credentials,
        strava,
        cities,
        queue,
    });

    tokio::spawn(state.enrichment_worker().run(receiver));

    // Build router
    let app = distance_comparison::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    // Strava calls back into /webhook while the subscription is created
    if config.register_webhook {
        tokio::spawn(async move {
            match subscriptions.ensure_registered().await {
                Ok(id) => tracing::info!(subscription_id = id, "Webhook registered"),
                Err(e) => tracing::error!(error = %e, "Failed to register webhook"),
            }
        });
    }

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("distance_comparison=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
