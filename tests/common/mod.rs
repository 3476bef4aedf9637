// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use distance_comparison::config::Config;
use distance_comparison::db::{CredentialStore, FirestoreDb, MemoryCredentialStore};
use distance_comparison::error::AppError;
use distance_comparison::models::{ActivityEvent, AthleteCredentials, DistanceRecord};
use distance_comparison::routes::create_router;
use distance_comparison::services::{
    CityDistanceIndex, EnrichmentQueue, StravaClient, SubscriptionManager, TokenGrant,
    TrackingService, WebhookVerifier,
};
use distance_comparison::AppState;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// The city table used throughout the tests.
#[allow(dead_code)]
pub fn sample_cities() -> Vec<DistanceRecord> {
    vec![
        DistanceRecord {
            distance: 500.0,
            city1: "CityA".to_string(),
            city2: "CityB".to_string(),
        },
        DistanceRecord {
            distance: 1500.0,
            city1: "CityC".to_string(),
            city2: "CityD".to_string(),
        },
        DistanceRecord {
            distance: 3000.0,
            city1: "CityE".to_string(),
            city2: "CityF".to_string(),
        },
    ]
}

#[allow(dead_code)]
pub fn sample_index() -> CityDistanceIndex {
    CityDistanceIndex::from_records(sample_cities()).expect("valid sample dataset")
}

/// Credentials for a linked athlete whose token won't expire mid-test.
#[allow(dead_code)]
pub fn linked_credentials(athlete_id: u64) -> AthleteCredentials {
    AthleteCredentials {
        athlete_id,
        access_token: format!("access-{}", athlete_id),
        refresh_token: format!("refresh-{}", athlete_id),
        expires_at: Some(chrono::Utc::now().timestamp() + 6 * 60 * 60),
        linked_user_id: format!("user-{}", athlete_id),
        username: None,
    }
}

/// Scripted stand-in for Strava that records what the pipeline asks of it.
#[derive(Default)]
pub struct FakeTracking {
    pub sport_types: Mutex<HashMap<u64, String>>,
    pub lifetime_meters: Mutex<HashMap<u64, f64>>,
    /// `(activity_id, description)` for every successful write.
    pub updates: Mutex<Vec<(u64, String)>>,
    /// Errors returned by the next `update_description` calls, in order.
    pub update_failures: Mutex<Vec<AppError>>,
    pub type_calls: AtomicUsize,
    pub total_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
}

#[allow(dead_code)]
impl FakeTracking {
    pub fn with_activity(self, activity_id: u64, sport_type: &str) -> Self {
        self.sport_types
            .lock()
            .unwrap()
            .insert(activity_id, sport_type.to_string());
        self
    }

    pub fn with_lifetime(self, athlete_id: u64, meters: f64) -> Self {
        self.lifetime_meters
            .lock()
            .unwrap()
            .insert(athlete_id, meters);
        self
    }

    pub fn fail_next_updates(&self, errors: Vec<AppError>) {
        *self.update_failures.lock().unwrap() = errors;
    }

    pub fn updates(&self) -> Vec<(u64, String)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn calls(&self) -> (usize, usize, usize) {
        (
            self.type_calls.load(Ordering::SeqCst),
            self.total_calls.load(Ordering::SeqCst),
            self.update_calls.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl TrackingService for FakeTracking {
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AppError> {
        if code != "good-code" {
            return Err(AppError::StravaApi("HTTP 400 Bad Request: bad code".to_string()));
        }
        Ok(TokenGrant {
            athlete_id: 4242,
            username: Some("rider".to_string()),
            access_token: "granted-access".to_string(),
            refresh_token: "granted-refresh".to_string(),
            expires_at: 2_000_000_000,
        })
    }

    async fn get_activity_type(
        &self,
        _credentials: &mut AthleteCredentials,
        activity_id: u64,
    ) -> Result<String, AppError> {
        self.type_calls.fetch_add(1, Ordering::SeqCst);
        self.sport_types
            .lock()
            .unwrap()
            .get(&activity_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("activity {}", activity_id)))
    }

    async fn get_lifetime_ride_total(
        &self,
        credentials: &mut AthleteCredentials,
    ) -> Result<f64, AppError> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .lifetime_meters
            .lock()
            .unwrap()
            .get(&credentials.athlete_id)
            .copied()
            .unwrap_or(0.0))
    }

    async fn update_description(
        &self,
        _credentials: &mut AthleteCredentials,
        activity_id: u64,
        description: &str,
    ) -> Result<(), AppError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut failures = self.update_failures.lock().unwrap();
            if !failures.is_empty() {
                return Err(failures.remove(0));
            }
        }
        self.updates
            .lock()
            .unwrap()
            .push((activity_id, description.to_string()));
        Ok(())
    }
}

/// Everything a test needs to drive the app and inspect side effects.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub receiver: mpsc::Receiver<ActivityEvent>,
    pub strava: Arc<FakeTracking>,
    pub credentials: Arc<MemoryCredentialStore>,
}

/// Create a test app with in-memory dependencies and the default test config.
#[allow(dead_code)]
pub fn create_test_app(strava: FakeTracking) -> TestApp {
    create_test_app_with(Config::test_default(), strava)
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config, strava: FakeTracking) -> TestApp {
    let strava = Arc::new(strava);
    let credentials = Arc::new(MemoryCredentialStore::new());

    // Never contacted: subscription calls are exercised against a mock server elsewhere.
    let strava_client = StravaClient::new(
        config.strava_client_id.clone(),
        config.strava_client_secret.clone(),
        config.external_call_timeout,
    )
    .with_base_urls("http://127.0.0.1:9", "http://127.0.0.1:9");
    let subscriptions = Arc::new(SubscriptionManager::new(
        strava_client,
        config.callback_url.clone(),
        config.webhook_verify_token.clone(),
        config.strava_subscription_id,
    ));

    let (queue, receiver) = EnrichmentQueue::channel(config.queue_capacity);

    let state = Arc::new(AppState {
        verifier: WebhookVerifier::new(config.webhook_verify_token.clone()),
        config,
        subscriptions,
        credentials: credentials.clone(),
        strava: strava.clone(),
        cities: Arc::new(sample_index()),
        queue,
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        receiver,
        strava,
        credentials,
    }
}

/// Store credentials for `athlete_id` in the test app's memory store.
#[allow(dead_code)]
pub async fn link_athlete(app: &TestApp, athlete_id: u64) {
    app.credentials
        .set(athlete_id, &linked_credentials(athlete_id))
        .await
        .unwrap();
}

/// Read a response body as a string.
#[allow(dead_code)]
pub async fn body_string(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}
