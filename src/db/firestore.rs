// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Athlete credentials (OAuth tokens keyed by athlete ID)
//! - City distances (read-only dataset, queried by lowest upper bound)

use crate::db::{collections, CredentialStore};
use crate::error::AppError;
use crate::models::{AthleteCredentials, DistanceRecord};
use crate::services::cities::{validate_target, CityDistanceLookup};
use async_trait::async_trait;
use firestore::FirestoreQueryDirection;
use futures_util::{stream, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Credential Operations ───────────────────────────────────

    /// Get stored credentials for an athlete.
    pub async fn get_credentials(
        &self,
        athlete_id: u64,
    ) -> Result<Option<AthleteCredentials>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ATHLETE_CREDENTIALS)
            .obj()
            .one(&athlete_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or replace the credentials for an athlete.
    pub async fn set_credentials(
        &self,
        athlete_id: u64,
        record: &AthleteCredentials,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ATHLETE_CREDENTIALS)
            .document_id(athlete_id.to_string())
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── City Distance Operations ────────────────────────────────

    /// Find the smallest recorded distance at or above `target_km`.
    ///
    /// Equal distances fall back to document ID order, which `seed_city_distances`
    /// assigns from the dataset's natural order.
    pub async fn closest_city_distance(
        &self,
        target_km: f64,
    ) -> Result<Option<DistanceRecord>, AppError> {
        let mut matches: Vec<DistanceRecord> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::CITY_DISTANCES)
            .filter(move |q| q.for_all([q.field("distance").greater_than_or_equal(target_km)]))
            .order_by([
                ("distance", FirestoreQueryDirection::Ascending),
                ("__name__", FirestoreQueryDirection::Ascending),
            ])
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(matches.pop())
    }

    /// Write a city distance dataset, one document per record.
    ///
    /// Document IDs are the zero-padded position in `records` so that ties on
    /// `distance` resolve in input order.
    pub async fn seed_city_distances(&self, records: &[DistanceRecord]) -> Result<(), AppError> {
        let client = self.get_client()?;

        stream::iter(records.iter().enumerate())
            .map(|(index, record)| async move {
                let doc_id = format!("{:010}", index);

                let _: () = client
                    .fluent()
                    .update()
                    .in_col(collections::CITY_DISTANCES)
                    .document_id(&doc_id)
                    .object(record)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;

                Ok::<_, AppError>(())
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<(), AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<()>, AppError>>()?;

        tracing::info!(count = records.len(), "Seeded city distances");
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FirestoreDb {
    async fn get(&self, athlete_id: u64) -> Result<Option<AthleteCredentials>, AppError> {
        self.get_credentials(athlete_id).await
    }

    async fn set(&self, athlete_id: u64, record: &AthleteCredentials) -> Result<(), AppError> {
        self.set_credentials(athlete_id, record).await
    }
}

#[async_trait]
impl CityDistanceLookup for FirestoreDb {
    async fn lookup(&self, target_km: f64) -> Result<Option<DistanceRecord>, AppError> {
        self.closest_city_distance(validate_target(target_km)?).await
    }
}
