// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage layer: athlete credentials and the city distance dataset.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryCredentialStore;

use crate::error::AppError;
use crate::models::AthleteCredentials;
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    /// OAuth tokens keyed by athlete_id
    pub const ATHLETE_CREDENTIALS: &str = "athlete_credentials";
    /// Read-only `{distance, city1, city2}` documents
    pub const CITY_DISTANCES: &str = "city_distances";
}

/// Maps a Strava athlete to its stored OAuth tokens.
///
/// At most one record exists per athlete; `set` replaces it wholesale.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, athlete_id: u64) -> Result<Option<AthleteCredentials>, AppError>;

    async fn set(&self, athlete_id: u64, record: &AthleteCredentials) -> Result<(), AppError>;
}
