// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process credential store for tests and local development.

use crate::db::CredentialStore;
use crate::error::AppError;
use crate::models::AthleteCredentials;
use async_trait::async_trait;
use dashmap::DashMap;

#[derive(Default)]
pub struct MemoryCredentialStore {
    records: DashMap<u64, AthleteCredentials>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, athlete_id: u64) -> Result<Option<AthleteCredentials>, AppError> {
        Ok(self.records.get(&athlete_id).map(|r| r.value().clone()))
    }

    async fn set(&self, athlete_id: u64, record: &AthleteCredentials) -> Result<(), AppError> {
        self.records.insert(athlete_id, record.clone());
        Ok(())
    }
}
