// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! City separation dataset loading and lowest-upper-bound lookup.

use crate::error::AppError;
use crate::models::DistanceRecord;
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Finds the city pair whose separation is the smallest distance >= a target.
#[async_trait]
pub trait CityDistanceLookup: Send + Sync {
    /// `Ok(None)` when the target exceeds every recorded distance.
    async fn lookup(&self, target_km: f64) -> Result<Option<DistanceRecord>, AppError>;
}

/// Reject targets that cannot be ordered against the dataset.
pub fn validate_target(target_km: f64) -> Result<f64, AppError> {
    if !target_km.is_finite() {
        return Err(AppError::BadRequest("distance must be a finite number".to_string()));
    }
    Ok(target_km)
}

/// Totally ordered distance key. Only built from finite, non-negative values
/// (and lookup targets), with `-0.0` folded into `0.0`.
#[derive(Debug, Clone, Copy)]
struct Km(f64);

impl Km {
    fn new(value: f64) -> Self {
        Self(if value == 0.0 { 0.0 } else { value })
    }
}

impl PartialEq for Km {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Km {}

impl PartialOrd for Km {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Km {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// In-memory ordered index over a city distance dataset.
///
/// Records sharing a distance keep their dataset order, so the first one
/// loaded wins a tie.
#[derive(Debug, Default, Clone)]
pub struct CityDistanceIndex {
    by_distance: BTreeMap<Km, Vec<DistanceRecord>>,
    len: usize,
}

impl CityDistanceIndex {
    /// Load a JSON array of `{distance, city1, city2}` from a file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let json_data =
            fs::read_to_string(path.as_ref()).map_err(|e| DatasetError::Io(e.to_string()))?;
        Self::load_from_json(&json_data)
    }

    /// Load a JSON array of `{distance, city1, city2}`.
    pub fn load_from_json(json_data: &str) -> Result<Self, DatasetError> {
        let records: Vec<DistanceRecord> =
            serde_json::from_str(json_data).map_err(|e| DatasetError::Parse(e.to_string()))?;
        let index = Self::from_records(records)?;
        tracing::info!(count = index.len(), "Loaded city distances");
        Ok(index)
    }

    /// Build an index, rejecting distances that cannot be ordered meaningfully.
    pub fn from_records(
        records: impl IntoIterator<Item = DistanceRecord>,
    ) -> Result<Self, DatasetError> {
        let mut index = Self::default();
        for (position, record) in records.into_iter().enumerate() {
            if !record.distance.is_finite() || record.distance < 0.0 {
                return Err(DatasetError::InvalidDistance {
                    position,
                    value: record.distance,
                });
            }
            index
                .by_distance
                .entry(Km::new(record.distance))
                .or_default()
                .push(record);
            index.len += 1;
        }
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Ascending range query with limit 1.
    pub fn closest_at_or_above(&self, target_km: f64) -> Option<&DistanceRecord> {
        self.by_distance
            .range(Km::new(target_km)..)
            .next()
            .and_then(|(_, records)| records.first())
    }
}

#[async_trait]
impl CityDistanceLookup for CityDistanceIndex {
    async fn lookup(&self, target_km: f64) -> Result<Option<DistanceRecord>, AppError> {
        let target_km = validate_target(target_km)?;
        Ok(self.closest_at_or_above(target_km).cloned())
    }
}

/// Errors from dataset loading.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Failed to read file: {0}")]
    Io(String),

    #[error("Failed to parse dataset: {0}")]
    Parse(String),

    #[error("Record {position} has unusable distance {value}")]
    InvalidDistance { position: usize, value: f64 },
}
