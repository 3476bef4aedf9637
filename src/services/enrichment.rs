// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity enrichment pipeline.
//!
//! Handles the core workflow:
//! 1. Resolve the athlete's stored credentials
//! 2. Fetch the lifetime ride total from Strava
//! 3. Find the closest city pair at or above that distance
//! 4. Compose the description
//! 5. Overwrite the activity description on Strava
//!
//! Step 5 replaces the whole description, so running the pipeline twice for
//! the same activity leaves it in the same state as running it once.

use crate::db::CredentialStore;
use crate::error::EnrichError;
use crate::models::DistanceRecord;
use crate::services::cities::CityDistanceLookup;
use crate::services::strava::TrackingService;
use crate::services::{strava_call_limit, with_timeout};
use std::sync::Arc;
use std::time::Duration;

/// How an enrichment run that did not fail ended.
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichOutcome {
    /// The description was written.
    Updated { description: String },
    /// The lifetime total exceeds every recorded city distance.
    NoDistanceMatch { total_km: u64 },
}

/// Coordinates credential lookup, distance aggregation, city matching and
/// description write-back for one activity.
#[derive(Clone)]
pub struct EnrichmentOrchestrator {
    credentials: Arc<dyn CredentialStore>,
    strava: Arc<dyn TrackingService>,
    cities: Arc<dyn CityDistanceLookup>,
    call_timeout: Duration,
}

impl EnrichmentOrchestrator {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        strava: Arc<dyn TrackingService>,
        cities: Arc<dyn CityDistanceLookup>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            credentials,
            strava,
            cities,
            call_timeout,
        }
    }

    pub async fn enrich(
        &self,
        activity_id: u64,
        athlete_id: u64,
    ) -> Result<EnrichOutcome, EnrichError> {
        tracing::info!(athlete_id, activity_id, "Enriching activity");

        // 1. Credentials
        let mut credentials = with_timeout(
            self.call_timeout,
            "credential store",
            self.credentials.get(athlete_id),
        )
        .await?
        .ok_or(EnrichError::UnlinkedAthlete(athlete_id))?;

        // 2. Lifetime total (may rotate the tokens in `credentials`)
        let total_meters = with_timeout(
            strava_call_limit(self.call_timeout),
            "Strava API",
            self.strava.get_lifetime_ride_total(&mut credentials),
        )
        .await?;
        let total_km = whole_kilometers(total_meters);

        // 3. City pair, matched against the unrounded total
        let Some(matched) = with_timeout(
            self.call_timeout,
            "city distance dataset",
            self.cities.lookup(kilometers(total_meters)),
        )
        .await?
        else {
            tracing::warn!(
                athlete_id,
                activity_id,
                total_km,
                "No city pair at or above lifetime distance, leaving description unchanged"
            );
            return Ok(EnrichOutcome::NoDistanceMatch { total_km });
        };

        // 4. Description
        let description = compose_description(total_km, &matched);

        // 5. Write-back (full overwrite)
        with_timeout(
            strava_call_limit(self.call_timeout),
            "Strava API",
            self.strava
                .update_description(&mut credentials, activity_id, &description),
        )
        .await?;

        tracing::info!(
            athlete_id,
            activity_id,
            total_km,
            city1 = %matched.city1,
            city2 = %matched.city2,
            "Activity description updated"
        );

        Ok(EnrichOutcome::Updated { description })
    }
}

/// Meters to kilometers, with anything non-positive or non-finite as zero.
pub fn kilometers(meters: f64) -> f64 {
    if !meters.is_finite() || meters <= 0.0 {
        return 0.0;
    }
    meters / 1000.0
}

/// Meters to whole kilometers, rounding half away from zero.
pub fn whole_kilometers(meters: f64) -> u64 {
    if !meters.is_finite() || meters <= 0.0 {
        return 0;
    }
    (meters / 1000.0).round() as u64
}

/// Build the activity description for a lifetime total and its city pair.
pub fn compose_description(total_km: u64, cities: &DistanceRecord) -> String {
    format!(
        "You have now cycled {}km on Strava. That's the equivalent of cycling from 📍{} to 📍{}",
        total_km, cities.city1, cities.city2
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_kilometers_rounding() {
        assert_eq!(whole_kilometers(1_200_000.0), 1200);
        assert_eq!(whole_kilometers(1_200_499.9), 1200);
        assert_eq!(whole_kilometers(1_200_500.0), 1201);
        assert_eq!(whole_kilometers(0.0), 0);
        assert_eq!(whole_kilometers(-5.0), 0);
        assert_eq!(whole_kilometers(f64::NAN), 0);
    }

    #[test]
    fn test_kilometers_keeps_fraction() {
        assert_eq!(kilometers(1_200_400.0), 1200.4);
        assert_eq!(kilometers(0.0), 0.0);
        assert_eq!(kilometers(-1.0), 0.0);
        assert_eq!(kilometers(f64::INFINITY), 0.0);
    }

    #[test]
    fn test_compose_description() {
        let cities = DistanceRecord {
            distance: 1500.0,
            city1: "CityC".to_string(),
            city2: "CityD".to_string(),
        };
        assert_eq!(
            compose_description(1200, &cities),
            "You have now cycled 1200km on Strava. That's the equivalent of cycling from 📍CityC to 📍CityD"
        );
    }

    #[test]
    fn test_compose_description_is_deterministic() {
        let cities = DistanceRecord {
            distance: 10.0,
            city1: "A".to_string(),
            city2: "B".to_string(),
        };
        assert_eq!(compose_description(7, &cities), compose_description(7, &cities));
    }
}
