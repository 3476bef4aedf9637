// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Decides whether a webhook event should be enriched.

use crate::db::CredentialStore;
use crate::models::ActivityEvent;
use crate::services::strava::TrackingService;
use crate::services::{strava_call_limit, with_timeout};
use std::sync::Arc;
use std::time::Duration;

/// Strava sport types that count as cycling.
const CYCLING_SPORT_TYPES: &[&str] = &[
    "Ride",
    "MountainBikeRide",
    "GravelRide",
    "EBikeRide",
    "EMountainBikeRide",
    "VirtualRide",
    "Velomobile",
    "Handcycle",
];

pub fn is_cycling_sport(sport_type: &str) -> bool {
    CYCLING_SPORT_TYPES.contains(&sport_type)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Not an activity-create event
    NotActivityCreate,
    UnlinkedAthlete,
    NotCycling(String),
    /// Credential or activity lookup failed or timed out
    LookupFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Skip(SkipReason),
    Process,
}

/// Event filter: cheap shape checks first, then the ride-type check.
#[derive(Clone)]
pub struct EventFilter {
    credentials: Arc<dyn CredentialStore>,
    strava: Arc<dyn TrackingService>,
    call_timeout: Duration,
}

impl EventFilter {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        strava: Arc<dyn TrackingService>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            credentials,
            strava,
            call_timeout,
        }
    }

    pub async fn evaluate(&self, event: &ActivityEvent) -> FilterDecision {
        if !event.is_activity_create() {
            tracing::debug!(
                object_type = ?event.object_type,
                aspect_type = ?event.aspect_type,
                "Ignoring non activity-create event"
            );
            return FilterDecision::Skip(SkipReason::NotActivityCreate);
        }

        let athlete_id = event.owner_id;
        let activity_id = event.object_id;

        let mut credentials = match with_timeout(
            self.call_timeout,
            "credential store",
            self.credentials.get(athlete_id),
        )
        .await
        {
            Ok(Some(c)) => c,
            Ok(None) => {
                tracing::info!(athlete_id, "No linked credentials for athlete, skipping");
                return FilterDecision::Skip(SkipReason::UnlinkedAthlete);
            }
            Err(e) => {
                tracing::warn!(athlete_id, error = %e, "Credential lookup failed during ride check");
                return FilterDecision::Skip(SkipReason::LookupFailed);
            }
        };

        let sport_type = match with_timeout(
            strava_call_limit(self.call_timeout),
            "Strava API",
            self.strava.get_activity_type(&mut credentials, activity_id),
        )
        .await
        {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(athlete_id, activity_id, error = %e, "Activity type lookup failed");
                return FilterDecision::Skip(SkipReason::LookupFailed);
            }
        };

        if is_cycling_sport(&sport_type) {
            FilterDecision::Process
        } else {
            tracing::debug!(activity_id, sport_type = %sport_type, "Not a ride, skipping");
            FilterDecision::Skip(SkipReason::NotCycling(sport_type))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycling_sport_types() {
        assert!(is_cycling_sport("Ride"));
        assert!(is_cycling_sport("GravelRide"));
        assert!(is_cycling_sport("VirtualRide"));
        assert!(!is_cycling_sport("Run"));
        assert!(!is_cycling_sport("ride"));
        assert!(!is_cycling_sport(""));
    }
}
