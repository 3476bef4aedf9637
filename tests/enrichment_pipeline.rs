// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Worker-side tests: event filter, enrichment and retry behavior.

use axum::{body::Body, http::Request};
use distance_comparison::config::Config;
use distance_comparison::error::AppError;
use distance_comparison::models::{ActivityEvent, AspectType, DistanceRecord, ObjectType};
use distance_comparison::services::{
    CityDistanceIndex, EnrichOutcome, EnrichmentOrchestrator, JobOutcome, SkipReason,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

mod common;
use common::{create_test_app, create_test_app_with, link_athlete, FakeTracking};

const ATHLETE: u64 = 222;

fn created(activity_id: u64) -> ActivityEvent {
    ActivityEvent {
        object_type: ObjectType::Activity,
        aspect_type: AspectType::Create,
        object_id: activity_id,
        owner_id: ATHLETE,
        subscription_id: None,
    }
}

const EXPECTED_1200: &str =
    "You have now cycled 1200km on Strava. That's the equivalent of cycling from 📍CityC to 📍CityD";

#[tokio::test]
async fn test_ride_is_enriched_with_closest_city_pair() {
    let app = create_test_app(
        FakeTracking::default()
            .with_activity(111, "Ride")
            .with_lifetime(ATHLETE, 1_200_000.0),
    );
    link_athlete(&app, ATHLETE).await;

    let outcome = app.state.enrichment_worker().process(created(111)).await;

    assert_eq!(
        outcome,
        JobOutcome::Enriched(EnrichOutcome::Updated {
            description: EXPECTED_1200.to_string()
        })
    );
    assert_eq!(app.strava.updates(), vec![(111, EXPECTED_1200.to_string())]);
}

#[tokio::test]
async fn test_repeated_event_converges_to_same_description() {
    let app = create_test_app(
        FakeTracking::default()
            .with_activity(111, "GravelRide")
            .with_lifetime(ATHLETE, 1_200_000.0),
    );
    link_athlete(&app, ATHLETE).await;
    let worker = app.state.enrichment_worker();

    worker.process(created(111)).await;
    worker.process(created(111)).await;

    let updates = app.strava.updates();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0], updates[1]);
}

#[tokio::test]
async fn test_exact_distance_match() {
    let app = create_test_app(
        FakeTracking::default()
            .with_activity(5, "Ride")
            .with_lifetime(ATHLETE, 500_000.0),
    );
    link_athlete(&app, ATHLETE).await;

    app.state.enrichment_worker().process(created(5)).await;

    let updates = app.strava.updates();
    assert!(updates[0].1.contains("cycled 500km"));
    assert!(updates[0].1.contains("📍CityA to 📍CityB"));
}

#[tokio::test]
async fn test_city_match_uses_unrounded_total() {
    // 500.4 km displays as 500 but must not match the 500 km pair
    let app = create_test_app(
        FakeTracking::default()
            .with_activity(5, "Ride")
            .with_lifetime(ATHLETE, 500_400.0),
    );
    link_athlete(&app, ATHLETE).await;

    app.state.enrichment_worker().process(created(5)).await;

    let updates = app.strava.updates();
    assert!(updates[0].1.contains("cycled 500km"));
    assert!(updates[0].1.contains("📍CityC to 📍CityD"));
}

#[tokio::test]
async fn test_city_match_does_not_round_up_past_closer_pair() {
    let app = create_test_app(
        FakeTracking::default()
            .with_activity(5, "Ride")
            .with_lifetime(ATHLETE, 1_499_600.0),
    );
    link_athlete(&app, ATHLETE).await;
    let cities = CityDistanceIndex::from_records(vec![
        DistanceRecord {
            distance: 1499.8,
            city1: "Near1".to_string(),
            city2: "Near2".to_string(),
        },
        DistanceRecord {
            distance: 1500.0,
            city1: "Far1".to_string(),
            city2: "Far2".to_string(),
        },
    ])
    .unwrap();
    let orchestrator = EnrichmentOrchestrator::new(
        app.credentials.clone(),
        app.strava.clone(),
        Arc::new(cities),
        Duration::from_secs(2),
    );

    let outcome = orchestrator.enrich(5, ATHLETE).await.unwrap();

    assert_eq!(
        outcome,
        EnrichOutcome::Updated {
            description: "You have now cycled 1500km on Strava. That's the equivalent of cycling from 📍Near1 to 📍Near2".to_string()
        }
    );
}

#[tokio::test]
async fn test_non_ride_is_skipped_without_writes() {
    let app = create_test_app(
        FakeTracking::default()
            .with_activity(111, "Run")
            .with_lifetime(ATHLETE, 1_200_000.0),
    );
    link_athlete(&app, ATHLETE).await;

    let outcome = app.state.enrichment_worker().process(created(111)).await;

    assert_eq!(
        outcome,
        JobOutcome::Skipped(SkipReason::NotCycling("Run".to_string()))
    );
    assert_eq!(app.strava.calls(), (1, 0, 0));
}

#[tokio::test]
async fn test_non_create_events_never_reach_strava() {
    let app = create_test_app(FakeTracking::default().with_activity(111, "Ride"));
    link_athlete(&app, ATHLETE).await;
    let worker = app.state.enrichment_worker();

    let mut update = created(111);
    update.aspect_type = AspectType::Update;
    let mut athlete = created(ATHLETE);
    athlete.object_type = ObjectType::Athlete;

    for event in [update, athlete] {
        assert_eq!(
            worker.process(event).await,
            JobOutcome::Skipped(SkipReason::NotActivityCreate)
        );
    }
    assert_eq!(app.strava.calls(), (0, 0, 0));
}

#[tokio::test]
async fn test_unlinked_athlete_is_skipped() {
    let app = create_test_app(
        FakeTracking::default()
            .with_activity(111, "Ride")
            .with_lifetime(ATHLETE, 1_200_000.0),
    );

    let outcome = app.state.enrichment_worker().process(created(111)).await;

    assert_eq!(outcome, JobOutcome::Skipped(SkipReason::UnlinkedAthlete));
    assert_eq!(app.strava.calls(), (0, 0, 0));
}

#[tokio::test]
async fn test_activity_lookup_failure_is_skipped() {
    // Activity 111 is unknown to the fake, so the type lookup returns NotFound
    let app = create_test_app(FakeTracking::default());
    link_athlete(&app, ATHLETE).await;

    let outcome = app.state.enrichment_worker().process(created(111)).await;

    assert_eq!(outcome, JobOutcome::Skipped(SkipReason::LookupFailed));
    assert!(app.strava.updates().is_empty());
}

#[tokio::test]
async fn test_total_above_every_city_leaves_description_alone() {
    let app = create_test_app(
        FakeTracking::default()
            .with_activity(111, "Ride")
            .with_lifetime(ATHLETE, 5_000_000.0),
    );
    link_athlete(&app, ATHLETE).await;

    let outcome = app.state.enrichment_worker().process(created(111)).await;

    assert_eq!(
        outcome,
        JobOutcome::Enriched(EnrichOutcome::NoDistanceMatch { total_km: 5000 })
    );
    assert_eq!(app.strava.calls(), (1, 1, 0));
}

#[tokio::test]
async fn test_remote_failure_is_not_retried_by_default() {
    let app = create_test_app(
        FakeTracking::default()
            .with_activity(111, "Ride")
            .with_lifetime(ATHLETE, 1_200_000.0),
    );
    link_athlete(&app, ATHLETE).await;
    app.strava
        .fail_next_updates(vec![AppError::StravaApi("HTTP 500: oops".to_string())]);

    let outcome = app.state.enrichment_worker().process(created(111)).await;

    assert!(matches!(outcome, JobOutcome::Failed { attempts: 1, .. }));
    assert!(app.strava.updates().is_empty());
}

#[tokio::test]
async fn test_retry_policy_retries_transient_failures() {
    let mut config = Config::test_default();
    config.enrich_max_attempts = 3;
    let app = create_test_app_with(
        config,
        FakeTracking::default()
            .with_activity(111, "Ride")
            .with_lifetime(ATHLETE, 1_200_000.0),
    );
    link_athlete(&app, ATHLETE).await;
    app.strava.fail_next_updates(vec![
        AppError::Timeout("Strava API".to_string()),
        AppError::StravaApi("HTTP 503: unavailable".to_string()),
    ]);

    let outcome = app.state.enrichment_worker().process(created(111)).await;

    assert_eq!(
        outcome,
        JobOutcome::Enriched(EnrichOutcome::Updated {
            description: EXPECTED_1200.to_string()
        })
    );
    assert_eq!(app.strava.calls().2, 3);
}

#[tokio::test]
async fn test_retry_policy_gives_up_after_max_attempts() {
    let mut config = Config::test_default();
    config.enrich_max_attempts = 2;
    let app = create_test_app_with(
        config,
        FakeTracking::default()
            .with_activity(111, "Ride")
            .with_lifetime(ATHLETE, 1_200_000.0),
    );
    link_athlete(&app, ATHLETE).await;
    app.strava.fail_next_updates(vec![
        AppError::Timeout("Strava API".to_string()),
        AppError::Timeout("Strava API".to_string()),
        AppError::Timeout("Strava API".to_string()),
    ]);

    let outcome = app.state.enrichment_worker().process(created(111)).await;

    assert!(matches!(outcome, JobOutcome::Failed { attempts: 2, .. }));
    assert_eq!(app.strava.calls().2, 2);
}

#[tokio::test]
async fn test_token_errors_are_not_retried() {
    let mut config = Config::test_default();
    config.enrich_max_attempts = 3;
    let app = create_test_app_with(
        config,
        FakeTracking::default()
            .with_activity(111, "Ride")
            .with_lifetime(ATHLETE, 1_200_000.0),
    );
    link_athlete(&app, ATHLETE).await;
    app.strava.fail_next_updates(vec![AppError::StravaApi(
        AppError::STRAVA_TOKEN_ERROR.to_string(),
    )]);

    let outcome = app.state.enrichment_worker().process(created(111)).await;

    assert!(matches!(outcome, JobOutcome::Failed { attempts: 1, .. }));
    assert_eq!(app.strava.calls().2, 1);
}

#[tokio::test]
async fn test_webhook_to_description_end_to_end() {
    let app = create_test_app(
        FakeTracking::default()
            .with_activity(111, "Ride")
            .with_lifetime(ATHLETE, 1_200_000.0),
    );
    link_athlete(&app, ATHLETE).await;

    let worker = app.state.enrichment_worker();
    let worker_handle = tokio::spawn(worker.run(app.receiver));

    let payload = json!({
        "aspect_type": "create",
        "object_id": 111,
        "object_type": "activity",
        "owner_id": ATHLETE,
        "subscription_id": 1
    });
    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook")
                .header("Content-Type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let mut updates = Vec::new();
    for _ in 0..100 {
        updates = app.strava.updates();
        if !updates.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(updates, vec![(111, EXPECTED_1200.to_string())]);

    worker_handle.abort();
}
