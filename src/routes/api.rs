// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public JSON API.

use crate::error::{AppError, Result};
use crate::models::DistanceRecord;
use crate::services::cities::validate_target;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/city-separation-distance",
        get(get_city_separation_distance),
    )
}

#[derive(Deserialize)]
pub struct CityDistanceParams {
    /// Kept as a string so a bad value yields our own 400 body.
    #[serde(default)]
    distance: Option<String>,
}

/// Closest city pair at or above `distance` km, as a 0- or 1-element array.
async fn get_city_separation_distance(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CityDistanceParams>,
) -> Result<Json<Vec<DistanceRecord>>> {
    let raw = params
        .distance
        .ok_or_else(|| AppError::BadRequest("distance is required".to_string()))?;
    let target_km: f64 = raw
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("distance is not a number: {}", raw)))?;
    let target_km = validate_target(target_km)?;

    let matched = state.cities.lookup(target_km).await?;
    tracing::debug!(target_km, found = matched.is_some(), "City distance lookup");

    Ok(Json(matched.into_iter().collect()))
}
