// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! City separation distance records.

use serde::{Deserialize, Serialize};

/// Distance between two cities, in kilometres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceRecord {
    pub distance: f64,
    pub city1: String,
    pub city2: String,
}
