// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Athlete credential record for storage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// OAuth tokens linking a Strava athlete to an account.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AthleteCredentials {
    /// Strava athlete ID (also used as document ID)
    pub athlete_id: u64,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry (Unix seconds), when Strava reported one
    #[serde(default)]
    pub expires_at: Option<i64>,
    /// Owning account; set when the athlete is linked and never changed
    pub linked_user_id: String,
    #[serde(default)]
    pub username: Option<String>,
}

impl AthleteCredentials {
    /// True if the access token is known to expire within `margin_secs` of `now`.
    ///
    /// Records without an expiry are assumed valid until Strava says otherwise.
    pub fn expires_within(&self, now: i64, margin_secs: i64) -> bool {
        self.expires_at
            .is_some_and(|expires_at| now + margin_secs >= expires_at)
    }

    /// Copy of this record carrying rotated tokens.
    pub fn with_tokens(&self, access_token: String, refresh_token: String, expires_at: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: Some(expires_at),
            ..self.clone()
        }
    }
}

impl fmt::Debug for AthleteCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AthleteCredentials")
            .field("athlete_id", &self.athlete_id)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("linked_user_id", &self.linked_user_id)
            .field("username", &self.username)
            .finish()
    }
}
