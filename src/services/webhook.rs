// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook subscription handshake and event intake.

use crate::models::event::EventError;
use crate::models::ActivityEvent;
use subtle::ConstantTimeEq;

/// Result of a subscription handshake request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Echo this challenge back unchanged.
    Verified(String),
    /// Mode or token did not match.
    Forbidden,
    /// Mode or token was absent; not a handshake at all.
    Ignored,
}

/// Verifies handshakes against the pre-shared token and parses event payloads.
#[derive(Clone)]
pub struct WebhookVerifier {
    verify_token: String,
}

impl WebhookVerifier {
    pub fn new(verify_token: impl Into<String>) -> Self {
        Self {
            verify_token: verify_token.into(),
        }
    }

    pub fn verify(
        &self,
        mode: Option<&str>,
        token: Option<&str>,
        challenge: Option<&str>,
    ) -> VerificationOutcome {
        let (Some(mode), Some(token)) = (mode, token) else {
            return VerificationOutcome::Ignored;
        };

        let token_matches: bool = token
            .as_bytes()
            .ct_eq(self.verify_token.as_bytes())
            .into();

        if mode == "subscribe" && token_matches {
            VerificationOutcome::Verified(challenge.unwrap_or_default().to_string())
        } else {
            VerificationOutcome::Forbidden
        }
    }

    /// Parse an inbound payload. Never panics; unusable payloads are `Err`.
    pub fn parse_event(&self, payload: &serde_json::Value) -> Result<ActivityEvent, EventError> {
        ActivityEvent::from_payload(payload)
    }
}
