// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava push subscription registration.
//!
//! Strava allows one push subscription per application. The id of the
//! active one is kept here so incoming events can be checked against it.

use crate::error::AppError;
use crate::services::strava::{PushSubscription, StravaClient};
use tokio::sync::RwLock;

pub struct SubscriptionManager {
    client: StravaClient,
    callback_url: String,
    verify_token: String,
    current_subscription_id: RwLock<Option<u64>>,
}

impl SubscriptionManager {
    pub fn new(
        client: StravaClient,
        callback_url: impl Into<String>,
        verify_token: impl Into<String>,
        initial_id: Option<u64>,
    ) -> Self {
        Self {
            client,
            callback_url: callback_url.into(),
            verify_token: verify_token.into(),
            current_subscription_id: RwLock::new(initial_id),
        }
    }

    pub async fn current(&self) -> Option<u64> {
        *self.current_subscription_id.read().await
    }

    pub async fn set_current(&self, subscription_id: Option<u64>) {
        *self.current_subscription_id.write().await = subscription_id;
    }

    /// Whether an event tagged with `subscription_id` belongs to us.
    pub async fn accepts(&self, subscription_id: Option<u64>) -> bool {
        match (self.current().await, subscription_id) {
            (Some(current), Some(incoming)) => current == incoming,
            _ => true,
        }
    }

    pub async fn list(&self) -> Result<Vec<PushSubscription>, AppError> {
        self.client.list_push_subscriptions().await
    }

    /// Register the configured callback and remember the new id.
    pub async fn create(&self) -> Result<u64, AppError> {
        let subscription = self
            .client
            .create_push_subscription(&self.callback_url, &self.verify_token)
            .await?;

        tracing::info!(
            subscription_id = subscription.id,
            callback_url = %self.callback_url,
            "Webhook subscription created"
        );
        self.set_current(Some(subscription.id)).await;
        Ok(subscription.id)
    }

    pub async fn delete(&self, subscription_id: u64) -> Result<(), AppError> {
        self.client.delete_push_subscription(subscription_id).await?;
        tracing::info!(subscription_id, "Webhook subscription deleted");

        let mut current = self.current_subscription_id.write().await;
        if *current == Some(subscription_id) {
            *current = None;
        }
        Ok(())
    }

    /// Replace whatever Strava has registered with a fresh subscription
    /// for our callback URL.
    ///
    /// Strava performs the GET handshake against the callback while the
    /// create request is in flight, so the server must already be listening.
    pub async fn ensure_registered(&self) -> Result<u64, AppError> {
        let existing = self.list().await?;
        for subscription in existing {
            tracing::info!(
                subscription_id = subscription.id,
                callback_url = subscription.callback_url.as_deref().unwrap_or(""),
                "Removing existing webhook subscription"
            );
            self.delete(subscription.id).await?;
        }

        self.create().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn manager(initial_id: Option<u64>) -> SubscriptionManager {
        let client = StravaClient::new(
            "client".to_string(),
            "secret".to_string(),
            Duration::from_secs(1),
        );
        SubscriptionManager::new(client, "http://localhost/webhook", "token", initial_id)
    }

    #[tokio::test]
    async fn test_accepts_without_known_id() {
        let manager = manager(None);
        assert!(manager.accepts(Some(5)).await);
        assert!(manager.accepts(None).await);
    }

    #[tokio::test]
    async fn test_accepts_matching_id_only() {
        let manager = manager(Some(5));
        assert!(manager.accepts(Some(5)).await);
        assert!(!manager.accepts(Some(6)).await);
        assert!(manager.accepts(None).await);
    }

    #[tokio::test]
    async fn test_set_current() {
        let manager = manager(None);
        manager.set_current(Some(9)).await;
        assert_eq!(manager.current().await, Some(9));
        assert!(!manager.accepts(Some(1)).await);
    }
}
