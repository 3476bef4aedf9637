// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process queue between the webhook handler and the enrichment pipeline.
//!
//! The webhook handler only enqueues; the worker runs the event filter and
//! the orchestrator after Strava has its 200.

use crate::error::EnrichError;
use crate::models::ActivityEvent;
use crate::services::enrichment::{EnrichOutcome, EnrichmentOrchestrator};
use crate::services::filter::{EventFilter, FilterDecision, SkipReason};
use futures_util::{stream, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;

/// Bounded retry for enrichment failures worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. `1` disables retries.
    pub max_attempts: u32,
    /// Delay before attempt `n + 1` is `backoff * n`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

/// Sending half, held by the webhook route.
#[derive(Clone)]
pub struct EnrichmentQueue {
    tx: mpsc::Sender<ActivityEvent>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Enrichment queue is full")]
    Full,

    #[error("Enrichment worker has stopped")]
    Closed,
}

impl EnrichmentQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ActivityEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Hand an event to the worker without waiting.
    pub fn enqueue(&self, event: ActivityEvent) -> Result<(), QueueError> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }
}

/// Final state of one queued event.
#[derive(Debug, PartialEq)]
pub enum JobOutcome {
    Skipped(SkipReason),
    Enriched(EnrichOutcome),
    /// Gave up after `attempts` tries.
    Failed { attempts: u32, reason: String },
}

/// Drains the queue, filtering and enriching events concurrently.
#[derive(Clone)]
pub struct EnrichmentWorker {
    filter: EventFilter,
    orchestrator: EnrichmentOrchestrator,
    retry: RetryPolicy,
    concurrency: usize,
}

impl EnrichmentWorker {
    pub fn new(
        filter: EventFilter,
        orchestrator: EnrichmentOrchestrator,
        retry: RetryPolicy,
        concurrency: usize,
    ) -> Self {
        Self {
            filter,
            orchestrator,
            retry,
            concurrency: concurrency.max(1),
        }
    }

    /// Run until every sender is dropped.
    pub async fn run(self, rx: mpsc::Receiver<ActivityEvent>) {
        tracing::info!(concurrency = self.concurrency, "Enrichment worker started");

        let events = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        events
            .for_each_concurrent(self.concurrency, |event| {
                let worker = &self;
                async move {
                    worker.process(event).await;
                }
            })
            .await;

        tracing::info!("Enrichment worker stopped");
    }

    /// Filter then enrich a single event, applying the retry policy.
    pub async fn process(&self, event: ActivityEvent) -> JobOutcome {
        let activity_id = event.object_id;
        let athlete_id = event.owner_id;

        if let FilterDecision::Skip(reason) = self.filter.evaluate(&event).await {
            return JobOutcome::Skipped(reason);
        }

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.orchestrator.enrich(activity_id, athlete_id).await {
                Ok(outcome) => return JobOutcome::Enriched(outcome),
                Err(EnrichError::UnlinkedAthlete(_)) => {
                    tracing::info!(athlete_id, activity_id, "Athlete not linked, enrichment aborted");
                    return JobOutcome::Skipped(SkipReason::UnlinkedAthlete);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    tracing::warn!(
                        athlete_id,
                        activity_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Enrichment failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(
                        athlete_id,
                        activity_id,
                        attempt,
                        error = %e,
                        "Enrichment failed"
                    );
                    return JobOutcome::Failed {
                        attempts: attempt,
                        reason: e.to_string(),
                    };
                }
            }
        }
    }
}
