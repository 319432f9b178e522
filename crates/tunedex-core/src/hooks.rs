//! Usage-reporting hooks
//!
//! The orchestrator records usage events through this trait so a persistent
//! document store can be slotted in without the core depending on it. The
//! core must keep working with that collaborator absent, so the default
//! implementation is in-memory.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

use crate::models::{Platform, RequesterId};

/// Point-in-time totals for the statistics surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub total_requesters: u64,
    pub songs_recognized: u64,
    pub media_retrieved: u64,
}

/// Trait for recording usage events.
///
/// Implementations must tolerate concurrent calls; failures are reported as
/// strings and never abort request handling.
#[async_trait]
pub trait UsageReporter: Send + Sync {
    /// Record that a requester was seen (idempotent per requester).
    async fn record_requester(&self, requester: RequesterId) -> Result<(), String>;

    /// Record a successful recognition.
    async fn record_recognition(&self) -> Result<(), String>;

    /// Record a successful retrieval from `platform`.
    async fn record_retrieval(&self, platform: Platform) -> Result<(), String>;

    /// Current totals.
    async fn snapshot(&self) -> Result<UsageSnapshot, String>;
}

/// Default reporter: process-local counters, lost on restart.
#[derive(Default)]
pub struct InMemoryUsageReporter {
    requesters: Mutex<HashSet<RequesterId>>,
    recognized: AtomicU64,
    retrieved: AtomicU64,
}

impl InMemoryUsageReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageReporter for InMemoryUsageReporter {
    async fn record_requester(&self, requester: RequesterId) -> Result<(), String> {
        self.requesters.lock().await.insert(requester);
        Ok(())
    }

    async fn record_recognition(&self) -> Result<(), String> {
        self.recognized.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn record_retrieval(&self, _platform: Platform) -> Result<(), String> {
        self.retrieved.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn snapshot(&self) -> Result<UsageSnapshot, String> {
        Ok(UsageSnapshot {
            total_requesters: self.requesters.lock().await.len() as u64,
            songs_recognized: self.recognized.load(Ordering::Relaxed),
            media_retrieved: self.retrieved.load(Ordering::Relaxed),
        })
    }
}

/// No-op implementation for deployments that do not track usage.
pub struct NoOpUsageReporter;

#[async_trait]
impl UsageReporter for NoOpUsageReporter {
    async fn record_requester(&self, _requester: RequesterId) -> Result<(), String> {
        Ok(())
    }

    async fn record_recognition(&self) -> Result<(), String> {
        Ok(())
    }

    async fn record_retrieval(&self, _platform: Platform) -> Result<(), String> {
        Ok(())
    }

    async fn snapshot(&self) -> Result<UsageSnapshot, String> {
        Ok(UsageSnapshot::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_counts_unique_requesters() {
        let reporter = InMemoryUsageReporter::new();
        reporter.record_requester(RequesterId(1)).await.unwrap();
        reporter.record_requester(RequesterId(1)).await.unwrap();
        reporter.record_requester(RequesterId(2)).await.unwrap();
        reporter.record_recognition().await.unwrap();
        reporter
            .record_retrieval(Platform::Youtube)
            .await
            .unwrap();
        reporter
            .record_retrieval(Platform::SoundCloud)
            .await
            .unwrap();

        let snapshot = reporter.snapshot().await.unwrap();
        assert_eq!(snapshot.total_requesters, 2);
        assert_eq!(snapshot.songs_recognized, 1);
        assert_eq!(snapshot.media_retrieved, 2);
    }

    #[tokio::test]
    async fn noop_reports_empty_snapshot() {
        let reporter = NoOpUsageReporter;
        reporter.record_requester(RequesterId(9)).await.unwrap();
        assert_eq!(reporter.snapshot().await.unwrap(), UsageSnapshot::default());
    }
}
