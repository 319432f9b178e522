//! Capability registry
//!
//! Maps a request payload to the handler able to serve it. Clip payloads
//! always resolve to the recognition handler; link payloads are matched
//! against the registered platform patterns in registration order, first
//! match wins. Adding a platform is a registration, never an orchestrator
//! change.

use std::sync::Arc;
use tokio::sync::RwLock;

use tunedex_core::models::{Platform, RequestPayload};
use tunedex_core::validation::host_of;

use crate::capability::Capability;

/// Thread-safe and async-compatible registry. Reads dominate; registration
/// normally happens once at startup.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    recognition: Arc<RwLock<Option<Arc<dyn Capability>>>>,
    retrieval: Arc<RwLock<Vec<(Platform, Arc<dyn Capability>)>>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the recognition handler (replaces any previous one).
    pub async fn register_recognition(&self, handler: Arc<dyn Capability>) {
        tracing::debug!(handler = handler.name(), "Registered recognition capability");
        *self.recognition.write().await = Some(handler);
    }

    /// Register a retrieval handler for a platform. Re-registering a platform
    /// replaces its handler in place, keeping its precedence position.
    pub async fn register_platform(&self, platform: Platform, handler: Arc<dyn Capability>) {
        let mut retrieval = self.retrieval.write().await;
        tracing::debug!(platform = %platform, handler = handler.name(), "Registered retrieval capability");

        if let Some(entry) = retrieval.iter_mut().find(|(p, _)| *p == platform) {
            entry.1 = handler;
        } else {
            retrieval.push((platform, handler));
        }
    }

    /// Resolve the handler for a payload, or `None` when nothing matches.
    pub async fn resolve(&self, payload: &RequestPayload) -> Option<Arc<dyn Capability>> {
        match payload {
            RequestPayload::Clip { .. } => self.recognition.read().await.clone(),
            RequestPayload::Link { url } => {
                let host = host_of(url)?;
                let retrieval = self.retrieval.read().await;
                retrieval
                    .iter()
                    .find(|(platform, _)| platform.matches_host(&host))
                    .map(|(_, handler)| Arc::clone(handler))
            }
        }
    }

    /// Registered platforms in precedence order.
    pub async fn platforms(&self) -> Vec<Platform> {
        self.retrieval.read().await.iter().map(|(p, _)| *p).collect()
    }
}
