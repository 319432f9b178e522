//! Capability contract
//!
//! One uniform interface over recognition and retrieval. Adapters receive the
//! request plus a context carrying the artifact store and the media limits
//! they must enforce themselves, independent of whatever the external service
//! allows.

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use tunedex_core::models::{Outcome, Request};
use tunedex_core::Config;
use tunedex_store::ArtifactStore;

/// Size and duration caps every adapter enforces before fully materializing
/// a result.
#[derive(Debug, Clone, Copy)]
pub struct MediaLimits {
    pub max_bytes: u64,
    pub max_duration: Duration,
}

impl MediaLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_bytes: config.max_file_size_bytes,
            max_duration: config.max_duration,
        }
    }
}

/// Context provided to capabilities during execution.
#[derive(Clone)]
pub struct CapabilityContext {
    /// Artifact store for inbound clips and downloaded media
    pub store: Arc<ArtifactStore>,
    pub limits: MediaLimits,
}

/// Trait all capability handlers implement.
///
/// `execute` may block on network I/O; the orchestrator bounds it with a
/// deadline and may cancel the future, so any temporary file an
/// implementation creates must be guarded by an uncommitted artifact handle.
#[async_trait]
pub trait Capability: Send + Sync + Debug {
    /// Handler identifier for logs
    fn name(&self) -> &str;

    /// Run the request to completion, classifying every failure.
    async fn execute(&self, request: &Request, ctx: &CapabilityContext) -> Outcome;
}
