//! Request outcome model

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::RequestError;
use crate::models::TrackMetadata;

/// Handle into the artifact store. Carries the path, never the bytes, so
/// large payloads are not duplicated through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub id: Uuid,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Successful result of a recognition or retrieval request.
#[derive(Debug, Clone, PartialEq)]
pub struct Fulfillment {
    pub metadata: TrackMetadata,
    pub artifact: Option<ArtifactRef>,
}

/// Tagged result delivered back to the caller: normalized success or a
/// classified failure. Cloneable so one execution can serve every coalesced
/// waiter and the cache.
pub type Outcome = Result<Fulfillment, RequestError>;
