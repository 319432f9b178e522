//! Inbound request model
//!
//! A `Request` is created when the chat transport delivers a
//! `(requester, payload)` event and lives only for the duration of
//! orchestration. Identity and timestamp feed rate-limit accounting.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::models::Platform;
use crate::validation::{canonicalize_url, detect_platform};

/// Chat-level requester identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequesterId(pub i64);

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the requester submitted: a media clip to identify, or a platform
/// link to retrieve.
#[derive(Debug, Clone)]
pub enum RequestPayload {
    Clip { data: Bytes, filename: String },
    Link { url: String },
}

impl RequestPayload {
    /// Platform the payload resolves to, if it is a link on a known host.
    pub fn platform(&self) -> Option<Platform> {
        match self {
            RequestPayload::Clip { .. } => None,
            RequestPayload::Link { url } => detect_platform(url),
        }
    }

    pub fn is_clip(&self) -> bool {
        matches!(self, RequestPayload::Clip { .. })
    }
}

/// Derived request kind. Clip payloads are always recognition work; link
/// payloads are retrieval work on the matched platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Recognition,
    Retrieval(Platform),
}

/// An accepted inbound request. Immutable once created.
#[derive(Debug, Clone)]
pub struct Request {
    pub requester: RequesterId,
    pub payload: RequestPayload,
    pub submitted_at: DateTime<Utc>,
}

impl Request {
    pub fn new(requester: RequesterId, payload: RequestPayload) -> Self {
        Self {
            requester,
            payload,
            submitted_at: Utc::now(),
        }
    }

    /// Derive the request kind, or `None` for a link on an unregistered
    /// platform.
    pub fn kind(&self) -> Option<RequestKind> {
        match &self.payload {
            RequestPayload::Clip { .. } => Some(RequestKind::Recognition),
            RequestPayload::Link { .. } => self.payload.platform().map(RequestKind::Retrieval),
        }
    }

    /// Normalized input fingerprint used for caching and coalescing.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::for_payload(&self.payload)
    }
}

/// Normalized input fingerprint: content hash for clips, canonicalized URL
/// for links.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_payload(payload: &RequestPayload) -> Self {
        match payload {
            RequestPayload::Clip { data, .. } => {
                let mut hasher = Sha256::new();
                hasher.update(data);
                CacheKey(format!("clip:{}", hex::encode(hasher.finalize())))
            }
            RequestPayload::Link { url } => CacheKey(format!("link:{}", canonicalize_url(url))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
