//! Tunedex Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration, and
//! validation shared across all Tunedex components.

pub mod config;
pub mod error;
pub mod hooks;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use config::Config;
pub use error::{ErrorKind, RequestError};
pub use hooks::{InMemoryUsageReporter, NoOpUsageReporter, UsageReporter, UsageSnapshot};
pub use models::{
    ArtifactRef, CacheKey, Fulfillment, Outcome, Platform, Request, RequestKind, RequestPayload,
    RequesterId, TrackMetadata,
};
