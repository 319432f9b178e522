//! Capability adapters
//!
//! This crate provides the abstraction layer between the orchestrator and the
//! external services it drives: the fingerprint-matching service behind the
//! recognition adapter, and the platform extraction backends behind the
//! retrieval adapter set. Every adapter exposes the same `Capability`
//! contract and classifies every external failure into a `RequestError`
//! before it reaches the orchestrator.

pub mod capability;
pub mod extractor;
pub mod recognition;
pub mod registry;
pub mod retrieval;

pub use capability::{Capability, CapabilityContext, MediaLimits};
pub use extractor::{ExtractError, ExtractorBackend, FormatPolicy, ProbeInfo, YtDlpExtractor};
pub use recognition::FingerprintAdapter;
pub use registry::CapabilityRegistry;
pub use retrieval::PlatformAdapter;
