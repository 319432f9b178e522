//! Orchestration services
//!
//! The composition layer: per-requester rate limiting, the TTL result cache,
//! in-flight coalescing, and the `Orchestrator` that ties them to the
//! capability registry and the artifact store.

pub mod cache;
pub mod orchestrator;
pub mod rate_limit;
pub mod telemetry;

pub use cache::ResultCache;
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use rate_limit::RequestRateLimiter;
pub use telemetry::init_telemetry;
