pub mod outcome;
pub mod platform;
pub mod request;
pub mod track;

pub use outcome::{ArtifactRef, Fulfillment, Outcome};
pub use platform::Platform;
pub use request::{CacheKey, Request, RequestKind, RequestPayload, RequesterId};
pub use track::TrackMetadata;
