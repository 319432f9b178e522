//! Temporary artifact store
//!
//! Scoped on-disk area for inbound clips and downloaded media. Handles are
//! exclusively owned by the request that acquired them and delete their file
//! on drop unless committed; committed artifacts are reclaimed by deferred
//! release or the periodic sweeper, so temporary storage never grows without
//! bound.

mod error;
mod handle;
mod store;

pub use error::{StoreError, StoreResult};
pub use handle::{ArtifactHandle, ArtifactKind};
pub use store::ArtifactStore;
