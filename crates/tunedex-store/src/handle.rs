use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// What an artifact holds. Only used for naming and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Media clip received from a requester for recognition
    InboundClip,
    /// Media fetched from a platform for delivery
    Download,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::InboundClip => "clip",
            ArtifactKind::Download => "download",
        }
    }
}

/// Exclusively-owned scoped temp file.
///
/// The file (which the owner may or may not have created yet) is removed when
/// the handle drops, unless the handle was committed to the store first. This
/// covers every exit path of a handler, including the orchestrator cancelling
/// the handler future on timeout.
pub struct ArtifactHandle {
    id: Uuid,
    path: PathBuf,
    kind: ArtifactKind,
    armed: bool,
}

impl ArtifactHandle {
    pub(crate) fn new(id: Uuid, path: PathBuf, kind: ArtifactKind) -> Self {
        Self {
            id,
            path,
            kind,
            armed: true,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// Take ownership of the file away from the drop guard. Only the store
    /// calls this, on commit.
    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl fmt::Debug for ArtifactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactHandle")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("kind", &self.kind)
            .finish()
    }
}

impl Drop for ArtifactHandle {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // Synchronous removal: drop can run inside a cancelled future where
        // no executor is guaranteed. Missing file is fine.
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(artifact_id = %self.id, path = %self.path.display(), "Removed uncommitted artifact on drop");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(artifact_id = %self.id, path = %self.path.display(), error = %e, "Failed to remove artifact on drop");
            }
        }
    }
}
