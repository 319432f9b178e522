use std::path::PathBuf;

/// Artifact store operation errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("artifact root unusable: {path}: {source}")]
    RootUnusable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact not found: {0}")]
    NotFound(uuid::Uuid),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
