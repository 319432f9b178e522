use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::interval;
use uuid::Uuid;

use tunedex_core::models::ArtifactRef;

use crate::error::{StoreError, StoreResult};
use crate::handle::{ArtifactHandle, ArtifactKind};

struct LiveArtifact {
    path: PathBuf,
    committed_at: Instant,
}

/// Scoped temporary artifact store over one root directory.
///
/// Handles are independent; the only shared state is the table of committed
/// artifacts awaiting release, synchronized per operation.
pub struct ArtifactStore {
    root: PathBuf,
    live: Mutex<HashMap<Uuid, LiveArtifact>>,
    /// Committed artifacts older than this are reclaimed by the sweeper
    grace: Duration,
}

impl ArtifactStore {
    pub async fn new(root: PathBuf, grace: Duration) -> StoreResult<Self> {
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|source| StoreError::RootUnusable {
                path: root.clone(),
                source,
            })?;

        Ok(Self {
            root,
            live: Mutex::new(HashMap::new()),
            grace,
        })
    }

    /// Reserve a unique path for a new artifact. No file is created yet; the
    /// caller writes to `handle.path()` and either commits or lets the handle
    /// drop.
    pub fn acquire(&self, kind: ArtifactKind, extension: &str) -> ArtifactHandle {
        let id = Uuid::new_v4();
        let filename = if extension.is_empty() {
            format!("{}_{}", kind.as_str(), id)
        } else {
            format!("{}_{}.{}", kind.as_str(), id, extension)
        };
        let path = self.root.join(filename);

        tracing::debug!(artifact_id = %id, path = %path.display(), kind = kind.as_str(), "Acquired artifact handle");
        ArtifactHandle::new(id, path, kind)
    }

    /// Commit a handle: ownership moves from the drop guard to the store's
    /// live table so the file survives until release.
    pub async fn commit(&self, mut handle: ArtifactHandle) -> StoreResult<ArtifactRef> {
        let metadata = tokio::fs::metadata(handle.path()).await?;
        let artifact = ArtifactRef {
            id: handle.id(),
            path: handle.path().to_path_buf(),
            size_bytes: metadata.len(),
        };

        handle.disarm();
        self.live.lock().await.insert(
            artifact.id,
            LiveArtifact {
                path: artifact.path.clone(),
                committed_at: Instant::now(),
            },
        );

        tracing::debug!(artifact_id = %artifact.id, size_bytes = artifact.size_bytes, "Committed artifact");
        Ok(artifact)
    }

    /// Delete a committed artifact. Returns false if it was already gone.
    pub async fn release(&self, id: Uuid) -> bool {
        let entry = self.live.lock().await.remove(&id);
        let Some(live) = entry else {
            return false;
        };

        match tokio::fs::remove_file(&live.path).await {
            Ok(()) => {
                tracing::debug!(artifact_id = %id, path = %live.path.display(), "Released artifact");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(artifact_id = %id, path = %live.path.display(), error = %e, "Failed to delete released artifact");
            }
        }
        true
    }

    /// Release `id` after a delay. Used once an outcome has been delivered so
    /// the caller gets a grace period to consume the file.
    pub fn schedule_release(self: &Arc<Self>, id: Uuid, after: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            store.release(id).await;
        })
    }

    /// Whether a committed artifact is still present.
    pub async fn contains(&self, id: Uuid) -> bool {
        self.live.lock().await.contains_key(&id)
    }

    pub async fn live_count(&self) -> usize {
        self.live.lock().await.len()
    }

    /// Reclaim committed artifacts older than the grace period. Lazy releases
    /// handle the common case; this catches anything whose deferred-release
    /// task died with a previous failure.
    pub async fn sweep_stale(&self) -> usize {
        let stale: Vec<Uuid> = {
            let live = self.live.lock().await;
            live.iter()
                .filter(|(_, a)| a.committed_at.elapsed() >= self.grace)
                .map(|(id, _)| *id)
                .collect()
        };

        let mut released = 0;
        for id in stale {
            if self.release(id).await {
                released += 1;
            }
        }

        if released > 0 {
            tracing::info!(released, "Swept stale artifacts");
        }
        released
    }

    /// Start the background sweeper. Returns a JoinHandle for shutdown.
    pub fn start_sweeper(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut sweep_interval = interval(every);
            // The first tick fires immediately; skip it
            sweep_interval.tick().await;

            loop {
                sweep_interval.tick().await;
                self.sweep_stale().await;
            }
        })
    }

    /// Look up a committed artifact's current reference, if still live.
    pub async fn get(&self, id: Uuid) -> StoreResult<ArtifactRef> {
        let path = {
            let live = self.live.lock().await;
            live.get(&id)
                .map(|artifact| artifact.path.clone())
                .ok_or(StoreError::NotFound(id))?
        };
        let metadata = tokio::fs::metadata(&path).await?;
        Ok(ArtifactRef {
            id,
            path,
            size_bytes: metadata.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_in(dir: &tempfile::TempDir) -> Arc<ArtifactStore> {
        Arc::new(
            ArtifactStore::new(dir.path().join("artifacts"), Duration::from_millis(50))
                .await
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn acquire_commit_release_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        let handle = store.acquire(ArtifactKind::Download, "mp3");
        tokio::fs::write(handle.path(), b"media bytes").await.unwrap();

        let artifact = store.commit(handle).await.unwrap();
        assert_eq!(artifact.size_bytes, 11);
        assert!(store.contains(artifact.id).await);
        assert!(artifact.path.exists());

        assert!(store.release(artifact.id).await);
        assert!(!artifact.path.exists());
        assert!(!store.contains(artifact.id).await);
        assert!(!store.release(artifact.id).await);
    }

    #[tokio::test]
    async fn dropped_handle_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        let path = {
            let handle = store.acquire(ArtifactKind::InboundClip, "ogg");
            tokio::fs::write(handle.path(), b"sample").await.unwrap();
            handle.path().to_path_buf()
        };

        assert!(!path.exists(), "uncommitted artifact must be removed on drop");
        assert_eq!(store.live_count().await, 0);
    }

    #[tokio::test]
    async fn dropping_handle_without_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        drop(store.acquire(ArtifactKind::Download, "mp4"));
    }

    #[tokio::test]
    async fn sweep_reclaims_artifacts_past_grace() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        let handle = store.acquire(ArtifactKind::Download, "mp3");
        tokio::fs::write(handle.path(), b"x").await.unwrap();
        let artifact = store.commit(handle).await.unwrap();

        assert_eq!(store.sweep_stale().await, 0, "fresh artifact must survive");

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(store.sweep_stale().await, 1);
        assert!(!artifact.path.exists());
    }

    #[tokio::test]
    async fn scheduled_release_fires() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        let handle = store.acquire(ArtifactKind::Download, "mp3");
        tokio::fs::write(handle.path(), b"x").await.unwrap();
        let artifact = store.commit(handle).await.unwrap();

        store
            .schedule_release(artifact.id, Duration::from_millis(20))
            .await
            .unwrap();
        assert!(!store.contains(artifact.id).await);
        assert!(!artifact.path.exists());
    }

    #[tokio::test]
    async fn get_reflects_liveness() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        let handle = store.acquire(ArtifactKind::Download, "mp3");
        tokio::fs::write(handle.path(), b"abcdef").await.unwrap();
        let artifact = store.commit(handle).await.unwrap();

        let found = store.get(artifact.id).await.unwrap();
        assert_eq!(found.path, artifact.path);
        assert_eq!(found.size_bytes, 6);

        store.release(artifact.id).await;
        assert!(matches!(
            store.get(artifact.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_acquisitions_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                let handle = store.acquire(ArtifactKind::Download, "bin");
                tokio::fs::write(handle.path(), b"data").await.unwrap();
                store.commit(handle).await.unwrap()
            }));
        }

        let mut ids = std::collections::HashSet::new();
        for task in tasks {
            let artifact = task.await.unwrap();
            assert!(ids.insert(artifact.id), "handles must not collide");
        }
        assert_eq!(store.live_count().await, 8);
    }
}
