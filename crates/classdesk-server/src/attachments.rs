//! On-disk attachment storage.
//!
//! Blobs are keyed by a fresh UUID, so client input never reaches the
//! filesystem path.  Size limits are enforced here, before the owning
//! complaint record is created.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ServerError;

#[derive(Debug, Clone)]
pub struct AttachmentStore {
    base_path: PathBuf,
    max_size: usize,
}

impl AttachmentStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::Internal(format!(
                "Failed to create attachment directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Attachment store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Store a blob and return its id together with the URL the stored
    /// complaint record will carry.
    pub async fn store(&self, data: &[u8]) -> Result<(Uuid, String), ServerError> {
        if data.is_empty() {
            return Err(ServerError::BadRequest("Empty attachment".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::AttachmentTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let id = Uuid::new_v4();
        let path = self.blob_path(&id);

        fs::write(&path, data).await.map_err(|e| {
            ServerError::Internal(format!("Failed to write attachment {}: {}", id, e))
        })?;

        debug!(id = %id, size = data.len(), "Stored attachment");
        Ok((id, format!("/attachments/{id}")))
    }

    pub async fn get(&self, id: Uuid) -> Result<Vec<u8>, ServerError> {
        let path = self.blob_path(&id);

        if !path.exists() {
            return Err(ServerError::AttachmentNotFound(id));
        }

        let data = fs::read(&path).await.map_err(|e| {
            ServerError::Internal(format!("Failed to read attachment {}: {}", id, e))
        })?;

        debug!(id = %id, size = data.len(), "Retrieved attachment");
        Ok(data)
    }

    /// Blob path derived from the UUID only; no client-controlled components.
    fn blob_path(&self, id: &Uuid) -> PathBuf {
        self.base_path.join(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (AttachmentStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = AttachmentStore::new(dir.path().to_path_buf(), 1024)
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_store_and_get() {
        let (store, _dir) = test_store().await;
        let data = b"pdf-bytes";

        let (id, url) = store.store(data).await.unwrap();
        assert_eq!(url, format!("/attachments/{id}"));

        let retrieved = store.get(id).await.unwrap();
        assert_eq!(retrieved, data);
    }

    #[tokio::test]
    async fn test_oversized_rejected() {
        let (store, _dir) = test_store().await;
        let data = vec![0u8; 2048];
        let err = store.store(&data).await.unwrap_err();
        assert!(matches!(err, ServerError::AttachmentTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_empty_rejected() {
        let (store, _dir) = test_store().await;
        assert!(store.store(b"").await.is_err());
    }

    #[tokio::test]
    async fn test_not_found() {
        let (store, _dir) = test_store().await;
        let missing = Uuid::new_v4();
        assert!(matches!(
            store.get(missing).await,
            Err(ServerError::AttachmentNotFound(_))
        ));
    }
}
