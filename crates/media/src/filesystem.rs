//! Filesystem-based media storage backend.

use crate::error::{MediaError, MediaResult};
use crate::traits::{MediaStore, StoredAsset, generate_key, validate_key};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Filesystem media backend.
///
/// Assets land in a flat directory; serving them is delegated to a web
/// tier pointed at the same directory, reachable under
/// `public_base_url`.
#[derive(Debug)]
pub struct FilesystemBackend {
    root: PathBuf,
    public_base_url: String,
}

impl FilesystemBackend {
    /// Create a new filesystem backend rooted at the given directory.
    pub async fn new(root: impl AsRef<Path>, public_base_url: &str) -> MediaResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn asset_path(&self, key: &str) -> MediaResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.public_base_url)
    }
}

#[async_trait]
impl MediaStore for FilesystemBackend {
    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    async fn store(&self, data: Bytes, content_type: &str) -> MediaResult<StoredAsset> {
        let key = generate_key(content_type)?;
        let final_path = self.asset_path(&key)?;

        // Write to a temp file then rename so a crash mid-write never
        // leaves a partial asset under its public key.
        let temp_path = final_path.with_extension(format!("tmp.{}", Uuid::new_v4()));
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        tracing::debug!(key = %key, size = data.len(), "stored media asset");

        Ok(StoredAsset {
            url: self.public_url(&key),
            storage_id: key,
        })
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, storage_id: &str) -> MediaResult<()> {
        let path = self.asset_path(storage_id)?;
        fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MediaError::NotFound(storage_id.to_string())
            } else {
                MediaError::Io(e)
            }
        })?;
        tracing::debug!(key = %storage_id, "deleted media asset");
        Ok(())
    }

    async fn health_check(&self) -> MediaResult<()> {
        let metadata = fs::metadata(&self.root).await?;
        if !metadata.is_dir() {
            return Err(MediaError::Config(format!(
                "media root is not a directory: {}",
                self.root.display()
            )));
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}
