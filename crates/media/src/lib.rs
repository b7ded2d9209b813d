//! Media asset storage for the pinboard backend.
//!
//! Uploaded images go through a [`MediaStore`]: stored once under a
//! generated key, addressed by a public URL, and deleted by an opaque
//! handle when the owning post goes away.

pub mod error;
pub mod filesystem;
pub mod s3;
pub mod traits;

pub use error::{MediaError, MediaResult};
pub use filesystem::FilesystemBackend;
pub use s3::{S3Backend, S3Config};
pub use traits::{MediaStore, StoredAsset};

use pinboard_core::config::MediaConfig;
use std::sync::Arc;

/// Create a media store from configuration.
pub async fn from_config(config: &MediaConfig) -> MediaResult<Arc<dyn MediaStore>> {
    config.validate().map_err(MediaError::Config)?;

    match config {
        MediaConfig::Filesystem {
            path,
            public_base_url,
        } => {
            let backend = FilesystemBackend::new(path, public_base_url).await?;
            Ok(Arc::new(backend) as Arc<dyn MediaStore>)
        }
        MediaConfig::S3 {
            bucket,
            endpoint,
            region,
            prefix,
            access_key_id,
            secret_access_key,
            force_path_style,
            public_base_url,
        } => {
            let backend = S3Backend::new(S3Config {
                bucket: bucket.clone(),
                endpoint: endpoint.clone(),
                region: region.clone(),
                prefix: prefix.clone(),
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
                force_path_style: *force_path_style,
                public_base_url: public_base_url.clone(),
            })
            .await?;
            Ok(Arc::new(backend) as Arc<dyn MediaStore>)
        }
    }
}
