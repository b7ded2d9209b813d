//! Media store trait definition.

use crate::error::{MediaError, MediaResult};
use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

/// A stored media asset: the public URL clients fetch it from and the
/// opaque handle needed to delete it later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    /// Publicly reachable URL for the asset.
    pub url: String,
    /// Backend deletion handle, persisted alongside the owning record.
    pub storage_id: String,
}

/// Abstract interface for media asset storage.
///
/// Backends are write-once: assets are stored under a generated key and
/// never overwritten. Serving bytes back is the job of a web tier or
/// CDN, not this trait.
#[async_trait]
pub trait MediaStore: Send + Sync + std::fmt::Debug {
    /// Store an image and return its public URL and deletion handle.
    async fn store(&self, data: Bytes, content_type: &str) -> MediaResult<StoredAsset>;

    /// Delete a stored asset by its handle.
    ///
    /// Returns `NotFound` when the handle does not resolve to an asset.
    async fn delete(&self, storage_id: &str) -> MediaResult<()>;

    /// Check backend connectivity and health.
    async fn health_check(&self) -> MediaResult<()>;

    /// Get backend name for logging and metrics.
    fn backend_name(&self) -> &'static str;
}

/// Map an image content type to its canonical file extension.
///
/// Anything outside this list is rejected before it reaches a backend.
pub fn extension_for(content_type: &str) -> MediaResult<&'static str> {
    match content_type {
        "image/jpeg" => Ok("jpg"),
        "image/png" => Ok("png"),
        "image/gif" => Ok("gif"),
        "image/webp" => Ok("webp"),
        other => Err(MediaError::UnsupportedContentType(other.to_string())),
    }
}

/// Generate a fresh storage key for an upload: a random UUID plus the
/// extension derived from the content type.
pub fn generate_key(content_type: &str) -> MediaResult<String> {
    let ext = extension_for(content_type)?;
    Ok(format!("{}.{ext}", Uuid::new_v4()))
}

/// Validate a storage key received from persisted state.
///
/// Keys are single path segments produced by [`generate_key`]; anything
/// with separators or traversal components is rejected.
pub fn validate_key(key: &str) -> MediaResult<()> {
    if key.is_empty() || key.len() > 255 {
        return Err(MediaError::InvalidKey(key.to_string()));
    }
    let ok = key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if !ok || key.contains("..") {
        return Err(MediaError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_for_known_types() {
        assert_eq!(extension_for("image/jpeg").unwrap(), "jpg");
        assert_eq!(extension_for("image/png").unwrap(), "png");
        assert!(extension_for("application/pdf").is_err());
        assert!(extension_for("text/html").is_err());
    }

    #[test]
    fn test_generated_keys_are_unique_and_valid() {
        let a = generate_key("image/png").unwrap();
        let b = generate_key("image/png").unwrap();
        assert_ne!(a, b);
        assert!(a.ends_with(".png"));
        validate_key(&a).unwrap();
    }

    #[test]
    fn test_validate_key_rejects_traversal() {
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("a/b.png").is_err());
        assert!(validate_key("").is_err());
        assert!(validate_key("ok-file_1.png").is_ok());
    }
}
