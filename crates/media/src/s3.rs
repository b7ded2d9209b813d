//! S3-compatible media storage backend.

use crate::error::{MediaError, MediaResult};
use crate::traits::{MediaStore, StoredAsset, generate_key, validate_key};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::instrument;

/// Configuration for the S3 backend.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub prefix: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub force_path_style: bool,
    pub public_base_url: Option<String>,
}

/// S3-compatible media backend (AWS S3, MinIO, etc.).
#[derive(Debug)]
pub struct S3Backend {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    public_base_url: String,
}

impl S3Backend {
    /// Create a new S3 backend.
    ///
    /// Credentials come from the config when both halves are set,
    /// otherwise from the default provider chain (env vars, IAM role).
    pub async fn new(config: S3Config) -> MediaResult<Self> {
        if config.bucket.is_empty() {
            return Err(MediaError::Config("s3 bucket must not be empty".to_string()));
        }

        let region = config.region.clone().unwrap_or_else(|| "us-east-1".to_string());
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.clone()));

        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "pinboard-config",
            ));
        }

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(normalize_endpoint(endpoint));
        }
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        let client = Client::from_conf(builder.build());

        let prefix = config
            .prefix
            .as_deref()
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty());

        // Derived URL prefix when no CDN override is configured.
        let public_base_url = match &config.public_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => match &config.endpoint {
                Some(endpoint) => format!(
                    "{}/{}",
                    normalize_endpoint(endpoint).trim_end_matches('/'),
                    config.bucket
                ),
                None => format!("https://{}.s3.{region}.amazonaws.com", config.bucket),
            },
        };

        Ok(Self {
            client,
            bucket: config.bucket,
            prefix,
            public_base_url,
        })
    }

    fn object_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}/{key}"),
            None => key.to_string(),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, self.object_key(key))
    }
}

/// Add an `http://` scheme to bare host:port endpoints.
fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

#[async_trait]
impl MediaStore for S3Backend {
    #[instrument(skip(self, data), fields(backend = "s3", size = data.len()))]
    async fn store(&self, data: Bytes, content_type: &str) -> MediaResult<StoredAsset> {
        let key = generate_key(content_type)?;
        let object_key = self.object_key(&key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .content_type(content_type)
            .body(ByteStream::from(data.clone()))
            .send()
            .await
            .map_err(|e| MediaError::S3(format!("put_object failed: {e}")))?;

        tracing::debug!(key = %object_key, size = data.len(), "stored media asset");

        Ok(StoredAsset {
            url: self.public_url(&key),
            storage_id: key,
        })
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn delete(&self, storage_id: &str) -> MediaResult<()> {
        validate_key(storage_id)?;
        let object_key = self.object_key(storage_id);

        // S3 DeleteObject succeeds for absent keys, so a missing asset
        // is indistinguishable from a deleted one here.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| MediaError::S3(format!("delete_object failed: {e}")))?;

        tracing::debug!(key = %object_key, "deleted media asset");
        Ok(())
    }

    async fn health_check(&self) -> MediaResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| MediaError::S3(format!("head_bucket failed: {e}")))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("localhost:9000"), "http://localhost:9000");
        assert_eq!(normalize_endpoint("http://minio:9000"), "http://minio:9000");
        assert_eq!(
            normalize_endpoint("https://s3.example.com"),
            "https://s3.example.com"
        );
    }

    #[tokio::test]
    async fn test_url_derivation() {
        let backend = S3Backend::new(S3Config {
            bucket: "assets".to_string(),
            endpoint: Some("minio:9000".to_string()),
            region: None,
            prefix: Some("/media/".to_string()),
            access_key_id: Some("test".to_string()),
            secret_access_key: Some("test".to_string()),
            force_path_style: true,
            public_base_url: None,
        })
        .await
        .unwrap();

        assert_eq!(
            backend.public_url("abc.png"),
            "http://minio:9000/assets/media/abc.png"
        );
    }

    #[tokio::test]
    async fn test_public_base_url_override() {
        let backend = S3Backend::new(S3Config {
            bucket: "assets".to_string(),
            endpoint: None,
            region: Some("eu-west-1".to_string()),
            prefix: None,
            access_key_id: Some("test".to_string()),
            secret_access_key: Some("test".to_string()),
            force_path_style: false,
            public_base_url: Some("https://cdn.example.com/".to_string()),
        })
        .await
        .unwrap();

        assert_eq!(backend.public_url("abc.jpg"), "https://cdn.example.com/abc.jpg");
    }
}
