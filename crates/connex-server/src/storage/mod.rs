//! Blob storage behind the artifact cache
//!
//! [`BlobStore`] is the narrow contract the cache needs: put, get, list and
//! a time-limited signed URL. [`S3Store`] talks to S3 or MinIO,
//! [`MemoryStore`] keeps everything in process.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use aws_sdk_s3::{
    config::{Credentials, Region},
    presigning::PresigningConfig,
    primitives::ByteStream,
    Client,
};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

pub mod config;
pub mod memory;

pub use config::{StorageBackend, StorageConfig};
pub use memory::MemoryStore;

/// Key/value object store used by the cache.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()>;

    /// `None` when the key does not exist.
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>>;

    async fn list(&self, bucket: &str) -> Result<BTreeSet<String>>;

    /// Mint a read URL for `key` that stops working after `expires_in`.
    async fn presign(&self, bucket: &str, key: &str, expires_in: Duration) -> Result<String>;
}

/// Build the store selected by `config.backend`.
pub async fn init(config: &StorageConfig) -> Result<Arc<dyn BlobStore>> {
    match config.backend {
        StorageBackend::S3 => Ok(Arc::new(S3Store::new(config).await?)),
        StorageBackend::Memory => {
            info!("Using in-memory blob store; cached artifacts will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        },
    }
}

/// S3-compatible store (AWS or MinIO).
#[derive(Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        debug!(
            endpoint = ?config.endpoint,
            region = %config.region,
            path_style = config.path_style,
            "Initializing S3 store"
        );

        let mut builder = match config.static_credentials() {
            Some((access_key, secret_key)) => aws_sdk_s3::Config::builder()
                .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
                .credentials_provider(Credentials::new(
                    access_key,
                    secret_key,
                    None,
                    None,
                    "connex-storage",
                )),
            None => {
                let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
                    .region(Region::new(config.region.clone()))
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            },
        };

        builder = builder
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(builder.build());

        info!(bucket = %config.bucket, "S3 store initialized");

        Ok(Self { client })
    }
}

#[async_trait]
impl BlobStore for S3Store {
    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()> {
        let digest = sha256_digest(&data);
        let checksum = hex_digest(&digest);

        // S3 rejects the upload if the body does not hash to this value
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type("application/json")
            .checksum_sha256(BASE64.encode(digest))
            .body(ByteStream::from(data))
            .send()
            .await
            .with_context(|| format!("Failed to upload s3://{}/{}", bucket, key))?;

        info!(checksum = %checksum, "Uploaded s3://{}/{}", bucket, key);

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let response = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(response) => response,
            Err(err) => {
                if err
                    .as_service_error()
                    .map(|service_err| service_err.is_no_such_key())
                    .unwrap_or(false)
                {
                    debug!("s3://{}/{} does not exist", bucket, key);
                    return Ok(None);
                }
                return Err(err)
                    .with_context(|| format!("Failed to download s3://{}/{}", bucket, key));
            },
        };

        let data = response
            .body
            .collect()
            .await
            .context("Failed to read S3 response body")?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from s3://{}/{}", data.len(), bucket, key);

        Ok(Some(data))
    }

    #[instrument(skip(self))]
    async fn list(&self, bucket: &str) -> Result<BTreeSet<String>> {
        let mut keys = BTreeSet::new();
        let mut continuation: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .with_context(|| format!("Failed to list s3://{}", bucket))?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(|k| k.to_string())),
            );

            match response.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        Ok(keys)
    }

    #[instrument(skip(self))]
    async fn presign(&self, bucket: &str, key: &str, expires_in: Duration) -> Result<String> {
        let presigning_config = PresigningConfig::expires_in(expires_in)
            .context("Failed to create presigning config")?;

        let presigned_request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .context("Failed to generate presigned URL")?;

        Ok(presigned_request.uri().to_string())
    }
}

fn sha256_digest(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn hex_digest(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_digest() {
        let digest = sha256_digest(b"Hello, World!");
        assert_eq!(
            hex_digest(&digest),
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
        // Value sent as x-amz-checksum-sha256
        assert_eq!(
            BASE64.encode(digest),
            "3/1gIbsr1bCvZ2KQgJ7DpTGR3YHH9wpLKGiKNiGCmG8="
        );
    }

    #[tokio::test]
    async fn test_s3_presign_is_offline() {
        let store = S3Store::new(&StorageConfig::for_minio("http://localhost:9000", "bucket"))
            .await
            .unwrap();

        let url = store
            .presign("bucket", "cache/abc", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(url.starts_with("http://localhost:9000/bucket/cache/abc?"));
        assert!(url.contains("X-Amz-Expires=60"));
    }

    #[tokio::test]
    async fn test_init_memory_backend() {
        let store = init(&StorageConfig::in_memory("bucket")).await.unwrap();
        store.put("bucket", "k", b"v".to_vec()).await.unwrap();
        assert_eq!(store.get("bucket", "k").await.unwrap(), Some(b"v".to_vec()));
    }
}
