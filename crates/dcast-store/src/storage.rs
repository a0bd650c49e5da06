//! Object storage for rendered artifacts.
//!
//! Uploads return the public URL recorded on the job document, so the
//! backing store (R2 in production, memory in tests) owns URL construction.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};

/// Upload seam for video, audio, and caption artifacts.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload a local file under `key` and return its public URL.
    async fn upload_file(
        &self,
        path: &Path,
        key: &str,
        content_type: &str,
    ) -> StoreResult<String>;
}

/// Configuration for the R2 (S3-compatible) client.
#[derive(Debug, Clone)]
pub struct R2Config {
    /// S3 API endpoint
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    /// Region, usually "auto" for R2
    pub region: String,
    /// Base URL artifacts are served from (custom domain or r2.dev)
    pub public_base_url: String,
}

impl R2Config {
    /// Create config from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("R2_ENDPOINT_URL")
                .map_err(|_| StoreError::config("R2_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("R2_ACCESS_KEY_ID")
                .map_err(|_| StoreError::config("R2_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("R2_SECRET_ACCESS_KEY")
                .map_err(|_| StoreError::config("R2_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("R2_BUCKET_NAME")
                .map_err(|_| StoreError::config("R2_BUCKET_NAME not set"))?,
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
            public_base_url: std::env::var("R2_PUBLIC_BASE_URL")
                .map_err(|_| StoreError::config("R2_PUBLIC_BASE_URL not set"))?,
        })
    }
}

/// Cloudflare R2 storage client.
#[derive(Clone)]
pub struct R2Storage {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl R2Storage {
    pub async fn new(config: R2Config) -> StoreResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn from_env() -> StoreResult<Self> {
        Self::new(R2Config::from_env()?).await
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

#[async_trait]
impl ObjectStorage for R2Storage {
    async fn upload_file(
        &self,
        path: &Path,
        key: &str,
        content_type: &str,
    ) -> StoreResult<String> {
        debug!(path = %path.display(), key, "uploading artifact");

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StoreError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StoreError::upload_failed(e.to_string()))?;

        let url = self.public_url(key);
        info!(key, url = %url, "artifact uploaded");
        Ok(url)
    }
}

/// In-memory object storage recording uploaded keys.
#[derive(Default)]
pub struct MemoryObjectStorage {
    /// key → (content_type, byte length)
    uploads: Arc<RwLock<HashMap<String, (String, u64)>>>,
}

impl MemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn uploaded_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.uploads.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn upload_file(
        &self,
        path: &Path,
        key: &str,
        content_type: &str,
    ) -> StoreResult<String> {
        let size = tokio::fs::metadata(path).await?.len();
        self.uploads
            .write()
            .await
            .insert(key.to_string(), (content_type.to_string(), size));
        Ok(format!("https://storage.test/{key}"))
    }
}
