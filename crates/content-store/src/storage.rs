//! Object storage backend abstraction (S3/MinIO/local filesystem/memory).

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use serde::{Deserialize, Serialize};

use crate::error::{ContentStoreError, Result};
use crate::locks::KeyedLocks;

/// Configuration for the content storage backend.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentStoreConfig {
    /// In-memory storage (for testing)
    #[default]
    Memory,

    /// Local filesystem storage
    Local {
        /// Path to the storage directory
        path: PathBuf,
    },

    /// S3-compatible storage (AWS S3, MinIO, etc.)
    S3 {
        /// S3 endpoint URL (e.g., "http://localhost:9000" for MinIO)
        endpoint: String,
        /// Access key ID
        access_key: String,
        /// Secret access key
        secret_key: String,
        /// Bucket name
        bucket: String,
        /// Optional region (defaults to "us-east-1")
        region: Option<String>,
    },
}

impl ContentStoreConfig {
    pub fn backend_name(&self) -> &'static str {
        match self {
            ContentStoreConfig::Memory => "memory",
            ContentStoreConfig::Local { .. } => "local",
            ContentStoreConfig::S3 { .. } => "s3",
        }
    }
}

/// Byte storage keyed by opaque content keys.
///
/// Cloning is cheap and clones share both the backend and the lock table.
#[derive(Debug, Clone)]
pub struct ContentStore {
    inner: Arc<dyn ObjectStore>,
    locks: KeyedLocks,
}

impl ContentStore {
    /// Create a new content store from configuration.
    pub async fn new(config: ContentStoreConfig) -> Result<Self> {
        let inner: Arc<dyn ObjectStore> = match &config {
            ContentStoreConfig::Memory => Arc::new(InMemory::new()),

            ContentStoreConfig::Local { path } => {
                tokio::fs::create_dir_all(path).await?;
                Arc::new(
                    LocalFileSystem::new_with_prefix(path)
                        .map_err(|e| ContentStoreError::InvalidConfig(e.to_string()))?,
                )
            }

            ContentStoreConfig::S3 {
                endpoint,
                access_key,
                secret_key,
                bucket,
                region,
            } => {
                let builder = AmazonS3Builder::new()
                    .with_endpoint(endpoint)
                    .with_access_key_id(access_key)
                    .with_secret_access_key(secret_key)
                    .with_bucket_name(bucket)
                    .with_region(region.as_deref().unwrap_or("us-east-1"))
                    .with_allow_http(endpoint.starts_with("http://"));

                let store: Arc<dyn ObjectStore> = Arc::new(
                    builder
                        .build()
                        .map_err(|e| ContentStoreError::InvalidConfig(e.to_string()))?,
                );

                // Fail fast if the bucket doesn't exist
                {
                    use futures::TryStreamExt;
                    let prefix = ObjectPath::from("");
                    let mut stream = store.list(Some(&prefix));
                    match stream.try_next().await {
                        Ok(_) => {}
                        Err(object_store::Error::NotFound { .. }) => {
                            return Err(ContentStoreError::BucketNotFound(bucket.clone()));
                        }
                        Err(e) => {
                            let msg = e.to_string();
                            if msg.contains("NoSuchBucket")
                                || msg.contains("bucket") && msg.contains("not")
                            {
                                return Err(ContentStoreError::BucketNotFound(bucket.clone()));
                            }
                            return Err(e.into());
                        }
                    }
                }

                store
            }
        };

        tracing::debug!(backend = config.backend_name(), "content store ready");
        Ok(Self {
            inner,
            locks: KeyedLocks::default(),
        })
    }

    /// Create an in-memory content store.
    pub fn memory() -> Self {
        Self {
            inner: Arc::new(InMemory::new()),
            locks: KeyedLocks::default(),
        }
    }

    /// The per-key lock table shared by every clone of this store.
    pub fn locks(&self) -> &KeyedLocks {
        &self.locks
    }

    /// Build the object path for a key's content.
    fn data_path(key: &str) -> Result<ObjectPath> {
        let valid = !key.is_empty()
            && key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !valid {
            return Err(ContentStoreError::InvalidKey(key.to_string()));
        }
        Ok(ObjectPath::from(format!("data/{}", key)))
    }

    /// Store the full content for `key`, replacing any previous object.
    ///
    /// Every backend commits a put as a whole: the local filesystem backend
    /// stages to a temporary file and renames it into place, S3 objects
    /// appear atomically.
    pub async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let path = Self::data_path(key)?;
        let size = data.len();
        self.inner.put(&path, data.into()).await?;
        tracing::debug!(key, size, "content stored");
        Ok(())
    }

    /// Get the content for `key`, `None` if nothing is stored.
    pub async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let path = Self::data_path(key)?;
        match self.inner.get(&path).await {
            Ok(result) => {
                let bytes = result.bytes().await?;
                Ok(Some(bytes))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the content for `key`. Deleting absent content succeeds.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = Self::data_path(key)?;
        match self.inner.delete(&path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Check if content exists for `key`.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = Self::data_path(key)?;
        match self.inner.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// List every key with stored content.
    pub async fn list_keys(&self) -> Result<Vec<String>> {
        use futures::TryStreamExt;

        let prefix = ObjectPath::from("data/");
        let items: Vec<_> = self.inner.list(Some(&prefix)).try_collect().await?;

        Ok(items
            .into_iter()
            .filter_map(|meta| {
                meta.location
                    .as_ref()
                    .strip_prefix("data/")
                    .map(|s| s.to_string())
            })
            .collect())
    }
}
