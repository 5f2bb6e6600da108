//! Credential record persistence.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       CredentialStore                    │
//! │  - fetch(): whole-document read          │
//! │  - persist(): whole-document overwrite   │
//! └─────────────────────────────────────────┘
//!          ↓                    ↑
//! ┌─────────────────────────────────────────┐
//! │       BlobStore (bucket, key) → bytes    │
//! │  - FileBlobStore   (local directory)     │
//! │  - HttpBlobStore   (object endpoint)     │
//! │  - S3BlobStore     (S3 bucket, SigV4)    │
//! │  - MemoryBlobStore (in-process)          │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Writes are unconditional: there is no compare-and-swap, so two functions
//! refreshing at the same time race and the later write wins.

mod file;
mod http;
mod memory;
mod s3;

pub use file::FileBlobStore;
pub use http::HttpBlobStore;
pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::{Error, Result};
use crate::record::CredentialRecord;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Whole-object key-value storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read an object. Missing objects are `Error::NotFound`.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Create or replace an object.
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;
}

/// Build the configured backend.
pub fn from_config(config: &StoreConfig) -> Result<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config.backend {
        StoreBackend::File => Arc::new(FileBlobStore::new(config.root.clone())),
        StoreBackend::Http => {
            let endpoint = config.endpoint.clone().ok_or_else(|| {
                Error::Config("store.endpoint is required for the http store backend".to_string())
            })?;
            Arc::new(HttpBlobStore::new(endpoint, config.bearer_token.clone())?)
        }
        StoreBackend::S3 => Arc::new(S3BlobStore::from_config(config)),
        StoreBackend::Memory => Arc::new(MemoryBlobStore::new()),
    };
    Ok(store)
}

/// Reads and writes the credential record object.
#[derive(Clone)]
pub struct CredentialStore {
    blobs: Arc<dyn BlobStore>,
    bucket: String,
    key: String,
}

impl CredentialStore {
    pub fn new(blobs: Arc<dyn BlobStore>, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            blobs,
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Read the whole record. Never cached.
    pub async fn fetch(&self) -> Result<CredentialRecord> {
        debug!(bucket = %self.bucket, key = %self.key, "Fetching credential record");
        let bytes = self.blobs.get(&self.bucket, &self.key).await?;
        CredentialRecord::from_slice(&bytes)
    }

    /// Overwrite the whole record.
    pub async fn persist(&self, record: &CredentialRecord) -> Result<()> {
        debug!(bucket = %self.bucket, key = %self.key, "Persisting credential record");
        let bytes = record.to_vec()?;
        self.blobs.put(&self.bucket, &self.key, bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Platform;
    use chrono::Utc;

    const RECORD: &str = r#"{
        "base": {"currentToken": {"accessToken": "A", "createdTime": "2024-01-01 00:00:00.000"}, "oldToken": {}},
        "instagram": {"currentToken": {"accessToken": "IG"}, "oldToken": {}}
    }"#;

    #[tokio::test]
    async fn test_fetch_missing_object() {
        let store = CredentialStore::new(Arc::new(MemoryBlobStore::new()), "tokens", "creds.json");

        let err = store.fetch().await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_fetch_update_persist_preserves_other_platforms() {
        let blobs = Arc::new(MemoryBlobStore::new());
        blobs.insert("tokens", "creds.json", RECORD.as_bytes().to_vec());
        let store = CredentialStore::new(blobs.clone(), "tokens", "creds.json");

        let mut record = store.fetch().await.unwrap();
        record.rotate(Platform::Base, "B", Utc::now()).unwrap();
        store.persist(&record).await.unwrap();

        let reread = store.fetch().await.unwrap();
        assert_eq!(reread.current_token(Platform::Base).unwrap(), "B");
        assert_eq!(reread.current_token(Platform::Instagram).unwrap(), "IG");
        assert_eq!(
            reread.platform(Platform::Base).unwrap().old_token.access_token.as_deref(),
            Some("A")
        );
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_record() {
        let blobs = Arc::new(MemoryBlobStore::new());
        blobs.insert("tokens", "creds.json", b"\"just a string\"".to_vec());
        let store = CredentialStore::new(blobs, "tokens", "creds.json");

        let err = store.fetch().await.unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(_)));
    }

    #[test]
    fn test_from_config_http_without_endpoint() {
        let config = StoreConfig {
            backend: StoreBackend::Http,
            root: "data".into(),
            endpoint: None,
            bearer_token: None,
            region: None,
            access_key_id: None,
            secret_access_key: None,
            bucket: "tokens".to_string(),
            object: "creds.json".to_string(),
        };
        assert!(matches!(from_config(&config), Err(Error::Config(_))));
    }
}
