use super::BlobStore;
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};

/// Objects in an S3 bucket, or any S3-compatible service behind
/// `store.endpoint`.
///
/// Region and credentials not set in the configuration are taken from the
/// standard `AWS_*` environment variables, then from the instance or task
/// role. Requests are path-style: `{endpoint}/{bucket}/{key}`.
pub struct S3BlobStore {
    builder: AmazonS3Builder,
}

impl S3BlobStore {
    pub fn from_config(config: &StoreConfig) -> Self {
        let mut builder = AmazonS3Builder::from_env();
        if let Some(region) = &config.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            builder = builder
                .with_access_key_id(key_id)
                .with_secret_access_key(secret);
        }
        Self { builder }
    }

    fn bucket(&self, bucket: &str) -> Result<AmazonS3> {
        self.builder
            .clone()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| Error::Config(format!("invalid S3 configuration: {}", e)))
    }
}

fn object_path(key: &str) -> Result<Path> {
    Path::parse(key).map_err(|e| Error::StoreAccess(format!("invalid object name '{}': {}", key, e)))
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let store = self.bucket(bucket)?;
        let location = object_path(key)?;

        let result = match store.get(&location).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(Error::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
            }
            Err(e) => {
                return Err(Error::StoreAccess(format!(
                    "GET s3://{}/{} failed: {}",
                    bucket, key, e
                )))
            }
        };

        let bytes = result.bytes().await.map_err(|e| {
            Error::StoreAccess(format!("failed to read s3://{}/{}: {}", bucket, key, e))
        })?;
        Ok(bytes.to_vec())
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let store = self.bucket(bucket)?;
        let location = object_path(key)?;

        store
            .put(&location, PutPayload::from(body))
            .await
            .map_err(|e| Error::StoreAccess(format!("PUT s3://{}/{} failed: {}", bucket, key, e)))?;
        Ok(())
    }
}
