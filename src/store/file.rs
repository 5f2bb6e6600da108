use super::BlobStore;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Objects stored as files under `root/<bucket>/<key>`.
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        for part in [bucket, key] {
            let path = Path::new(part);
            let plain = !part.is_empty()
                && path
                    .components()
                    .all(|component| matches!(component, Component::Normal(_)));
            if !plain {
                return Err(Error::StoreAccess(format!("invalid object name '{}'", part)));
            }
        }
        Ok(self.root.join(bucket).join(key))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(bucket, key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(Error::StoreAccess(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Uses atomic write: writes to a `.tmp` sibling, fsyncs, then renames,
    /// so readers never see a partial document.
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        let store_err =
            |what: &str, e: std::io::Error| Error::StoreAccess(format!("{} {}: {}", what, path.display(), e));

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| store_err("failed to create directory for", e))?;
        }

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        {
            let mut file = fs::File::create(&tmp_path)
                .await
                .map_err(|e| store_err("failed to create temporary file for", e))?;
            file.write_all(&body)
                .await
                .map_err(|e| store_err("failed to write", e))?;
            file.sync_all()
                .await
                .map_err(|e| store_err("failed to sync", e))?;
        }

        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| store_err("failed to replace", e))?;

        Ok(())
    }
}
