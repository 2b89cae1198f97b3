//! A concrete local storage driver backed by the filesystem.
//!
//! Stands in for the "disk" driver in `spec.md`'s glossary: a driver
//! need only honor `get`/`put`/`delete` over opaque locator URLs. This
//! one uses `file://` paths under a configured root directory, with the
//! fully-qualified id's `:` and `/` characters escaped so one file name
//! cannot traverse into another datastore's namespace.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::drivers::StorageDriver;
use crate::error::{GatewayError, Result};

pub struct DiskDriver {
    name: String,
    root: PathBuf,
}

impl DiskDriver {
    pub fn new(name: impl Into<String>, root: PathBuf) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }

    fn path_for(&self, fq_id: &str) -> PathBuf {
        let escaped = fq_id.replace(':', "__").replace('/', "_");
        self.root.join(escaped)
    }

    fn url_for(&self, path: &Path) -> String {
        format!("file://{}", path.display())
    }
}

#[async_trait]
impl StorageDriver for DiskDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_local(&self) -> bool {
        true
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let path = url
            .strip_prefix("file://")
            .ok_or_else(|| GatewayError::upstream(format!("unsupported url scheme: {url}")))?;
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| GatewayError::upstream(format!("disk read failed: {e}")))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .await
            .map_err(|e| GatewayError::upstream(format!("disk read failed: {e}")))?;
        Ok(buf)
    }

    async fn put(&self, fq_id: &str, bytes: &[u8]) -> Result<Vec<String>> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.path_for(fq_id);
        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(bytes).await?;
        Ok(vec![self.url_for(&path)])
    }

    async fn delete(&self, fq_id: &str) -> Result<()> {
        let path = self.path_for(fq_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn locate(&self, fq_id: &str) -> Option<String> {
        Some(self.url_for(&self.path_for(fq_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let driver = DiskDriver::new("disk", dir.path().to_path_buf());
        let urls = driver.put("device-1:store-1/hello.txt", b"hi").await.unwrap();
        assert_eq!(urls.len(), 1);
        let bytes = driver.get(&urls[0]).await.unwrap();
        assert_eq!(bytes, b"hi");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let driver = DiskDriver::new("disk", dir.path().to_path_buf());
        driver.put("device-1:store-1/hello.txt", b"hi").await.unwrap();
        driver.delete("device-1:store-1/hello.txt").await.unwrap();
        driver.delete("device-1:store-1/hello.txt").await.unwrap();
    }

    #[tokio::test]
    async fn get_on_missing_file_errors() {
        let dir = tempdir().unwrap();
        let driver = DiskDriver::new("disk", dir.path().to_path_buf());
        let result = driver.get("file:///nonexistent/path").await;
        assert!(result.is_err());
    }
}
