//! Filesystem-backed blob store
//!
//! Each namespace is a directory under the store root. Keys are hashed to
//! fixed-length file names so arbitrary asset ids are safe on disk. Writes
//! land in a temporary file that is renamed over the final name, which is
//! atomic on the same filesystem.

use crate::error::Result;
use crate::store::{validate_namespace, KeyValueBlobStore};
use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const TEMP_SUFFIX: &str = ".tmp";

/// A blob store keeping one file per key in `<root>/<namespace>/`
pub struct FileBlobStore {
    namespace: String,
    dir: PathBuf,
    temp_seq: AtomicU64,
}

impl FileBlobStore {
    /// Create a store for `namespace` under `root`. Nothing touches the
    /// filesystem until `init`.
    pub fn new(root: impl Into<PathBuf>, namespace: &str) -> Result<Self> {
        validate_namespace(namespace)?;
        let dir = root.into().join(namespace);

        Ok(Self {
            namespace: namespace.to_string(),
            dir,
            temp_seq: AtomicU64::new(0),
        })
    }

    /// Directory holding this namespace's blobs
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a key: hex SHA-256 of the key
    pub fn blob_name(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.dir.join(Self::blob_name(key))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        let seq = self.temp_seq.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!(
            "{}.{}.{}{}",
            Self::blob_name(key),
            std::process::id(),
            seq,
            TEMP_SUFFIX
        ))
    }

    /// Remove temporary files left behind by an interrupted write
    async fn sweep_temp_files(&self) -> Result<usize> {
        let mut removed = 0;
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if name.to_string_lossy().ends_with(TEMP_SUFFIX) {
                match fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(path = ?entry.path(), error = %e, "Failed to remove stale temp file"),
                }
            }
        }

        Ok(removed)
    }
}

#[async_trait]
impl KeyValueBlobStore for FileBlobStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let swept = self.sweep_temp_files().await?;
        info!(namespace = %self.namespace, dir = ?self.dir, swept, "Blob store initialized");
        Ok(())
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let temp = self.temp_path(key);

        let written = async {
            let mut file = fs::File::create(&temp).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            fs::rename(&temp, self.blob_path(key)).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        debug!(namespace = %self.namespace, key, size = bytes.len(), "Stored blob");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        match fs::read(self.blob_path(key)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.blob_path(key)).await {
            Ok(()) => {
                debug!(namespace = %self.namespace, key, "Deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_namespace(&self) -> Result<()> {
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(&self.dir).await?;
        info!(namespace = %self.namespace, "Cleared blob namespace");
        Ok(())
    }
}
