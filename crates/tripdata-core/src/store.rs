//! Local partition store: one immutable parquet file per (year, month) under
//! a configured root directory.

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::debug;

use crate::error::CoreError;
use crate::partition::PartitionKey;

pub struct PartitionStore {
    root: PathBuf,
}

impl PartitionStore {
    /// Creates the root directory if absent.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: PartitionKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    pub async fn exists(&self, key: PartitionKey) -> bool {
        tokio::fs::try_exists(self.path_for(key))
            .await
            .unwrap_or(false)
    }

    /// Reads the raw partition file. A missing file is `PartitionNotCached`,
    /// distinct from a read failure, so callers can fall back to a fetch.
    pub async fn read(&self, key: PartitionKey) -> Result<Bytes, CoreError> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!(%key, path = %path.display(), "read partition from local store");
                Ok(Bytes::from(bytes))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(CoreError::PartitionNotCached { key })
            }
            Err(err) => Err(CoreError::ReadFailed {
                key,
                reason: err.to_string(),
            }),
        }
    }

    /// Writes with overwrite semantics via a temp file and rename, so a
    /// crashed write never leaves a truncated partition behind.
    pub async fn write(&self, key: PartitionKey, bytes: &[u8]) -> Result<(), CoreError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("part");

        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|err| CoreError::WriteFailed {
                key,
                reason: format!("writing {}: {err}", tmp.display()),
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|err| CoreError::WriteFailed {
                key,
                reason: format!("renaming into place {}: {err}", path.display()),
            })?;

        debug!(%key, path = %path.display(), bytes = bytes.len(), "persisted partition file");
        Ok(())
    }
}
