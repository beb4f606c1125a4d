// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Avatar file storage.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Errors from file storage operations.
#[derive(Debug, thiserror::Error)]
pub enum FileStorageError {
    #[error("Invalid file key: {0}")]
    InvalidKey(String),

    #[error("Failed to delete file: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Delete a file by key. Missing files are not an error.
    async fn delete(&self, key: &str) -> Result<(), FileStorageError>;
}

/// Files stored under a local directory, keyed by file name.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a key to a path inside the root, rejecting traversal.
    fn path_for(&self, key: &str) -> Result<PathBuf, FileStorageError> {
        let valid = !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains('/')
            && !key.contains('\\');
        if !valid {
            return Err(FileStorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn delete(&self, key: &str) -> Result<(), FileStorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Deleted avatar");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
