//! Filesystem-backed blob storage for temporary audio.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{BlobRef, BlobStore};
use crate::error::TranscriptionError;

/// Stores each blob as a file named by its key under one directory.
#[derive(Clone, Debug)]
pub struct LocalBlobStore {
  dir: PathBuf,
}

impl LocalBlobStore {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  fn path_for(&self, key: &str) -> Result<PathBuf, TranscriptionError> {
    if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
      return Err(TranscriptionError::Storage(format!("invalid blob key '{key}'")));
    }
    Ok(self.dir.join(key))
  }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
  #[instrument(level = "debug", skip(self, bytes), fields(len = bytes.len(), %content_type))]
  async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<BlobRef, TranscriptionError> {
    let path = self.path_for(key)?;
    tokio::fs::create_dir_all(&self.dir)
      .await
      .map_err(|e| TranscriptionError::Storage(format!("create {}: {e}", self.dir.display())))?;
    tokio::fs::write(&path, bytes)
      .await
      .map_err(|e| TranscriptionError::Storage(format!("write {}: {e}", path.display())))?;
    debug!(target: "speech", %key, "Blob stored");
    Ok(BlobRef { uri: format!("file://{}", path.display()), key: key.to_string() })
  }

  async fn get(&self, blob: &BlobRef) -> Result<Vec<u8>, TranscriptionError> {
    let path = self.path_for(&blob.key)?;
    tokio::fs::read(&path)
      .await
      .map_err(|e| TranscriptionError::Storage(format!("read {}: {e}", path.display())))
  }

  async fn delete(&self, key: &str) -> Result<(), TranscriptionError> {
    let path = self.path_for(key)?;
    match tokio::fs::remove_file(&path).await {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(TranscriptionError::Storage(format!("delete {}: {e}", path.display()))),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn put_get_delete() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = LocalBlobStore::new(dir.path().join("blobs"));
    let blob = store.put("take-1.wav", b"RIFF....".to_vec(), "audio/wav").await.expect("put");
    assert_eq!(blob.key, "take-1.wav");
    assert!(blob.uri.starts_with("file://"));
    assert_eq!(store.get(&blob).await.expect("get"), b"RIFF....");

    store.delete(&blob.key).await.expect("delete");
    assert!(store.get(&blob).await.is_err());
    store.delete(&blob.key).await.expect("second delete is a no-op");
    store.delete("never-written.wav").await.expect("unknown key is a no-op");
  }

  #[tokio::test]
  async fn rejects_keys_outside_the_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = LocalBlobStore::new(dir.path());
    let evil = BlobRef { key: "../etc/passwd".into(), uri: String::new() };
    assert!(matches!(store.get(&evil).await, Err(TranscriptionError::Storage(_))));
    assert!(matches!(store.put("../x.wav", vec![1], "audio/wav").await, Err(TranscriptionError::Storage(_))));
  }
}
