//! Filesystem blob store used when no object storage is configured.

use std::path::{Path, PathBuf};

use tokio::fs;

use super::{encode_url_path, normalize_object_key, BlobStore, ObjectHandle};
use crate::{Error, Result};

/// Stores blobs as files under a root directory and hands out `file://` URLs.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl BlobStore for FsBlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        _content_type: Option<&str>,
    ) -> Result<ObjectHandle> {
        let key = normalize_object_key(key)?;
        let path = self.file_path(&key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await.map_err(|error| {
            Error::Storage(format!("Failed to write {}: {error}", path.display()))
        })?;
        tracing::debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(ObjectHandle::new(key))
    }

    async fn url(&self, handle: &ObjectHandle) -> Result<String> {
        let path = self.file_path(handle.key());
        if !fs::try_exists(&path).await? {
            return Err(Error::Storage(format!(
                "Object {} does not exist",
                handle.key()
            )));
        }
        let path = path.to_string_lossy().replace('\\', "/");
        Ok(format!("file://{}", encode_url_path(&path)))
    }

    async fn delete(&self, handle: &ObjectHandle) -> Result<()> {
        let path = self.file_path(&normalize_object_key(handle.key())?);
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("Removed {}", path.display());
                Ok(())
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(Error::Storage(format!(
                "Failed to remove {}: {error}",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Payload;

    #[tokio::test]
    async fn put_then_url_points_at_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().join("blobs")).unwrap();

        let handle = store
            .put("u1-5-photo.jpg", b"jpeg", Some("image/jpeg"))
            .await
            .unwrap();
        let url = store.url(&handle).await.unwrap();

        assert!(url.starts_with("file://"));
        assert!(url.ends_with("u1-5-photo.jpg"));
        assert!(Payload::image(&url).is_ok());
        assert_eq!(
            std::fs::read(store.root().join("u1-5-photo.jpg")).unwrap(),
            b"jpeg"
        );
    }

    #[tokio::test]
    async fn url_encodes_reserved_characters_in_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path()).unwrap();

        let handle = store
            .put("u1-1-my photo#1.jpg", b"jpeg", Some("image/jpeg"))
            .await
            .unwrap();
        let url = store.url(&handle).await.unwrap();

        assert!(url.ends_with("/u1-1-my%20photo%231.jpg"), "{url}");
        assert!(!url.contains(' '));
        assert!(Payload::image(&url).is_ok());
        assert!(store.root().join("u1-1-my photo#1.jpg").exists());
    }

    #[tokio::test]
    async fn delete_removes_the_file_and_tolerates_repeats() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path()).unwrap();

        let handle = store.put("u1-7-note.wav", b"riff", None).await.unwrap();
        store.delete(&handle).await.unwrap();

        assert!(!store.root().join("u1-7-note.wav").exists());
        assert!(store.url(&handle).await.is_err());
        store.delete(&handle).await.unwrap();
    }

    #[tokio::test]
    async fn url_of_missing_object_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path()).unwrap();
        let error = store.url(&ObjectHandle::new("missing")).await.unwrap_err();
        assert!(matches!(error, Error::Storage(_)));
    }
}
