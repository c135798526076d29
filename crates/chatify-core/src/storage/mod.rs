//! Blob stores for attachment bytes.
//!
//! Attachments are uploaded under a reference key and then resolved to a URL
//! that goes into the message payload.

mod fs;
mod r2;

pub use fs::FsBlobStore;
pub use r2::{R2BlobStore, R2Config};

/// Opaque handle of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHandle {
    key: String,
}

impl ObjectHandle {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Binary object storage.
#[allow(async_fn_in_trait)]
pub trait BlobStore {
    /// Store `bytes` under `key`.
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: Option<&str>,
    ) -> crate::Result<ObjectHandle>;

    /// Resolve a stored object to a URL a message can carry.
    async fn url(&self, handle: &ObjectHandle) -> crate::Result<String>;

    /// Remove a stored object. Removing a missing object succeeds.
    async fn delete(&self, handle: &ObjectHandle) -> crate::Result<()>;
}

pub(crate) fn normalize_object_key(object_key: &str) -> crate::Result<String> {
    let object_key = object_key.trim().trim_matches('/').to_string();
    if object_key.is_empty() {
        return Err(crate::Error::InvalidInput(
            "Attachment object_key cannot be empty".to_string(),
        ));
    }
    if object_key.split('/').any(|segment| segment == "..") {
        return Err(crate::Error::InvalidInput(format!(
            "Attachment object_key {object_key} escapes the store"
        )));
    }
    Ok(object_key)
}

/// Percent-encode every `/`-separated segment of a URL path.
pub(crate) fn encode_url_path(path: &str) -> String {
    path.split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}
