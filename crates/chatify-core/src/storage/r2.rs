//! Cloudflare R2 blob store.
//!
//! Attachments are written through the S3-compatible API and read back by
//! clients from the bucket's public base URL.

use std::env;
use std::fmt;

use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_types::region::Region;

use super::{encode_url_path, normalize_object_key, BlobStore, ObjectHandle};
use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

const ENV_ACCOUNT_ID: &str = "R2_ACCOUNT_ID";
const ENV_BUCKET: &str = "R2_BUCKET";
const ENV_ACCESS_KEY_ID: &str = "R2_ACCESS_KEY_ID";
const ENV_SECRET_ACCESS_KEY: &str = "R2_SECRET_ACCESS_KEY";
const ENV_PUBLIC_BASE_URL: &str = "R2_PUBLIC_BASE_URL";

const CREDENTIALS_PROVIDER: &str = "chatify-attachments";

/// Bucket, credentials and public URL of the attachment store.
#[derive(Clone, PartialEq, Eq)]
pub struct R2Config {
    pub account_id: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Base URL the bucket is publicly served from, without trailing slash.
    pub public_base_url: String,
}

impl R2Config {
    /// Read the `R2_*` variables from the process environment.
    ///
    /// `Ok(None)` when none are set; an error when only some are.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>> {
        let keys = [
            ENV_ACCOUNT_ID,
            ENV_BUCKET,
            ENV_ACCESS_KEY_ID,
            ENV_SECRET_ACCESS_KEY,
            ENV_PUBLIC_BASE_URL,
        ];
        let values = keys.map(|key| normalize_text_option(lookup(key)));
        if values.iter().all(Option::is_none) {
            return Ok(None);
        }

        let missing = keys
            .iter()
            .zip(&values)
            .filter_map(|(key, value)| value.is_none().then_some(*key))
            .collect::<Vec<_>>();

        let [Some(account_id), Some(bucket), Some(access_key_id), Some(secret_access_key), Some(public_base_url)] =
            values
        else {
            return Err(Error::InvalidInput(format!(
                "R2 attachment storage is partially configured, missing {}",
                missing.join(", ")
            )));
        };

        if !is_http_url(&public_base_url) {
            return Err(Error::InvalidInput(format!(
                "{ENV_PUBLIC_BASE_URL} must start with http:// or https://"
            )));
        }

        Ok(Some(Self {
            account_id,
            bucket,
            access_key_id,
            secret_access_key,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }))
    }

    /// S3-compatible API endpoint of the account.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        format!("https://{}.r2.cloudflarestorage.com", self.account_id)
    }

    /// Public URL of an object key.
    pub fn public_url(&self, object_key: &str) -> Result<String> {
        let key = object_key.trim_matches('/');
        if key.is_empty() {
            return Err(Error::Storage("Cannot build a URL for an empty key".to_string()));
        }
        Ok(format!("{}/{}", self.public_base_url, encode_url_path(key)))
    }
}

impl fmt::Debug for R2Config {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("R2Config")
            .field("account_id", &self.account_id)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

/// Attachment store backed by an R2 bucket.
#[derive(Clone, Debug)]
pub struct R2BlobStore {
    config: R2Config,
    client: Client,
}

impl R2BlobStore {
    #[must_use]
    pub fn new(config: R2Config) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            CREDENTIALS_PROVIDER,
        );
        let sdk_config = aws_sdk_s3::config::Builder::new()
            .region(Region::new("auto"))
            .credentials_provider(credentials)
            .endpoint_url(config.endpoint_url())
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &R2Config {
        &self.config
    }

    fn failure(&self, operation: &str, object_key: &str, error: impl fmt::Display) -> Error {
        Error::Storage(format!(
            "R2 {operation} of {}/{object_key} failed: {error}",
            self.config.bucket
        ))
    }
}

impl BlobStore for R2BlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: Option<&str>,
    ) -> Result<ObjectHandle> {
        let object_key = normalize_object_key(key)?;

        let request = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .body(ByteStream::from(bytes.to_vec()))
            .set_content_type(normalize_text_option(content_type.map(ToOwned::to_owned)));

        request
            .send()
            .await
            .map_err(|error| self.failure("upload", &object_key, error))?;

        tracing::debug!("Stored {} bytes in R2 under {object_key}", bytes.len());
        Ok(ObjectHandle::new(object_key))
    }

    async fn url(&self, handle: &ObjectHandle) -> Result<String> {
        self.config.public_url(handle.key())
    }

    async fn delete(&self, handle: &ObjectHandle) -> Result<()> {
        let object_key = normalize_object_key(handle.key())?;
        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|error| self.failure("delete", &object_key, error))?;
        tracing::debug!("Removed {object_key} from R2");
        Ok(())
    }
}
