//! Blob Store Adapter — image blobs keyed by `{owner}/{millis}.{ext}` in a
//! named bucket, with stable public retrieval URLs.
//!
//! `BlobStore` is the trait seam; `BucketClient` talks to an HTTP object
//! store. Upload rejects duplicate keys at the backend; bulk removal is
//! best-effort and reports the subset of keys it could not remove. Removing
//! an already-absent key is not an error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Blob upload failed ({code}): {message}")]
    Write { code: u16, message: String },

    #[error("Blob delete failed for {} key(s)", failed.len())]
    Delete { failed: Vec<String> },

    #[error("Missing storage service key")]
    MissingCredential,
}

/// Storage key for a new diagnosis image: owner namespace plus capture
/// timestamp in milliseconds, collision-free within one owner.
pub fn object_key(owner: Uuid, captured_at: DateTime<Utc>, file_ext: &str) -> String {
    format!("{}/{}.{}", owner, captured_at.timestamp_millis(), file_ext)
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `key` and return the public retrieval URL.
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BlobError>;

    /// Derive the permanently-valid retrieval URL for a key. Pure, no I/O.
    fn public_url(&self, key: &str) -> String;

    /// Best-effort bulk delete. `BlobError::Delete` carries the keys that
    /// could not be removed; absent keys count as removed.
    async fn remove(&self, keys: &[String]) -> Result<(), BlobError>;

    /// Recover the storage key from a public URL, if it points into this
    /// store's bucket.
    fn key_for_url(&self, url: &str) -> Option<String>;
}

// ============================================================================
// BucketClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct BucketConfig {
    pub base_url: String,
    pub bucket: String,
    pub service_key: String,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
enum RemoveStatus {
    Removed,
    Absent,
    Error,
}

#[derive(Debug, Deserialize)]
struct RemoveEntry {
    key: String,
    status: RemoveStatus,
}

/// HTTP object-store client. Uploads with a bearer service key; the key is
/// checked at construction so a misconfigured deployment fails before any
/// network call.
#[derive(Debug, Clone)]
pub struct BucketClient {
    client: Client,
    config: BucketConfig,
}

impl BucketClient {
    pub fn new(config: BucketConfig) -> Result<Self, BlobError> {
        if config.service_key.is_empty() {
            return Err(BlobError::MissingCredential);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, config })
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/object/{}/{}",
            self.config.base_url, self.config.bucket, key
        )
    }
}

#[async_trait]
impl BlobStore for BucketClient {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BlobError> {
        let response = self
            .client
            .post(self.object_url(key))
            .bearer_auth(&self.config.service_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(code = status.as_u16(), key = %key, message = %message, "Blob upload failed");
            return Err(BlobError::Write {
                code: status.as_u16(),
                message,
            });
        }

        Ok(self.public_url(key))
    }

    fn public_url(&self, key: &str) -> String {
        format!(
            "{}/object/public/{}/{}",
            self.config.base_url, self.config.bucket, key
        )
    }

    async fn remove(&self, keys: &[String]) -> Result<(), BlobError> {
        if keys.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .delete(format!(
                "{}/object/{}",
                self.config.base_url, self.config.bucket
            ))
            .bearer_auth(&self.config.service_key)
            .json(&serde_json::json!({ "keys": keys }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(code = status.as_u16(), "Blob bulk delete rejected");
            return Err(BlobError::Delete {
                failed: keys.to_vec(),
            });
        }

        let entries: Vec<RemoveEntry> = response.json().await?;
        let failed: Vec<String> = entries
            .into_iter()
            .filter(|e| e.status == RemoveStatus::Error)
            .map(|e| e.key)
            .collect();

        if failed.is_empty() {
            Ok(())
        } else {
            tracing::warn!(failed = ?failed, "Blob bulk delete left keys behind");
            Err(BlobError::Delete { failed })
        }
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        let marker = format!("/{}/", self.config.bucket);
        url.split_once(&marker).map(|(_, key)| key.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
