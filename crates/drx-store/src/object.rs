// SPDX-License-Identifier: MIT OR Apache-2.0
//! Object-store trait, S3 and in-memory implementations, artifact gateway.

use crate::{ArtifactKeys, StoreError};
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use drx_config::StorageConfig;
use drx_core::Mawb;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};

/// Excel content type for uploaded workbooks.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// PDF content type for uploaded batch PDFs.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Narrow byte-level object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload bytes under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Object`] on provider failure.
    async fn upload_bytes(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StoreError>;

    /// Download the bytes stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for missing keys,
    /// [`StoreError::Object`] otherwise.
    async fn download(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Presign a GET URL for `key` valid for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Object`] on provider failure.
    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, StoreError>;
}

// ---------------------------------------------------------------------------
// S3
// ---------------------------------------------------------------------------

/// S3-backed [`ObjectStore`].
#[derive(Debug, Clone)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Store {
    /// Build a store from the configured bucket, region, and credentials.
    #[must_use]
    pub fn from_config(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "duty-recon",
        );
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .build();
        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn upload_bytes(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StoreError::Object {
                message: e.to_string(),
            })?;
        info!(target: "drx.store", bucket = %self.bucket, key, "object uploaded");
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let message = e.to_string();
                if message.contains("NoSuchKey") {
                    StoreError::NotFound {
                        key: key.to_string(),
                    }
                } else {
                    StoreError::Object { message }
                }
            })?;
        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Object {
                message: e.to_string(),
            })?;
        Ok(data.into_bytes().to_vec())
    }

    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, StoreError> {
        let presigning = PresigningConfig::expires_in(ttl).map_err(|e| StoreError::Object {
            message: e.to_string(),
        })?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StoreError::Object {
                message: e.to_string(),
            })?;
        Ok(presigned.uri().to_string())
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// In-memory [`ObjectStore`] for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, (String, Vec<u8>)>>,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently stored, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Content type recorded for `key`, if present.
    #[must_use]
    pub fn content_type_of(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .map(|(ct, _)| ct.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn upload_bytes(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StoreError> {
        self.objects
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_string(), (content_type.to_string(), bytes));
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, StoreError> {
        Ok(format!("memory://{key}?ttl={}", ttl.as_secs()))
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Artifact uploads with the fixed key convention and presigned URLs.
pub struct ArtifactGateway<S> {
    store: S,
    keys: ArtifactKeys,
    presign_ttl: Duration,
}

impl<S: ObjectStore> ArtifactGateway<S> {
    /// Gateway over `store` with the configured prefix and presign TTL.
    #[must_use]
    pub fn new(store: S, keys: ArtifactKeys, presign_ttl: Duration) -> Self {
        Self {
            store,
            keys,
            presign_ttl,
        }
    }

    /// Upload a Custom Report workbook; returns `(key, presigned_url)`.
    ///
    /// A presign failure is not fatal — the key alone is enough to re-sign
    /// later — so the URL degrades to empty.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the upload itself fails.
    pub async fn upload_excel(
        &self,
        mawb: &Mawb,
        airport_code: Option<&str>,
        customer: Option<&str>,
        shoaib: bool,
        bytes: Vec<u8>,
    ) -> Result<(String, String), StoreError> {
        let key = self.keys.excel(mawb, airport_code, customer, shoaib);
        self.store
            .upload_bytes(&key, XLSX_CONTENT_TYPE, bytes)
            .await?;
        let url = self.presign_or_empty(&key).await;
        Ok((key, url))
    }

    /// Upload a compressed batch PDF; returns `(key, presigned_url)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the upload itself fails.
    pub async fn upload_pdf(
        &self,
        mawb: &Mawb,
        airport_code: Option<&str>,
        customer: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<(String, String), StoreError> {
        let key = self.keys.pdf(mawb, airport_code, customer);
        self.store
            .upload_bytes(&key, PDF_CONTENT_TYPE, bytes)
            .await?;
        let url = self.presign_or_empty(&key).await;
        Ok((key, url))
    }

    /// Re-sign an existing artifact key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the provider refuses.
    pub async fn presign(&self, key: &str) -> Result<String, StoreError> {
        self.store.presign(key, self.presign_ttl).await
    }

    /// Download a stored artifact.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] or [`StoreError::Object`].
    pub async fn download(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.store.download(key).await
    }

    async fn presign_or_empty(&self, key: &str) -> String {
        match self.store.presign(key, self.presign_ttl).await {
            Ok(url) => url,
            Err(e) => {
                warn!(target: "drx.store", key, error = %e, "presign failed, keeping key only");
                String::new()
            }
        }
    }
}
