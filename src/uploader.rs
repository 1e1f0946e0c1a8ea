//! Clinic Media Vault - Media Uploader
//!
//! The write path: a captured chart photo is compressed, sealed under the
//! organization key, and uploaded as an opaque `.enc` blob. Plaintext never
//! leaves the device. The returned reference is the caller's to attach to
//! the owning treatment entry; this layer writes no record documents.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::compress::compress_for_upload;
use crate::config::VaultConfig;
use crate::crypto::seal;
use crate::error::UploadError;
use crate::keystore::KeyManager;
use crate::storage::{chart_blob_path, BlobStore, ENCRYPTED_SUFFIX};

/// Retrievable reference to exactly one encrypted blob
///
/// A URL-shaped string, persisted on the treatment entry's image list by
/// the record layer. Removing it from the record is the only deletion this
/// system performs; the blob itself stays in storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaReference(String);

impl MediaReference {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MediaReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Write path for captured chart photos
pub struct MediaUploader {
    keys: Arc<KeyManager>,
    store: Arc<dyn BlobStore>,
    jpeg_quality: u8,
    max_upload_dimension: u32,
}

impl MediaUploader {
    pub fn new(keys: Arc<KeyManager>, store: Arc<dyn BlobStore>, config: &VaultConfig) -> Self {
        Self {
            keys,
            store,
            jpeg_quality: config.jpeg_quality,
            max_upload_dimension: config.max_upload_dimension,
        }
    }

    /// Compress, seal, and upload one captured photo
    ///
    /// First failure wins; no stage is retried here. On success exactly one
    /// new blob exists under
    /// `organizations/{org}/charts/{client}/{uuid}.enc`.
    pub async fn capture_and_upload(
        &self,
        image: &DynamicImage,
        org_id: &str,
        client_id: &str,
    ) -> Result<MediaReference, UploadError> {
        let jpeg = compress_for_upload(image, self.jpeg_quality, self.max_upload_dimension)
            .map_err(|e| UploadError::CompressionFailed(e.to_string()))?;
        log::debug!("compressed capture to {} bytes", jpeg.len());

        let key = self
            .keys
            .resolve_key(org_id)
            .await
            .map_err(UploadError::NoKeyAvailable)?;

        let sealed = seal(&key, &jpeg)
            .map_err(|e| UploadError::EncryptionFailed(e.to_string()))?;
        let wire = sealed.to_bytes();

        let blob_name = format!("{}{}", Uuid::new_v4(), ENCRYPTED_SUFFIX);
        let path = chart_blob_path(org_id, client_id, &blob_name);

        self.store
            .put(&path, wire)
            .await
            .map_err(UploadError::UploadFailed)?;

        let url = self
            .store
            .resolve_url(&path)
            .await
            .map_err(UploadError::UrlResolutionFailed)?;

        log::info!("uploaded encrypted chart photo to {path}");
        Ok(MediaReference::new(url))
    }
}
