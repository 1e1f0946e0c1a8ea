//! Clinic Media Vault - Unified Public API
//!
//! Single entry point wiring the keystore, blob store, uploader, loader,
//! and validator together from one configuration. Sandbox mode swaps both
//! remote backends for in-memory ones and the fixed fallback key.
//!
//! # Example
//!
//! ```rust,ignore
//! use clinic_media_vault::api::MediaVault;
//!
//! let vault = MediaVault::sandbox();
//!
//! // Write path: capture -> encrypted blob -> reference
//! let reference = vault.upload_photo(&photo, "org-1", "client-7").await?;
//!
//! // Read path: reference -> decrypted in-memory image
//! let loaded = vault.fetch_photo(&reference, "org-1").await?;
//!
//! // Diagnostics
//! let run = vault.check("org-1", "client-7").await;
//! ```

use image::DynamicImage;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::config::VaultConfig;
use crate::error::{LoadError, StorageResult, UploadError};
use crate::keystore::{HttpKeystore, KeyManager, KeystoreClient, MemoryKeystore};
use crate::loader::{LoadState, LoadedImage, MediaLoader};
use crate::storage::{BlobStore, HttpBlobStore, MemoryBlobStore};
use crate::uploader::{MediaReference, MediaUploader};
use crate::validator::{IntegrityValidator, ValidationRun};

/// Errors from exporting a decrypted photo to disk
#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Clinic Media Vault facade
pub struct MediaVault {
    config: VaultConfig,
    keys: Arc<KeyManager>,
    store: Arc<dyn BlobStore>,
    uploader: MediaUploader,
    validator: IntegrityValidator,
}

impl MediaVault {
    /// Build a vault from configuration
    ///
    /// Non-sandbox configs get HTTP backends against the configured
    /// endpoints; sandbox configs get in-memory backends.
    pub fn new(config: VaultConfig) -> StorageResult<Self> {
        if config.sandbox {
            return Ok(Self::with_backends(
                config,
                Arc::new(MemoryKeystore::new()),
                Arc::new(MemoryBlobStore::new()),
            ));
        }

        let keystore = Arc::new(HttpKeystore::new(
            &config.keystore_url,
            config.request_timeout_secs,
        )?);
        let store = Arc::new(HttpBlobStore::new(
            &config.storage_url,
            config.request_timeout_secs,
        )?);

        Ok(Self::with_backends(config, keystore, store))
    }

    /// In-memory vault with the fallback key; testing and demos only
    pub fn sandbox() -> Self {
        Self::with_backends(
            VaultConfig::sandbox(),
            Arc::new(MemoryKeystore::new()),
            Arc::new(MemoryBlobStore::new()),
        )
    }

    /// Wire a vault over explicit backends
    pub fn with_backends(
        config: VaultConfig,
        keystore: Arc<dyn KeystoreClient>,
        store: Arc<dyn BlobStore>,
    ) -> Self {
        let keys = Arc::new(KeyManager::new(keystore, config.sandbox));
        let uploader = MediaUploader::new(keys.clone(), store.clone(), &config);
        let validator = IntegrityValidator::new(keys.clone(), store.clone(), &config);

        Self {
            config,
            keys,
            store,
            uploader,
            validator,
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // WRITE PATH
    // ═══════════════════════════════════════════════════════════════

    /// Compress, seal, and upload one captured photo
    pub async fn upload_photo(
        &self,
        image: &DynamicImage,
        org_id: &str,
        client_id: &str,
    ) -> Result<MediaReference, UploadError> {
        self.uploader
            .capture_and_upload(image, org_id, client_id)
            .await
    }

    // ═══════════════════════════════════════════════════════════════
    // READ PATH
    // ═══════════════════════════════════════════════════════════════

    /// A per-session loader for a gallery of one organization's photos
    pub fn loader(&self, org_id: &str) -> MediaLoader {
        MediaLoader::new(self.keys.clone(), self.store.clone(), org_id, &self.config)
    }

    /// One-off fetch of a single photo
    pub async fn fetch_photo(
        &self,
        reference: &MediaReference,
        org_id: &str,
    ) -> Result<LoadedImage, LoadError> {
        match self.loader(org_id).load(reference).await {
            LoadState::Resolved(loaded) => Ok(loaded),
            LoadState::Failed(e) => Err(e),
            // A fresh loader has no competing in-flight load
            LoadState::Pending => Err(LoadError::DownloadFailed("load did not settle".into())),
        }
    }

    /// Fetch a photo and write the decrypted JPEG to disk
    pub async fn export_photo<P: AsRef<Path>>(
        &self,
        reference: &MediaReference,
        org_id: &str,
        dest: P,
    ) -> Result<LoadedImage, ExportError> {
        let loaded = self.fetch_photo(reference, org_id).await?;
        std::fs::write(dest.as_ref(), loaded.plaintext.as_slice())?;
        Ok(loaded)
    }

    // ═══════════════════════════════════════════════════════════════
    // DIAGNOSTICS
    // ═══════════════════════════════════════════════════════════════

    /// Run the end-to-end integrity check
    pub async fn check(&self, org_id: &str, client_id: &str) -> ValidationRun {
        self.validator.run(org_id, client_id).await
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }
}
