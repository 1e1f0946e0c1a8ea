//! Clinic Media Vault - Blob Storage
//!
//! Opaque byte buffers at organization/client-scoped paths. This subsystem
//! only ever writes ciphertext here; the `.enc` suffix is the sole
//! on-the-wire marker that a blob is encrypted content.
//!
//! Blobs are immutable once uploaded: an edited photo becomes a new blob
//! under a new name, never a patch of existing ciphertext. Nothing here
//! deletes blobs when their owning record drops a reference - whether
//! orphaned ciphertext should be retained (compliance) or collected is a
//! product decision, deliberately not taken in this layer.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::{StorageError, StorageResult};

/// Suffix marking a blob as encrypted content
pub const ENCRYPTED_SUFFIX: &str = ".enc";

/// URL scheme used by the in-memory backend
const MEMORY_SCHEME: &str = "memory://";

/// Storage path for a chart photo blob
pub fn chart_blob_path(org_id: &str, client_id: &str, blob_name: &str) -> String {
    format!("organizations/{org_id}/charts/{client_id}/{blob_name}")
}

/// Blob storage access
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload a blob at a caller-specified path
    async fn put(&self, path: &str, data: Vec<u8>) -> StorageResult<()>;

    /// Download a blob by reference, rejecting anything over `max_bytes`
    async fn get(&self, reference: &str, max_bytes: u64) -> StorageResult<Vec<u8>>;

    /// Resolve a stable, retrievable URL for an uploaded path
    async fn resolve_url(&self, path: &str) -> StorageResult<String>;
}

// ═══════════════════════════════════════════════════════════════
// IN-MEMORY BACKEND (sandbox + tests)
// ═══════════════════════════════════════════════════════════════

/// In-memory blob store for sandbox runs and tests
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    pub fn blob_count(&self) -> usize {
        self.blobs.read().len()
    }

    fn strip_scheme(reference: &str) -> &str {
        reference.strip_prefix(MEMORY_SCHEME).unwrap_or(reference)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, data: Vec<u8>) -> StorageResult<()> {
        self.blobs.write().insert(path.to_string(), data);
        Ok(())
    }

    async fn get(&self, reference: &str, max_bytes: u64) -> StorageResult<Vec<u8>> {
        let path = Self::strip_scheme(reference);
        let blobs = self.blobs.read();

        let data = blobs
            .get(path)
            .ok_or_else(|| StorageError::NotFound(path.to_string()))?;

        if data.len() as u64 > max_bytes {
            return Err(StorageError::TooLarge {
                size: data.len() as u64,
                max: max_bytes,
            });
        }

        Ok(data.clone())
    }

    async fn resolve_url(&self, path: &str) -> StorageResult<String> {
        if !self.blobs.read().contains_key(path) {
            return Err(StorageError::NotFound(path.to_string()));
        }
        Ok(format!("{MEMORY_SCHEME}{path}"))
    }
}

// ═══════════════════════════════════════════════════════════════
// HTTP BACKEND
// ═══════════════════════════════════════════════════════════════

/// HTTP blob store client
pub struct HttpBlobStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBlobStore {
    pub fn new(base_url: &str, timeout_secs: u64) -> StorageResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StorageError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn blob_url(&self, reference: &str) -> String {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            reference.to_string()
        } else {
            format!("{}/{}", self.base_url, reference)
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(&self, path: &str, data: Vec<u8>) -> StorageResult<()> {
        let url = self.blob_url(path);

        let response = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await
            .map_err(|e| StorageError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::Server {
                status: response.status().as_u16(),
                path: path.to_string(),
            });
        }

        Ok(())
    }

    async fn get(&self, reference: &str, max_bytes: u64) -> StorageResult<Vec<u8>> {
        let url = self.blob_url(reference);

        let mut response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StorageError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(url));
        }
        if !response.status().is_success() {
            return Err(StorageError::Server {
                status: response.status().as_u16(),
                path: url,
            });
        }

        // Reject early when the server announces the size
        if let Some(length) = response.content_length() {
            if length > max_bytes {
                return Err(StorageError::TooLarge {
                    size: length,
                    max: max_bytes,
                });
            }
        }

        // Cap while streaming; content-length can lie or be absent
        let mut data = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| StorageError::Network(e.to_string()))?
        {
            if (data.len() + chunk.len()) as u64 > max_bytes {
                return Err(StorageError::TooLarge {
                    size: (data.len() + chunk.len()) as u64,
                    max: max_bytes,
                });
            }
            data.extend_from_slice(&chunk);
        }

        Ok(data)
    }

    async fn resolve_url(&self, path: &str) -> StorageResult<String> {
        let url = self.blob_url(path);

        // Confirm the blob landed before handing out a reference
        let response = self
            .client
            .head(&url)
            .send()
            .await
            .map_err(|e| StorageError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(url));
        }
        if !response.status().is_success() {
            return Err(StorageError::Server {
                status: response.status().as_u16(),
                path: url,
            });
        }

        Ok(url)
    }
}
