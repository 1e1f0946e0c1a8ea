//! Clinic Media Vault - Remote Keystore and Key Manager
//!
//! One key document per organization, read-only from this subsystem. The
//! KeyManager caches resolved keys in process memory for the process
//! lifetime; key material is never written to local storage.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::crypto::OrgKey;
use crate::error::{KeyError, KeyResult, StorageError, StorageResult};

/// The remote key document for one organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyDocument {
    /// Base64-encoded 32-byte AES key
    pub key: String,
}

/// Read-only keystore access
#[async_trait]
pub trait KeystoreClient: Send + Sync {
    /// Fetch the key document at the per-organization path
    async fn fetch_key_document(&self, org_id: &str) -> StorageResult<KeyDocument>;
}

// ═══════════════════════════════════════════════════════════════
// IN-MEMORY BACKEND (sandbox + tests)
// ═══════════════════════════════════════════════════════════════

/// In-memory keystore for sandbox runs and tests
#[derive(Default)]
pub struct MemoryKeystore {
    documents: RwLock<HashMap<String, KeyDocument>>,
    fetches: AtomicUsize,
}

impl MemoryKeystore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a key document for an organization
    pub fn insert(&self, org_id: &str, document: KeyDocument) {
        self.documents
            .write()
            .insert(org_id.to_string(), document);
    }

    /// Provision an organization with the given key
    pub fn provision(&self, org_id: &str, key: &OrgKey) {
        self.insert(
            org_id,
            KeyDocument {
                key: key.to_base64(),
            },
        );
    }

    /// Number of fetches served, cache-hit assertions in tests
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl KeystoreClient for MemoryKeystore {
    async fn fetch_key_document(&self, org_id: &str) -> StorageResult<KeyDocument> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        self.documents
            .read()
            .get(org_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("organizations/{org_id}/encryption")))
    }
}

// ═══════════════════════════════════════════════════════════════
// HTTP BACKEND
// ═══════════════════════════════════════════════════════════════

/// HTTP keystore client
pub struct HttpKeystore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpKeystore {
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

    fn document_url(&self, org_id: &str) -> String {
        format!("{}/organizations/{}/encryption", self.base_url, org_id)
    }
}

#[async_trait]
impl KeystoreClient for HttpKeystore {
    async fn fetch_key_document(&self, org_id: &str) -> StorageResult<KeyDocument> {
        let url = self.document_url(org_id);

        let response = self
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

        response
            .json::<KeyDocument>()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════
// KEY MANAGER
// ═══════════════════════════════════════════════════════════════

/// Per-organization key cache over a keystore backend
///
/// Resolution is idempotent: once a key is resident for an organization it
/// is returned unchanged for the rest of the process lifetime. Concurrent
/// first resolutions may both fetch; they converge on the same immutable
/// remote value, so last write wins.
pub struct KeyManager {
    keystore: Arc<dyn KeystoreClient>,
    cache: RwLock<HashMap<String, OrgKey>>,
    sandbox: bool,
}

impl KeyManager {
    pub fn new(keystore: Arc<dyn KeystoreClient>, sandbox: bool) -> Self {
        if sandbox {
            log::warn!(
                "key manager running in SANDBOX mode: all organizations share the \
                 fixed public fallback key - never use with real patient data"
            );
        }

        Self {
            keystore,
            cache: RwLock::new(HashMap::new()),
            sandbox,
        }
    }

    /// Resolve the encryption key for an organization
    ///
    /// Sandbox mode always yields the fixed fallback key. Outside sandbox
    /// mode a failed fetch is a hard error: degrading to the publicly-known
    /// key would silently strip confidentiality from new uploads.
    pub async fn resolve_key(&self, org_id: &str) -> KeyResult<OrgKey> {
        if self.sandbox {
            return Ok(OrgKey::fallback());
        }

        if let Some(key) = self.cache.read().get(org_id) {
            return Ok(key.clone());
        }

        let document = self
            .keystore
            .fetch_key_document(org_id)
            .await
            .map_err(|e| match e {
                StorageError::NotFound(_) => KeyError::DocumentMissing(org_id.to_string()),
                other => KeyError::KeystoreUnreachable(other.to_string()),
            })?;

        let key = OrgKey::from_base64(&document.key)?;

        log::debug!("resolved encryption key for organization {org_id}");
        self.cache.write().insert(org_id.to_string(), key.clone());

        Ok(key)
    }

    /// Check whether a key is already resident for an organization
    pub fn is_resident(&self, org_id: &str) -> bool {
        self.cache.read().contains_key(org_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::FALLBACK_KEY;

    #[tokio::test]
    async fn test_sandbox_always_returns_fallback() {
        let keystore = Arc::new(MemoryKeystore::new());
        let manager = KeyManager::new(keystore.clone(), true);

        let key = manager.resolve_key("org-test").await.unwrap();
        assert_eq!(key.expose(), &FALLBACK_KEY);
        // Sandbox mode never touches the keystore
        assert_eq!(keystore.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent_and_cached() {
        let keystore = Arc::new(MemoryKeystore::new());
        let provisioned = OrgKey::generate();
        keystore.provision("org-test", &provisioned);

        let manager = KeyManager::new(keystore.clone(), false);

        let first = manager.resolve_key("org-test").await.unwrap();
        let second = manager.resolve_key("org-test").await.unwrap();

        assert_eq!(first.expose(), provisioned.expose());
        assert_eq!(first.expose(), second.expose());
        assert!(manager.is_resident("org-test"));
        // Second resolution was served from the resident cache
        assert_eq!(keystore.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_document_is_hard_error() {
        let manager = KeyManager::new(Arc::new(MemoryKeystore::new()), false);

        let err = manager.resolve_key("org-unprovisioned").await.unwrap_err();
        assert!(matches!(err, KeyError::DocumentMissing(_)));
        assert!(!manager.is_resident("org-unprovisioned"));
    }

    #[tokio::test]
    async fn test_malformed_key_field_is_hard_error() {
        let keystore = Arc::new(MemoryKeystore::new());
        keystore.insert(
            "org-test",
            KeyDocument {
                key: "%%% not base64 %%%".into(),
            },
        );

        let manager = KeyManager::new(keystore, false);
        let err = manager.resolve_key("org-test").await.unwrap_err();
        assert!(matches!(err, KeyError::MalformedDocument(_)));
    }

    #[tokio::test]
    async fn test_short_key_is_hard_error() {
        use base64::Engine;

        let keystore = Arc::new(MemoryKeystore::new());
        keystore.insert(
            "org-test",
            KeyDocument {
                key: base64::engine::general_purpose::STANDARD.encode([7u8; 16]),
            },
        );

        let manager = KeyManager::new(keystore, false);
        let err = manager.resolve_key("org-test").await.unwrap_err();
        assert!(matches!(err, KeyError::MalformedDocument(_)));
    }

    #[tokio::test]
    async fn test_distinct_orgs_get_distinct_keys() {
        let keystore = Arc::new(MemoryKeystore::new());
        keystore.provision("org-a", &OrgKey::generate());
        keystore.provision("org-b", &OrgKey::generate());

        let manager = KeyManager::new(keystore, false);
        let a = manager.resolve_key("org-a").await.unwrap();
        let b = manager.resolve_key("org-b").await.unwrap();
        assert_ne!(a.expose(), b.expose());
    }
}
