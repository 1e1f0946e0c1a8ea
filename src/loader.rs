//! Clinic Media Vault - Media Loader
//!
//! The read path: fetch ciphertext by reference, open it under the
//! organization key, and decode the plaintext into a displayable image -
//! in memory only, never touching disk. A per-reference state cache keeps
//! each blob's load one-shot for the lifetime of the viewing session.

use image::{DynamicImage, GenericImageView};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::compress::{decode_image, square_thumbnail};
use crate::config::VaultConfig;
use crate::crypto::open_bytes;
use crate::error::{LoadError, StorageError};
use crate::keystore::KeyManager;
use crate::storage::BlobStore;
use crate::uploader::MediaReference;

/// A decrypted, decoded chart photo held in memory
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// Full decoded image for the detail view
    pub image: Arc<DynamicImage>,
    /// Pre-downscaled square thumbnail for the gallery grid
    pub thumbnail: Arc<DynamicImage>,
    /// Decrypted JPEG bytes, for export or sharing
    pub plaintext: Arc<Vec<u8>>,
    /// Pixel dimensions of the full image
    pub width: u32,
    pub height: u32,
}

impl LoadedImage {
    /// Decrypted plaintext size in bytes
    pub fn byte_size(&self) -> usize {
        self.plaintext.len()
    }
}

/// Per-reference load state
///
/// The three states are mutually exclusive; the UI matches exhaustively
/// and renders a spinner, the image, or a failure placeholder.
#[derive(Debug, Clone)]
pub enum LoadState {
    /// Load reserved or in flight
    Pending,
    /// Blob downloaded, opened, and decoded
    Resolved(LoadedImage),
    /// One stage failed; see the reason
    Failed(LoadError),
}

impl LoadState {
    /// Terminal states stick until an explicit reset
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoadState::Pending)
    }
}

/// Read path with a per-reference, per-session state cache
///
/// Loads for distinct references run independently and complete in
/// arbitrary order; one reference failing never affects its siblings in
/// the same gallery.
pub struct MediaLoader {
    keys: Arc<KeyManager>,
    store: Arc<dyn BlobStore>,
    org_id: String,
    max_download_bytes: u64,
    thumb_size: u32,
    cache: Mutex<HashMap<MediaReference, LoadState>>,
}

impl MediaLoader {
    pub fn new(
        keys: Arc<KeyManager>,
        store: Arc<dyn BlobStore>,
        org_id: &str,
        config: &VaultConfig,
    ) -> Self {
        Self {
            keys,
            store,
            org_id: org_id.to_string(),
            max_download_bytes: config.max_download_bytes,
            thumb_size: config.thumb_size,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Load one reference, or return its already-settled state
    ///
    /// The check-and-insert of the `Pending` slot happens under a single
    /// lock, so at most one load is ever in flight per reference: a caller
    /// observing a reference another task is already loading gets
    /// `Pending` back immediately.
    pub async fn load(&self, reference: &MediaReference) -> LoadState {
        {
            let mut cache = self.cache.lock();
            match cache.get(reference) {
                Some(LoadState::Pending) => return LoadState::Pending,
                Some(terminal) => return terminal.clone(),
                None => {
                    cache.insert(reference.clone(), LoadState::Pending);
                }
            }
        }

        let state = match self.run_pipeline(reference).await {
            Ok(loaded) => LoadState::Resolved(loaded),
            Err(e) => {
                log::warn!("load failed for {reference}: {e}");
                LoadState::Failed(e)
            }
        };

        self.cache.lock().insert(reference.clone(), state.clone());
        state
    }

    /// Download, open, and decode - strictly sequential per reference
    async fn run_pipeline(&self, reference: &MediaReference) -> Result<LoadedImage, LoadError> {
        let wire = self
            .store
            .get(reference.as_str(), self.max_download_bytes)
            .await
            .map_err(|e| match e {
                StorageError::TooLarge { size, max } => LoadError::SizeLimitExceeded { size, max },
                other => LoadError::DownloadFailed(other.to_string()),
            })?;

        let key = self
            .keys
            .resolve_key(&self.org_id)
            .await
            .map_err(|e| LoadError::KeyUnavailable(e.to_string()))?;

        let plaintext = open_bytes(&key, &wire).map_err(|_| LoadError::AuthenticationFailed)?;

        // The tag verified *some* plaintext; if that plaintext is not a
        // valid image, the blob was sealed from corrupt data or under a
        // different organization's key.
        let image = decode_image(&plaintext).map_err(|e| LoadError::DecodeFailed(e.to_string()))?;

        let thumbnail = square_thumbnail(&image, self.thumb_size);
        let (width, height) = image.dimensions();

        Ok(LoadedImage {
            image: Arc::new(image),
            thumbnail: Arc::new(thumbnail),
            plaintext: Arc::new(plaintext),
            width,
            height,
        })
    }

    /// Current state without triggering a load
    pub fn peek(&self, reference: &MediaReference) -> Option<LoadState> {
        self.cache.lock().get(reference).cloned()
    }

    /// Forget one reference so the next observation loads again
    pub fn reset(&self, reference: &MediaReference) {
        self.cache.lock().remove(reference);
    }

    /// Drop all cached states (owning view discarded)
    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{seal, OrgKey};
    use crate::keystore::MemoryKeystore;
    use crate::storage::MemoryBlobStore;
    use crate::uploader::MediaUploader;

    fn test_image(width: u32, height: u32) -> DynamicImage {
        let buf = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        DynamicImage::ImageRgb8(buf)
    }

    struct Rig {
        store: Arc<MemoryBlobStore>,
        uploader: MediaUploader,
        loader: MediaLoader,
    }

    fn sandbox_rig() -> Rig {
        let store = Arc::new(MemoryBlobStore::new());
        let keys = Arc::new(KeyManager::new(Arc::new(MemoryKeystore::new()), true));
        let config = VaultConfig::sandbox();

        Rig {
            store: store.clone(),
            uploader: MediaUploader::new(keys.clone(), store.clone(), &config),
            loader: MediaLoader::new(keys, store, "org-test", &config),
        }
    }

    async fn upload(rig: &Rig, image: &DynamicImage) -> MediaReference {
        rig.uploader
            .capture_and_upload(image, "org-test", "client-test")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_load_resolves_uploaded_photo() {
        let rig = sandbox_rig();
        let reference = upload(&rig, &test_image(200, 200)).await;

        match rig.loader.load(&reference).await {
            LoadState::Resolved(loaded) => {
                assert_eq!((loaded.width, loaded.height), (200, 200));
                assert_eq!(loaded.thumbnail.dimensions(), (256, 256));
                assert!(loaded.byte_size() > 0);
            }
            other => panic!("expected Resolved, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_terminal_state_is_one_shot() {
        let rig = sandbox_rig();
        let reference = upload(&rig, &test_image(64, 64)).await;

        assert!(matches!(
            rig.loader.load(&reference).await,
            LoadState::Resolved(_)
        ));

        // Corrupt the stored blob after the first load; the cached state
        // must be served without re-fetching
        let path = reference.as_str().trim_start_matches("memory://");
        rig.store.put(path, vec![0u8; 64]).await.unwrap();

        assert!(matches!(
            rig.loader.load(&reference).await,
            LoadState::Resolved(_)
        ));

        // An explicit reset re-observes the (now corrupt) blob
        rig.loader.reset(&reference);
        assert!(matches!(
            rig.loader.load(&reference).await,
            LoadState::Failed(_)
        ));
    }

    #[tokio::test]
    async fn test_failed_state_sticks_until_reset() {
        let rig = sandbox_rig();
        let reference = MediaReference::new("memory://organizations/org-test/charts/c/gone.enc");

        assert!(matches!(
            rig.loader.load(&reference).await,
            LoadState::Failed(LoadError::DownloadFailed(_))
        ));

        // Blob appears later - cached failure still wins
        rig.store
            .put(
                "organizations/org-test/charts/c/gone.enc",
                seal(&OrgKey::fallback(), &crate::compress::encode_jpeg(&test_image(32, 32), 85).unwrap())
                    .unwrap()
                    .to_bytes(),
            )
            .await
            .unwrap();

        assert!(matches!(
            rig.loader.load(&reference).await,
            LoadState::Failed(_)
        ));

        rig.loader.reset(&reference);
        assert!(matches!(
            rig.loader.load(&reference).await,
            LoadState::Resolved(_)
        ));
    }

    #[tokio::test]
    async fn test_tampered_blob_fails_authentication() {
        let rig = sandbox_rig();
        let reference = upload(&rig, &test_image(64, 64)).await;

        // Corrupt the last byte of the ciphertext in place
        let path = reference.as_str().trim_start_matches("memory://");
        let mut blob = rig.store.get(path, u64::MAX).await.unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xFF;
        rig.store.put(path, blob).await.unwrap();

        assert!(matches!(
            rig.loader.load(&reference).await,
            LoadState::Failed(LoadError::AuthenticationFailed)
        ));
    }

    #[tokio::test]
    async fn test_valid_seal_of_non_image_fails_decode() {
        let rig = sandbox_rig();

        // Authentic ciphertext whose plaintext is not an image
        let sealed = seal(&OrgKey::fallback(), b"clinical note, not a photo").unwrap();
        rig.store
            .put("organizations/org-test/charts/c/note.enc", sealed.to_bytes())
            .await
            .unwrap();

        let reference = MediaReference::new("memory://organizations/org-test/charts/c/note.enc");
        assert!(matches!(
            rig.loader.load(&reference).await,
            LoadState::Failed(LoadError::DecodeFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_blob_is_rejected() {
        let store = Arc::new(MemoryBlobStore::new());
        let keys = Arc::new(KeyManager::new(Arc::new(MemoryKeystore::new()), true));

        let mut config = VaultConfig::sandbox();
        config.max_download_bytes = 128;

        let loader = MediaLoader::new(keys, store.clone(), "org-test", &config);

        store
            .put("organizations/org-test/charts/c/big.enc", vec![1u8; 4096])
            .await
            .unwrap();

        let reference = MediaReference::new("memory://organizations/org-test/charts/c/big.enc");
        assert!(matches!(
            loader.load(&reference).await,
            LoadState::Failed(LoadError::SizeLimitExceeded { size: 4096, max: 128 })
        ));
    }

    #[tokio::test]
    async fn test_key_unavailable_is_typed() {
        let store = Arc::new(MemoryBlobStore::new());
        // Production mode, nothing provisioned
        let keys = Arc::new(KeyManager::new(Arc::new(MemoryKeystore::new()), false));
        let loader = MediaLoader::new(keys, store.clone(), "org-test", &VaultConfig::default());

        store
            .put("organizations/org-test/charts/c/x.enc", vec![0u8; 64])
            .await
            .unwrap();

        let reference = MediaReference::new("memory://organizations/org-test/charts/c/x.enc");
        assert!(matches!(
            loader.load(&reference).await,
            LoadState::Failed(LoadError::KeyUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_sibling_references_are_independent() {
        let rig = sandbox_rig();
        let good = upload(&rig, &test_image(48, 48)).await;
        let bad = MediaReference::new("memory://organizations/org-test/charts/c/missing.enc");

        let (good_state, bad_state) =
            tokio::join!(rig.loader.load(&good), rig.loader.load(&bad));

        assert!(matches!(good_state, LoadState::Resolved(_)));
        assert!(matches!(bad_state, LoadState::Failed(_)));
    }

    #[tokio::test]
    async fn test_peek_and_clear() {
        let rig = sandbox_rig();
        let reference = upload(&rig, &test_image(32, 32)).await;

        assert!(rig.loader.peek(&reference).is_none());

        rig.loader.load(&reference).await;
        assert!(matches!(
            rig.loader.peek(&reference),
            Some(LoadState::Resolved(_))
        ));

        rig.loader.clear();
        assert!(rig.loader.peek(&reference).is_none());
    }
}
