//! Clinic Media Vault - Organization Keys
//!
//! One flat AES-256 key per organization. No rotation, no per-record
//! derivation: every chart photo in an organization is sealed and opened
//! with this single key.

use secrecy::{ExposeSecret, Secret};
use zeroize::ZeroizeOnDrop;

use crate::error::{KeyError, KeyResult};

/// Key length for AES-256
pub const KEY_LEN: usize = 32;

/// Nonce length for AES-GCM
pub const NONCE_LEN: usize = 12;

/// Fixed, publicly-known key used in sandbox mode only.
///
/// This value ships in the binary and offers zero confidentiality. It must
/// never be reachable outside the explicit sandbox gate.
pub const FALLBACK_KEY: [u8; KEY_LEN] = *b"clinic-media-vault-sandbox-key!!";

/// Secure key wrapper with automatic zeroization
#[derive(Clone, ZeroizeOnDrop)]
pub struct OrgKey {
    #[zeroize(skip)]
    inner: Secret<[u8; KEY_LEN]>,
}

impl OrgKey {
    /// Create an organization key from raw bytes
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            inner: Secret::new(bytes),
        }
    }

    /// Expose the key bytes (use with caution)
    pub fn expose(&self) -> &[u8; KEY_LEN] {
        self.inner.expose_secret()
    }

    /// Generate a random key
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::new(bytes)
    }

    /// The fixed sandbox fallback key
    pub fn fallback() -> Self {
        Self::new(FALLBACK_KEY)
    }

    /// Decode a key from the base64 field of a keystore document
    pub fn from_base64(encoded: &str) -> KeyResult<Self> {
        use base64::Engine;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| KeyError::MalformedDocument(format!("invalid base64: {e}")))?;

        let bytes: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            KeyError::MalformedDocument(format!(
                "key is {} bytes, expected {}",
                bytes.len(),
                KEY_LEN
            ))
        })?;

        Ok(Self::new(bytes))
    }

    /// Encode the key as base64 for keystore provisioning
    pub fn to_base64(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(self.expose())
    }
}

impl std::fmt::Debug for OrgKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material
        f.write_str("OrgKey([redacted])")
    }
}

/// Generate a random nonce for AES-GCM
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    use rand::RngCore;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_roundtrip() {
        let key = OrgKey::generate();
        let encoded = key.to_base64();
        let decoded = OrgKey::from_base64(&encoded).unwrap();
        assert_eq!(key.expose(), decoded.expose());
    }

    #[test]
    fn test_base64_rejects_wrong_length() {
        use base64::Engine;
        let short = base64::engine::general_purpose::STANDARD.encode([0u8; 16]);
        assert!(OrgKey::from_base64(&short).is_err());
    }

    #[test]
    fn test_base64_rejects_garbage() {
        assert!(OrgKey::from_base64("not base64 at all!!!").is_err());
    }

    #[test]
    fn test_fallback_is_stable() {
        assert_eq!(OrgKey::fallback().expose(), OrgKey::fallback().expose());
        assert_eq!(OrgKey::fallback().expose(), &FALLBACK_KEY);
    }

    #[test]
    fn test_nonces_differ() {
        assert_ne!(generate_nonce(), generate_nonce());
    }

    #[test]
    fn test_debug_redacts() {
        let key = OrgKey::generate();
        assert_eq!(format!("{key:?}"), "OrgKey([redacted])");
    }
}
