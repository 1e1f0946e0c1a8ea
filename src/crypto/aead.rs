//! Clinic Media Vault - AEAD Seal/Open
//!
//! AES-256-GCM over byte buffers. This is the only module that touches
//! cryptographic primitives; everything else handles opaque blobs.
//!
//! Blob layout: `[NONCE 12B][CIPHERTEXT variable][TAG 16B]`, produced by
//! exactly one seal over exactly one plaintext.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};

use super::keys::{generate_nonce, OrgKey, NONCE_LEN};
use crate::error::{CryptoError, CryptoResult};

/// GCM authentication tag length
pub const TAG_LEN: usize = 16;

/// Fixed byte overhead of one seal: nonce + tag
pub const AEAD_OVERHEAD: usize = NONCE_LEN + TAG_LEN;

/// One sealed unit: nonce plus ciphertext-with-tag
pub struct EncryptedBlob {
    /// Per-encryption nonce, never reused with the same key
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext with the authentication tag appended
    pub ciphertext: Vec<u8>,
}

impl EncryptedBlob {
    /// Serialize to the wire layout (nonce || ciphertext || tag)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse the wire layout back into nonce and ciphertext
    pub fn from_bytes(data: &[u8]) -> CryptoResult<Self> {
        if data.len() < AEAD_OVERHEAD {
            return Err(CryptoError::TruncatedBlob {
                len: data.len(),
                min: AEAD_OVERHEAD,
            });
        }

        let nonce: [u8; NONCE_LEN] = data[..NONCE_LEN]
            .try_into()
            .expect("slice length checked above");

        Ok(Self {
            nonce,
            ciphertext: data[NONCE_LEN..].to_vec(),
        })
    }

    /// Total serialized size
    pub fn size(&self) -> usize {
        NONCE_LEN + self.ciphertext.len()
    }
}

/// Seal plaintext under an organization key
///
/// A fresh random nonce is generated per call. Output size is always
/// `plaintext.len() + AEAD_OVERHEAD`.
pub fn seal(key: &OrgKey, plaintext: &[u8]) -> CryptoResult<EncryptedBlob> {
    let cipher = Aes256Gcm::new_from_slice(key.expose())
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let nonce_bytes = generate_nonce();
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok(EncryptedBlob {
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Open a sealed blob, verifying the authentication tag
///
/// Any tampering, truncation, or wrong key fails closed; no partial
/// plaintext is ever returned.
pub fn open(key: &OrgKey, blob: &EncryptedBlob) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.expose())
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    let nonce = Nonce::from_slice(&blob.nonce);

    cipher
        .decrypt(nonce, blob.ciphertext.as_slice())
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// Open directly from wire bytes
pub fn open_bytes(key: &OrgKey, data: &[u8]) -> CryptoResult<Vec<u8>> {
    let blob = EncryptedBlob::from_bytes(data)?;
    open(key, &blob)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let key = OrgKey::generate();
        let plaintext = b"clinical chart photo bytes";

        let blob = seal(&key, plaintext).unwrap();
        let recovered = open(&key, &blob).unwrap();

        assert_eq!(recovered.as_slice(), plaintext);
    }

    #[test]
    fn test_overhead_is_fixed() {
        let key = OrgKey::generate();
        for len in [0usize, 1, 17, 4096] {
            let blob = seal(&key, &vec![0xABu8; len]).unwrap();
            assert_eq!(blob.size(), len + AEAD_OVERHEAD);
        }
    }

    #[test]
    fn test_nonce_fresh_per_seal() {
        let key = OrgKey::generate();
        let a = seal(&key, b"same input").unwrap();
        let b = seal(&key, b"same input").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_single_bit_flip_fails() {
        let key = OrgKey::generate();
        let blob = seal(&key, b"tamper target").unwrap();
        let wire = blob.to_bytes();

        // Flip one bit in the nonce, in the ciphertext body, and in the tag
        for pos in [0, NONCE_LEN + 2, wire.len() - 1] {
            let mut corrupted = wire.clone();
            corrupted[pos] ^= 0x01;
            assert!(
                open_bytes(&key, &corrupted).is_err(),
                "bit flip at {pos} must fail closed"
            );
        }
    }

    #[test]
    fn test_wrong_key_fails() {
        let k1 = OrgKey::generate();
        let k2 = OrgKey::generate();

        let blob = seal(&k1, b"secret").unwrap();
        assert!(open(&k2, &blob).is_err());
    }

    #[test]
    fn test_truncated_blob_rejected() {
        let key = OrgKey::generate();
        let wire = seal(&key, b"short").unwrap().to_bytes();

        assert!(matches!(
            EncryptedBlob::from_bytes(&wire[..AEAD_OVERHEAD - 1]),
            Err(CryptoError::TruncatedBlob { .. })
        ));
        // Truncating past the minimum still fails tag verification
        assert!(open_bytes(&key, &wire[..wire.len() - 1]).is_err());
    }

    #[test]
    fn test_empty_plaintext_roundtrip() {
        let key = OrgKey::generate();
        let blob = seal(&key, b"").unwrap();
        assert_eq!(blob.size(), AEAD_OVERHEAD);
        assert!(open(&key, &blob).unwrap().is_empty());
    }
}
