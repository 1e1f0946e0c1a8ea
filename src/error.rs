//! Clinic Media Vault - Error Types

use thiserror::Error;

/// Result type for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Result type for key resolution
pub type KeyResult<T> = Result<T, KeyError>;

/// Result type for remote store operations
pub type StorageResult<T> = Result<T, StorageError>;

// ═══════════════════════════════════════════════════════════════
// CRYPTO ERRORS
// ═══════════════════════════════════════════════════════════════

/// Errors from the seal/open primitives
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: authentication tag mismatch")]
    AuthenticationFailed,

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Blob too short: {len} bytes (minimum: {min})")]
    TruncatedBlob { len: usize, min: usize },
}

// ═══════════════════════════════════════════════════════════════
// KEY RESOLUTION ERRORS
// ═══════════════════════════════════════════════════════════════

/// Errors from resolving an organization key
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("No key document for organization: {0}")]
    DocumentMissing(String),

    #[error("Malformed key document: {0}")]
    MalformedDocument(String),

    #[error("Keystore unreachable: {0}")]
    KeystoreUnreachable(String),
}

// ═══════════════════════════════════════════════════════════════
// REMOTE STORE ERRORS
// ═══════════════════════════════════════════════════════════════

/// Errors from the blob store and keystore transports
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Blob too large: {size} bytes (max: {max})")]
    TooLarge { size: u64, max: u64 },

    #[error("Server error ({status}): {path}")]
    Server { status: u16, path: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

// ═══════════════════════════════════════════════════════════════
// WRITE PATH (UPLOAD) ERRORS
// ═══════════════════════════════════════════════════════════════

/// Upload pipeline errors, one variant per stage
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    #[error("No encryption key available: {0}")]
    NoKeyAvailable(#[source] KeyError),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(#[source] StorageError),

    #[error("URL resolution failed: {0}")]
    UrlResolutionFailed(#[source] StorageError),
}

impl UploadError {
    /// Stage name for diagnostics and reports
    pub fn stage(&self) -> &'static str {
        match self {
            UploadError::CompressionFailed(_) => "compression",
            UploadError::NoKeyAvailable(_) => "key-resolution",
            UploadError::EncryptionFailed(_) => "encryption",
            UploadError::UploadFailed(_) => "upload",
            UploadError::UrlResolutionFailed(_) => "url-resolution",
        }
    }

    /// Check if retrying the same capture could succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            UploadError::UploadFailed(_) | UploadError::UrlResolutionFailed(_)
        )
    }
}

// ═══════════════════════════════════════════════════════════════
// READ PATH (LOAD) ERRORS
// ═══════════════════════════════════════════════════════════════

/// Load pipeline errors, one variant per stage
///
/// Kept `Clone` so terminal load states can live in the per-reference cache
/// and be handed back on repeated observation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Blob exceeds size limit: {size} bytes (max: {max})")]
    SizeLimitExceeded { size: u64, max: u64 },

    #[error("Encryption key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("Authentication failed - blob tampered or wrong key")]
    AuthenticationFailed,

    #[error("Decoded plaintext is not a valid image: {0}")]
    DecodeFailed(String),
}

impl LoadError {
    /// Check if this failure points at corrupted ciphertext or a key mismatch
    /// rather than a transport problem
    pub fn indicates_tampering(&self) -> bool {
        matches!(
            self,
            LoadError::AuthenticationFailed | LoadError::DecodeFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_error_stages() {
        let e = UploadError::CompressionFailed("bad image".into());
        assert_eq!(e.stage(), "compression");
        assert!(!e.is_transient());

        let e = UploadError::UploadFailed(StorageError::Network("timeout".into()));
        assert_eq!(e.stage(), "upload");
        assert!(e.is_transient());
    }

    #[test]
    fn test_load_error_tampering() {
        assert!(LoadError::AuthenticationFailed.indicates_tampering());
        assert!(LoadError::DecodeFailed("not a JPEG".into()).indicates_tampering());
        assert!(!LoadError::DownloadFailed("404".into()).indicates_tampering());
    }
}
