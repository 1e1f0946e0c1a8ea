//! Clinic Media Vault - Crypto Module
//!
//! Organization keys and the AEAD seal/open primitives.

pub mod aead;
pub mod keys;

pub use aead::{open, open_bytes, seal, EncryptedBlob, AEAD_OVERHEAD, TAG_LEN};
pub use keys::{generate_nonce, OrgKey, FALLBACK_KEY, KEY_LEN, NONCE_LEN};
