//! # Clinic Media Vault
//!
//! Organization-scoped encrypted media pipeline for clinical chart photos.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     CLINIC MEDIA VAULT                       │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐  │
//! │  │ MEDIA        │   │ MEDIA        │   │ INTEGRITY        │  │
//! │  │ UPLOADER     │   │ LOADER       │   │ VALIDATOR        │  │
//! │  └──────┬───────┘   └──────┬───────┘   └────────┬─────────┘  │
//! │         │                  │                    │            │
//! │  ┌──────┴──────────────────┴────────────────────┴─────────┐  │
//! │  │   KEY MANAGER (one AES-256 key per organization)       │  │
//! │  │   AEAD ENGINE (seal/open, nonce ‖ ciphertext ‖ tag)    │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │         │                                      │             │
//! │  ┌──────┴───────┐                      ┌───────┴──────────┐  │
//! │  │ REMOTE       │                      │ REMOTE BLOB      │  │
//! │  │ KEYSTORE     │                      │ STORE (.enc)     │  │
//! │  └──────────────┘                      └──────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Model
//!
//! - Every chart photo is compressed then sealed with AES-256-GCM before
//!   it leaves the device; blob storage only ever holds ciphertext
//! - One flat key per organization, fetched from the remote keystore and
//!   resident in process memory only
//! - Decrypted images exist in memory, transiently, after the
//!   authentication tag verifies; plaintext never touches local storage
//! - Sandbox mode uses a fixed, publicly-known key and in-memory stores;
//!   outside sandbox mode a failed key fetch is a hard error, never a
//!   silent fallback

pub mod api;
pub mod compress;
pub mod config;
pub mod crypto;
pub mod error;
pub mod keystore;
pub mod loader;
pub mod storage;
pub mod uploader;
pub mod validator;

pub use api::MediaVault;
pub use config::VaultConfig;
pub use error::{CryptoError, KeyError, LoadError, StorageError, UploadError};
pub use keystore::KeyManager;
pub use loader::{LoadState, LoadedImage, MediaLoader};
pub use uploader::{MediaReference, MediaUploader};
pub use validator::{IntegrityValidator, StepReport, ValidationRun};

/// Clinic Media Vault version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
