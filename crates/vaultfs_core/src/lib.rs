//! # VaultFS Core
//!
//! Core building blocks for VaultFS, an encrypted block-addressed storage
//! substrate.
//!
//! This crate provides:
//! - Structured errors (`Error`, `ErrorKind`) and the `VaultResult` alias
//! - Secure memory: a page-locked arena and the [`SecureBytes`] buffer
//! - Capability traits for encryption, block storage, and metadata
//!
//! ## Design Principles
//!
//! - Every byte carrying a key, password, salt, or plaintext lives in
//!   [`SecureBytes`], which is wiped on release
//! - Every fallible operation returns [`VaultResult`] - errors are never
//!   swallowed
//! - Providers are `Send + Sync` trait objects so callers stay polymorphic
//!   over the concrete implementations

#![warn(missing_docs)]

pub mod error;
pub mod secure;
pub mod traits;
pub mod types;

pub use error::{Error, ErrorKind, VaultResult};
pub use secure::{
    cleanup_secure_heap, initialize_secure_heap, initialize_secure_heap_default, SecureBytes,
    DEFAULT_MIN_ALLOCATION, DEFAULT_SECURE_HEAP_SIZE,
};
pub use traits::{EncryptionProvider, MetadataProvider, StorageProvider};
pub use types::{BlockInfo, Metadata};
