//! # VaultFS Crypto
//!
//! Authenticated encryption for VaultFS.
//!
//! This crate provides:
//! - [`KeyManager`] - random key/salt generation, PBKDF2 derivation,
//!   constant-time password verification
//! - [`GcmContext`] - an owning, resettable AES-256-GCM cipher state
//! - [`GcmContextPool`] - a bounded, thread-safe pool of cipher contexts
//!   with blocking acquisition and RAII return
//! - [`AesGcmProvider`] - the encryption facade: one-shot encrypt/decrypt
//!   with fresh 96-bit nonces and 128-bit tags
//!
//! ## Security Model
//!
//! - AES-256-GCM with a unique nonce per (key, message)
//! - Nonces come from the OS CSPRNG unless the caller supplies one
//! - Tag mismatch on decrypt is reported as `AuthenticationFailure` and
//!   never yields plaintext
//! - Keys, plaintext, and derived keys live in [`SecureBytes`] and are
//!   wiped on release
//!
//! [`SecureBytes`]: vaultfs_core::SecureBytes

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod ctx;
pub mod keys;
pub mod pool;
pub mod provider;

pub use ctx::{CipherMode, GcmContext, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use keys::{
    KeyDerivationAlgorithm, KeyManager, DEFAULT_MASTER_KEY_SIZE, DEFAULT_PBKDF2_ITERATIONS,
    DEFAULT_SALT_SIZE, MAX_DERIVED_KEY_SIZE, MAX_MASTER_KEY_SIZE, MAX_SALT_SIZE,
};
pub use pool::{GcmContextPool, PoolHandle};
pub use provider::AesGcmProvider;
