//! # VaultFS Storage
//!
//! File-backed block storage for VaultFS.
//!
//! This crate exposes a mounted file as an indexed array of equal-sized
//! blocks. The layer is **cipher-agnostic**: it moves opaque bytes and
//! never interprets them. Pairing blocks with their nonces and tags is the
//! job of the external metadata collaborator; encrypting them is the job
//! of `vaultfs_crypto`.
//!
//! ## On-Disk Format
//!
//! A storage file is exactly `total_size` bytes: a concatenation of
//! `block_count` fixed-size blocks, zero-initialized on creation. There is
//! no header, no trailer, and no magic bytes.
//!
//! ## Example
//!
//! ```no_run
//! use vaultfs_core::StorageProvider;
//! use vaultfs_storage::{BlockStorage, BlockStorageConfig};
//! use std::path::Path;
//!
//! let config = BlockStorageConfig::new(4096, 4096 * 100);
//! BlockStorage::create(Path::new("vol.dat"), &config).unwrap();
//!
//! let storage = BlockStorage::new();
//! storage.mount(Path::new("vol.dat"), &config).unwrap();
//! storage.write_block(5, b"hello").unwrap();
//! let block = storage.read_block(5).unwrap(); // 4096 bytes, zero-padded
//! # assert_eq!(&block[..5], b"hello");
//! storage.unmount().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod block;
mod config;

pub use block::BlockStorage;
pub use config::BlockStorageConfig;
