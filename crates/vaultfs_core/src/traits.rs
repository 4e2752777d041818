//! Capability traits for VaultFS providers.
//!
//! Callers stay polymorphic over these traits; the concrete AES-GCM and
//! file-backed implementations live in `vaultfs_crypto` and
//! `vaultfs_storage`. All providers must be `Send + Sync` so a single
//! instance can be shared across threads.

use crate::error::VaultResult;
use crate::secure::SecureBytes;
use crate::types::Metadata;

/// Authenticated encryption over opaque byte payloads.
///
/// # Invariants
///
/// - Ciphertext length equals plaintext length (stream-cipher mode, no
///   padding)
/// - Every encryption uses a fresh nonce unless the caller supplies one
/// - Decryption fails with `AuthenticationFailure` on any tampering and
///   returns no plaintext bytes
pub trait EncryptionProvider: Send + Sync {
    /// Encrypts `plaintext`, writing the nonce and tag to the out-buffers.
    ///
    /// An empty `out_nonce` is resized to [`iv_size`](Self::iv_size) bytes
    /// and filled from the CSPRNG; a non-empty one must already be exactly
    /// that size and is used as-is (callers must then guarantee
    /// uniqueness). `out_tag` is resized to [`tag_size`](Self::tag_size)
    /// bytes and overwritten.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` on bad nonce length, `CryptoFailure` on
    /// cipher or RNG failure, `AllocationFailure` when the secure heap
    /// cannot back the working buffers.
    fn encrypt(
        &self,
        plaintext: &[u8],
        out_nonce: &mut SecureBytes,
        out_tag: &mut SecureBytes,
    ) -> VaultResult<SecureBytes>;

    /// Decrypts `ciphertext` with the given nonce and tag.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` on bad nonce/tag length or empty
    /// ciphertext, `AuthenticationFailure` when the tag does not verify.
    fn decrypt(&self, ciphertext: &[u8], nonce: &[u8], tag: &[u8]) -> VaultResult<SecureBytes>;

    /// Nonce size in bytes.
    fn iv_size(&self) -> usize;

    /// Authentication tag size in bytes.
    fn tag_size(&self) -> usize;
}

/// An indexed array of equal-sized blocks over some backing medium.
///
/// # Invariants
///
/// - Block ids are zero-based and strictly less than
///   [`block_count`](Self::block_count)
/// - `read_block` returns exactly [`block_size`](Self::block_size) bytes
/// - Concurrent operations on one provider are linearizable; no torn
///   blocks are observable
pub trait StorageProvider: Send + Sync {
    /// Reads the full block at `block_id`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` when no medium is mounted, `InvalidArgument`
    /// for an out-of-range id, `IoFailure` on seek/read failure.
    fn read_block(&self, block_id: u64) -> VaultResult<Vec<u8>>;

    /// Writes `data` to the block at `block_id`, zero-padding to the block
    /// size. Data longer than a block is refused.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` when no medium is mounted, `InvalidArgument`
    /// for an out-of-range id or oversized data, `IoFailure` on
    /// seek/write failure.
    fn write_block(&self, block_id: u64, data: &[u8]) -> VaultResult<()>;

    /// Number of blocks in the mounted medium (0 when unmounted).
    fn block_count(&self) -> u64;

    /// Size of each block in bytes (0 when unmounted).
    fn block_size(&self) -> u64;
}

/// Contract for the external metadata collaborator.
///
/// VaultFS consumes this interface but does not implement it: integrity
/// of the records (against tampering) is the metadata layer's concern,
/// and the block layer only moves opaque bytes.
pub trait MetadataProvider: Send + Sync {
    /// Initializes the provider (open database, load caches).
    fn initialize(&self) -> VaultResult<()>;

    /// Shuts down the provider, flushing pending writes.
    fn shutdown(&self) -> VaultResult<()>;

    /// Stores or updates a metadata record.
    fn upsert(&self, meta: &Metadata) -> VaultResult<()>;

    /// Retrieves metadata by its unique file id.
    fn get(&self, file_id: u64) -> VaultResult<Metadata>;

    /// Deletes a metadata record.
    fn delete(&self, file_id: u64) -> VaultResult<()>;

    /// Lists all stored file ids.
    fn list_ids(&self) -> VaultResult<Vec<u64>>;

    /// Verifies the integrity of a metadata record.
    fn verify(&self, meta: &Metadata) -> VaultResult<bool>;

    /// Fetches metadata records for the given file ids.
    fn batch_get(&self, ids: &[u64]) -> VaultResult<Vec<Metadata>>;

    /// Returns all children of a directory.
    fn children_of(&self, parent_id: u64) -> VaultResult<Vec<Metadata>>;

    /// Returns `true` if the directory has no children.
    fn is_directory_empty(&self, directory_id: u64) -> VaultResult<bool>;

    /// Moves a file or directory under a new parent.
    fn move_entry(&self, file_id: u64, new_parent_id: u64) -> VaultResult<()>;

    /// Creates a directory; returns its id.
    fn create_directory(&self, name: &str, parent_id: u64, permissions: u32) -> VaultResult<u64>;

    /// Creates an empty file; returns its id.
    fn create_file(&self, name: &str, parent_id: u64, permissions: u32) -> VaultResult<u64>;

    /// Renames a file or directory.
    fn rename(&self, file_id: u64, new_name: &str) -> VaultResult<()>;
}
