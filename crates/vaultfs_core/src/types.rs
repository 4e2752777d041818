//! Shared data types for VaultFS.

/// A block entry associated with a stored file.
///
/// The block layer itself is cipher-agnostic; the nonce and tag recorded
/// here are what the metadata layer must hand back to decrypt the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    /// Zero-based block id within the storage file.
    pub block_id: u64,
    /// Byte offset of this block's data within the logical file.
    pub offset: u64,
    /// Nonce used to encrypt this block (12 bytes for AES-256-GCM).
    pub nonce: Vec<u8>,
    /// Authentication tag for this block (16 bytes for AES-256-GCM).
    pub tag: Vec<u8>,
}

/// Metadata describing a file or directory.
///
/// Produced and consumed by the external metadata collaborator; VaultFS
/// core only defines the shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Unique file or directory identifier.
    pub file_id: u64,
    /// Name of the file or directory.
    pub filename: String,
    /// Total size in bytes (0 for directories).
    pub size: u64,
    /// Creation timestamp (seconds since the epoch).
    pub created_at: u64,
    /// Last-modified timestamp (seconds since the epoch).
    pub modified_at: u64,
    /// Permission bitmask.
    pub permissions: u32,
    /// True if this entry is a directory.
    pub is_directory: bool,
    /// Id of the parent directory (0 for the root).
    pub parent_id: u64,
    /// Ordered list of associated blocks (empty for directories).
    pub blocks: Vec<BlockInfo>,
}
