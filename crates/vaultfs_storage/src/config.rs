//! Block storage geometry.

use vaultfs_core::{Error, VaultResult};

/// Geometry of a block storage volume.
///
/// Two numbers define a volume completely: the size of each block and the
/// total size of the backing file. The total must be a positive exact
/// multiple of the block size; [`block_count`](Self::block_count) is
/// derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStorageConfig {
    /// Bytes per block.
    pub block_size: u64,
    /// Total bytes in the backing file.
    pub total_size: u64,
}

impl BlockStorageConfig {
    /// Creates a config with the given geometry.
    #[must_use]
    pub const fn new(block_size: u64, total_size: u64) -> Self {
        Self {
            block_size,
            total_size,
        }
    }

    /// Sets the block size.
    #[must_use]
    pub const fn block_size(mut self, size: u64) -> Self {
        self.block_size = size;
        self
    }

    /// Sets the total size.
    #[must_use]
    pub const fn total_size(mut self, size: u64) -> Self {
        self.total_size = size;
        self
    }

    /// Number of blocks this geometry describes.
    ///
    /// Zero when the config is invalid; call [`validate`](Self::validate)
    /// first for a diagnosable error.
    #[must_use]
    pub const fn block_count(&self) -> u64 {
        if self.block_size == 0 {
            0
        } else {
            self.total_size / self.block_size
        }
    }

    /// Checks the geometry invariants.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if either size is zero or `total_size`
    /// is not an exact multiple of `block_size`.
    pub fn validate(&self) -> VaultResult<()> {
        if self.block_size == 0 {
            return Err(Error::invalid_argument("block size must be non-zero"));
        }
        if self.total_size == 0 {
            return Err(Error::invalid_argument("total size must be non-zero"));
        }
        if self.total_size % self.block_size != 0 {
            return Err(Error::invalid_argument(format!(
                "total size {} is not a multiple of block size {}",
                self.total_size, self.block_size
            )));
        }
        Ok(())
    }
}
