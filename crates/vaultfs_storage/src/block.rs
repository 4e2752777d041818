//! File-backed fixed-size block storage.

use crate::config::BlockStorageConfig;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use vaultfs_core::{Error, StorageProvider, VaultResult};

#[derive(Debug)]
struct VolumeState {
    /// `Some` while mounted; the handle is the mounted-state flag.
    file: Option<File>,
    block_size: u64,
    block_count: u64,
}

/// A file-backed array of equal-sized blocks.
///
/// Lifecycle: constructed unmounted, [`mount`](BlockStorage::mount)ed onto
/// a file created by [`create`](BlockStorage::create), then read/written
/// by block id until [`unmount`](BlockStorage::unmount). Every I/O
/// operation on an unmounted storage fails with `InvalidState`. Geometry
/// is fixed at mount time.
///
/// # Thread Safety
///
/// One mutex guards the file handle, its seek position, and the mounted
/// flag, so concurrent operations on a single instance are linearizable
/// and torn blocks are never observable. Instances over distinct files
/// are fully independent.
///
/// # Durability
///
/// Writes land in the OS page cache; [`flush`](BlockStorage::flush)
/// pushes them down. A crash mid-write can leave the target block
/// indeterminate - the GCM tag stored alongside it by the metadata layer
/// will then fail verification on the next read, surfacing the
/// corruption.
#[derive(Debug)]
pub struct BlockStorage {
    state: Mutex<VolumeState>,
}

impl BlockStorage {
    /// Creates an unmounted storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(VolumeState {
                file: None,
                block_size: 0,
                block_count: 0,
            }),
        }
    }

    /// Creates a zero-filled storage file with the given geometry.
    ///
    /// Writes `block_count` zero blocks sequentially, syncs, and closes;
    /// an existing file at `path` is truncated.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty path or invalid geometry,
    /// `IoFailure` (with the OS errno) on open or write failure.
    pub fn create(path: &Path, config: &BlockStorageConfig) -> VaultResult<()> {
        if path.as_os_str().is_empty() {
            return Err(Error::invalid_argument("storage path cannot be empty"));
        }
        config.validate()?;

        let mut file = File::create(path)?;
        let zeros = vec![0u8; config.block_size as usize];
        for _ in 0..config.block_count() {
            file.write_all(&zeros)?;
        }
        file.sync_all()?;

        tracing::info!(
            path = %path.display(),
            block_size = config.block_size,
            block_count = config.block_count(),
            "created block storage volume"
        );
        Ok(())
    }

    /// Mounts an existing storage file.
    ///
    /// The file must exist, be a regular file, and be exactly
    /// `config.total_size` bytes long - a size mismatch means the file is
    /// not the volume this geometry describes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if already mounted, `InvalidArgument` for an
    /// empty path or invalid geometry, `IoFailure` if the file is
    /// missing, not regular, the wrong size, or cannot be opened.
    pub fn mount(&self, path: &Path, config: &BlockStorageConfig) -> VaultResult<()> {
        let mut state = self.state.lock();
        if state.file.is_some() {
            return Err(Error::invalid_state("storage is already mounted").with_code(-1));
        }
        if path.as_os_str().is_empty() {
            return Err(Error::invalid_argument("mount path cannot be empty").with_code(-2));
        }
        config.validate().map_err(|err| err.with_code(-6))?;

        let metadata = std::fs::metadata(path).map_err(|err| {
            Error::io_failure(format!(
                "storage file is not accessible: {}: {err}",
                path.display()
            ))
            .with_code(-4)
        })?;
        if !metadata.is_file() {
            return Err(Error::io_failure(format!(
                "storage path is not a regular file: {}",
                path.display()
            ))
            .with_code(-4));
        }
        if metadata.len() != config.total_size {
            return Err(Error::io_failure(format!(
                "storage file size {} does not match configured total size {}",
                metadata.len(),
                config.total_size
            ))
            .with_code(-5));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|err| {
                Error::io_failure(format!(
                    "failed to open storage file: {}: {err}",
                    path.display()
                ))
                .with_code(-3)
            })?;

        state.file = Some(file);
        state.block_size = config.block_size;
        state.block_count = config.block_count();

        tracing::info!(
            path = %path.display(),
            block_size = state.block_size,
            block_count = state.block_count,
            "mounted block storage volume"
        );
        Ok(())
    }

    /// Unmounts the storage, syncing and closing the file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if not mounted, `IoFailure` if the final
    /// sync fails (the file is closed either way).
    pub fn unmount(&self) -> VaultResult<()> {
        let mut state = self.state.lock();
        let file = state
            .file
            .take()
            .ok_or_else(|| Error::invalid_state("storage is not mounted").with_code(-1))?;
        state.block_size = 0;
        state.block_count = 0;

        let synced = file.sync_all();
        drop(file);
        synced.map_err(|err| {
            Error::io_failure(format!("failed to sync storage file on close: {err}"))
                .with_code(-2)
        })?;

        tracing::info!("unmounted block storage volume");
        Ok(())
    }

    /// Returns `true` while a file is mounted.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.state.lock().file.is_some()
    }

    /// Flushes buffered writes to the OS.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if not mounted, `IoFailure` if the flush
    /// fails.
    pub fn flush(&self) -> VaultResult<()> {
        let mut state = self.state.lock();
        let file = state
            .file
            .as_mut()
            .ok_or_else(|| Error::invalid_state("storage is not mounted").with_code(-1))?;
        file.flush()?;
        tracing::debug!("flushed block storage volume");
        Ok(())
    }
}

impl Default for BlockStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageProvider for BlockStorage {
    fn read_block(&self, block_id: u64) -> VaultResult<Vec<u8>> {
        let mut state = self.state.lock();
        let VolumeState {
            file,
            block_size,
            block_count,
        } = &mut *state;

        let file = file
            .as_mut()
            .ok_or_else(|| Error::invalid_state("storage is not mounted").with_code(-1))?;
        if block_id >= *block_count {
            return Err(Error::invalid_argument(format!(
                "block id {block_id} out of range: volume has {block_count} blocks"
            ))
            .with_code(-2));
        }

        let offset = block_id * *block_size;
        file.seek(SeekFrom::Start(offset)).map_err(|err| {
            Error::io_failure(format!("failed to seek to block {block_id}: {err}")).with_code(-3)
        })?;

        let mut data = vec![0u8; *block_size as usize];
        file.read_exact(&mut data).map_err(|err| {
            Error::io_failure(format!("incomplete read of block {block_id}: {err}")).with_code(-4)
        })?;

        Ok(data)
    }

    fn write_block(&self, block_id: u64, data: &[u8]) -> VaultResult<()> {
        let mut state = self.state.lock();
        let VolumeState {
            file,
            block_size,
            block_count,
        } = &mut *state;

        let file = file
            .as_mut()
            .ok_or_else(|| Error::invalid_state("storage is not mounted").with_code(-1))?;
        if block_id >= *block_count {
            return Err(Error::invalid_argument(format!(
                "block id {block_id} out of range: volume has {block_count} blocks"
            ))
            .with_code(-2));
        }
        if data.len() as u64 > *block_size {
            return Err(Error::invalid_argument(format!(
                "data size {} exceeds block size {block_size}",
                data.len()
            ))
            .with_code(-3));
        }

        let offset = block_id * *block_size;
        file.seek(SeekFrom::Start(offset)).map_err(|err| {
            Error::io_failure(format!("failed to seek to block {block_id}: {err}")).with_code(-4)
        })?;

        // Short data is zero-padded in a scratch buffer; the caller's
        // slice is never touched.
        let written = if data.len() as u64 == *block_size {
            file.write_all(data)
        } else {
            let mut padded = vec![0u8; *block_size as usize];
            padded[..data.len()].copy_from_slice(data);
            file.write_all(&padded)
        };
        written.map_err(|err| {
            Error::io_failure(format!(
                "failed to write block {block_id}: possible disk full: {err}"
            ))
            .with_code(-5)
        })?;

        Ok(())
    }

    fn block_count(&self) -> u64 {
        self.state.lock().block_count
    }

    fn block_size(&self) -> u64 {
        self.state.lock().block_size
    }
}
