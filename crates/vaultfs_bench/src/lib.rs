//! Shared fixtures for the VaultFS benchmarks.

use tempfile::TempDir;
use vaultfs_core::initialize_secure_heap;
use vaultfs_crypto::{AesGcmProvider, KeyManager};
use vaultfs_storage::{BlockStorage, BlockStorageConfig};

/// Heap large enough that allocation never dominates a measurement.
const BENCH_HEAP_SIZE: usize = 256 * 1024 * 1024;

/// Initializes the secure heap with bench-sized headroom.
pub fn init_heap() {
    initialize_secure_heap(BENCH_HEAP_SIZE, 64).expect("secure heap");
}

/// Builds an encryption provider over a fresh random master key.
pub fn provider(pool_size: usize) -> AesGcmProvider {
    init_heap();
    let key = KeyManager::generate_master_key(32).expect("master key");
    AesGcmProvider::new(key, pool_size).expect("provider")
}

/// Creates and mounts a temporary volume; the `TempDir` keeps it alive.
pub fn temp_volume(block_size: u64, block_count: u64) -> (TempDir, BlockStorage) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = BlockStorageConfig::new(block_size, block_size * block_count);
    let path = dir.path().join("bench.dat");

    BlockStorage::create(&path, &config).expect("create volume");
    let storage = BlockStorage::new();
    storage.mount(&path, &config).expect("mount volume");
    (dir, storage)
}
