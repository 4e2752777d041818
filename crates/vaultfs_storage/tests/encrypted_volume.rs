//! End-to-end flow over an encrypted volume: encrypt through the provider,
//! store through block storage, read back, decrypt, and verify that
//! on-disk tampering surfaces as an authentication failure.

use rand::RngCore;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;
use vaultfs_core::{
    initialize_secure_heap_default, EncryptionProvider, ErrorKind, SecureBytes, StorageProvider,
};
use vaultfs_crypto::{AesGcmProvider, KeyManager};
use vaultfs_storage::{BlockStorage, BlockStorageConfig};

const BLOCK_SIZE: u64 = 4096;
const CONFIG: BlockStorageConfig = BlockStorageConfig::new(BLOCK_SIZE, BLOCK_SIZE * 32);

fn setup(dir: &tempfile::TempDir) -> (AesGcmProvider, BlockStorage) {
    initialize_secure_heap_default().unwrap();

    let path = dir.path().join("volume.dat");
    BlockStorage::create(&path, &CONFIG).unwrap();
    let storage = BlockStorage::new();
    storage.mount(&path, &CONFIG).unwrap();

    let key = KeyManager::generate_master_key(32).unwrap();
    let provider = AesGcmProvider::new(key, 4).unwrap();
    (provider, storage)
}

/// The per-block record the metadata collaborator would persist.
struct StoredBlock {
    block_id: u64,
    len: usize,
    nonce: SecureBytes,
    tag: SecureBytes,
}

fn store(
    provider: &AesGcmProvider,
    storage: &BlockStorage,
    block_id: u64,
    plaintext: &[u8],
) -> StoredBlock {
    let mut nonce = SecureBytes::new();
    let mut tag = SecureBytes::new();
    let ciphertext = provider.encrypt(plaintext, &mut nonce, &mut tag).unwrap();
    assert_eq!(ciphertext.len(), plaintext.len());

    storage.write_block(block_id, &ciphertext).unwrap();
    StoredBlock {
        block_id,
        len: plaintext.len(),
        nonce,
        tag,
    }
}

fn load(
    provider: &AesGcmProvider,
    storage: &BlockStorage,
    record: &StoredBlock,
) -> Result<SecureBytes, vaultfs_core::Error> {
    let block = storage.read_block(record.block_id)?;
    provider.decrypt(&block[..record.len], &record.nonce, &record.tag)
}

#[test]
fn encrypted_write_read_round_trip() {
    let dir = tempdir().unwrap();
    let (provider, storage) = setup(&dir);

    let mut plaintext = vec![0u8; 4000];
    rand::thread_rng().fill_bytes(&mut plaintext);

    let record = store(&provider, &storage, 5, &plaintext);
    storage.flush().unwrap();

    let recovered = load(&provider, &storage, &record).unwrap();
    assert_eq!(recovered.as_slice(), plaintext.as_slice());
}

#[test]
fn full_block_payloads_fit_exactly() {
    let dir = tempdir().unwrap();
    let (provider, storage) = setup(&dir);

    // GCM adds no padding, so a block-sized plaintext yields a
    // block-sized ciphertext.
    let plaintext = vec![0xA5u8; BLOCK_SIZE as usize];
    let record = store(&provider, &storage, 0, &plaintext);

    let recovered = load(&provider, &storage, &record).unwrap();
    assert_eq!(recovered.as_slice(), plaintext.as_slice());
}

#[test]
fn on_disk_tampering_fails_authentication() {
    let dir = tempdir().unwrap();
    let (provider, storage) = setup(&dir);

    let plaintext = vec![0x33u8; 1024];
    let record = store(&provider, &storage, 9, &plaintext);

    // Corrupt one ciphertext byte directly on the volume.
    let mut block = storage.read_block(9).unwrap();
    block[100] ^= 0x01;
    storage.write_block(9, &block).unwrap();

    let err = load(&provider, &storage, &record).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthenticationFailure);
}

#[test]
fn stale_record_fails_after_overwrite() {
    let dir = tempdir().unwrap();
    let (provider, storage) = setup(&dir);

    let first = store(&provider, &storage, 3, b"first generation payload");
    let second = store(&provider, &storage, 3, b"second generation payload");

    // The old nonce/tag no longer match what is on disk.
    let err = load(&provider, &storage, &first).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthenticationFailure);

    let recovered = load(&provider, &storage, &second).unwrap();
    assert_eq!(recovered.as_slice(), b"second generation payload");
}

#[test]
fn concurrent_encrypted_writers() {
    let dir = tempdir().unwrap();
    let (provider, storage) = setup(&dir);
    let provider = Arc::new(provider);
    let storage = Arc::new(storage);

    let mut workers = Vec::new();
    for worker in 0u8..4 {
        let provider = Arc::clone(&provider);
        let storage = Arc::clone(&storage);
        workers.push(thread::spawn(move || {
            for round in 0..8u64 {
                let block_id = u64::from(worker) * 8 + round;
                let plaintext = vec![worker ^ (round as u8); 2048];
                let record = store(&provider, &storage, block_id, &plaintext);
                let recovered = load(&provider, &storage, &record).unwrap();
                assert_eq!(recovered.as_slice(), plaintext.as_slice());
            }
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }
}

#[test]
fn no_torn_blocks_under_contention() {
    let dir = tempdir().unwrap();
    let (_, storage) = setup(&dir);
    let storage = Arc::new(storage);

    // Two writers hammer one block with distinct uniform patterns; every
    // read must observe exactly one pattern, never a mix.
    let mut workers = Vec::new();
    for pattern in [0xAAu8, 0x55u8] {
        let storage = Arc::clone(&storage);
        workers.push(thread::spawn(move || {
            for _ in 0..50 {
                storage
                    .write_block(0, &vec![pattern; BLOCK_SIZE as usize])
                    .unwrap();
            }
        }));
    }
    let reader = {
        let storage = Arc::clone(&storage);
        thread::spawn(move || {
            for _ in 0..100 {
                let block = storage.read_block(0).unwrap();
                let first = block[0];
                assert!(first == 0 || first == 0xAA || first == 0x55);
                assert!(block.iter().all(|&b| b == first), "torn block observed");
            }
        })
    };

    for worker in workers {
        worker.join().unwrap();
    }
    reader.join().unwrap();
}
