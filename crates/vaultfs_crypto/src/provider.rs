//! AES-256-GCM encryption provider.

use crate::ctx::{CipherMode, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
use crate::pool::GcmContextPool;
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;
use vaultfs_core::{EncryptionProvider, Error, SecureBytes, VaultResult};

/// The concrete [`EncryptionProvider`] for VaultFS: one-shot AES-256-GCM
/// over a bounded context pool.
///
/// The provider owns its 32-byte master key for its entire lifetime; the
/// key is moved in at construction and never exposed. Nonces are drawn
/// fresh from the OS CSPRNG per encryption, which makes collisions
/// probabilistically negligible under reasonable call rates - callers may
/// supply their own nonce only when they can guarantee uniqueness
/// themselves (deterministic tests being the usual case).
///
/// # Thread Safety
///
/// Safe to share across threads; each call holds exactly one pooled
/// context for its duration, so concurrency is bounded by the pool size.
///
/// # Example
///
/// ```rust
/// use vaultfs_core::{initialize_secure_heap_default, EncryptionProvider, SecureBytes};
/// use vaultfs_crypto::{AesGcmProvider, KeyManager};
///
/// initialize_secure_heap_default().unwrap();
/// let key = KeyManager::generate_master_key(32).unwrap();
/// let provider = AesGcmProvider::new(key, 4).unwrap();
///
/// let mut nonce = SecureBytes::new();
/// let mut tag = SecureBytes::new();
/// let ciphertext = provider.encrypt(b"payload", &mut nonce, &mut tag).unwrap();
/// let plaintext = provider.decrypt(&ciphertext, &nonce, &tag).unwrap();
/// assert_eq!(plaintext.as_slice(), b"payload");
/// ```
pub struct AesGcmProvider {
    key: SecureBytes,
    pool: Arc<GcmContextPool>,
}

impl AesGcmProvider {
    /// Default context pool size.
    pub const DEFAULT_POOL_SIZE: usize = 5;

    /// Creates a provider around a 32-byte master key.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the key is not exactly 32 bytes or
    /// `pool_size` is zero.
    pub fn new(master_key: SecureBytes, pool_size: usize) -> VaultResult<Self> {
        if master_key.len() != KEY_SIZE {
            return Err(Error::invalid_argument(format!(
                "master key must be 256 bits (32 bytes), got {}",
                master_key.len()
            )));
        }
        Ok(Self {
            key: master_key,
            pool: GcmContextPool::new(pool_size)?,
        })
    }

    /// The context pool backing this provider.
    #[must_use]
    pub fn pool(&self) -> &Arc<GcmContextPool> {
        &self.pool
    }
}

impl EncryptionProvider for AesGcmProvider {
    fn encrypt(
        &self,
        plaintext: &[u8],
        out_nonce: &mut SecureBytes,
        out_tag: &mut SecureBytes,
    ) -> VaultResult<SecureBytes> {
        if self.key.len() != KEY_SIZE {
            return Err(Error::invalid_argument(
                "master key must be 256 bits (32 bytes)",
            ));
        }

        if out_nonce.is_empty() {
            out_nonce.resize(NONCE_SIZE)?;
            OsRng.try_fill_bytes(out_nonce.as_mut_slice()).map_err(|err| {
                Error::crypto_failure(format!("nonce generation failed: {err}"))
            })?;
        } else if out_nonce.len() != NONCE_SIZE {
            return Err(Error::invalid_argument(format!(
                "nonce must be 96 bits (12 bytes), got {}",
                out_nonce.len()
            )));
        }

        out_tag.clear();
        out_tag.resize(TAG_SIZE)?;

        let mut buffer = SecureBytes::from_slice(plaintext)?;
        let mut ctx = self.pool.acquire();
        ctx.init(&self.key, out_nonce.as_slice(), CipherMode::Encrypt)?;
        let tag = ctx.encrypt_final(&mut buffer)?;

        out_tag.as_mut_slice().copy_from_slice(&tag);
        Ok(buffer)
    }

    fn decrypt(&self, ciphertext: &[u8], nonce: &[u8], tag: &[u8]) -> VaultResult<SecureBytes> {
        if self.key.len() != KEY_SIZE {
            return Err(Error::invalid_argument(
                "master key must be 256 bits (32 bytes)",
            ));
        }
        if nonce.len() != NONCE_SIZE {
            return Err(Error::invalid_argument(format!(
                "nonce must be 96 bits (12 bytes), got {}",
                nonce.len()
            )));
        }
        if tag.len() != TAG_SIZE {
            return Err(Error::invalid_argument(format!(
                "tag must be 128 bits (16 bytes), got {}",
                tag.len()
            )));
        }
        if ciphertext.is_empty() {
            return Err(Error::invalid_argument("ciphertext cannot be empty"));
        }

        let mut buffer = SecureBytes::from_slice(ciphertext)?;
        let mut ctx = self.pool.acquire();
        ctx.init(&self.key, nonce, CipherMode::Decrypt)?;
        ctx.decrypt_final(&mut buffer, tag)?;
        Ok(buffer)
    }

    fn iv_size(&self) -> usize {
        NONCE_SIZE
    }

    fn tag_size(&self) -> usize {
        TAG_SIZE
    }
}

impl std::fmt::Debug for AesGcmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmProvider")
            .field("key", &"[REDACTED]")
            .field("pool", &self.pool)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyManager;
    use std::thread;
    use vaultfs_core::{initialize_secure_heap_default, ErrorKind};

    fn provider() -> AesGcmProvider {
        initialize_secure_heap_default().unwrap();
        let key = KeyManager::generate_master_key(32).unwrap();
        AesGcmProvider::new(key, 4).unwrap()
    }

    #[test]
    fn wrong_key_size_is_rejected_at_construction() {
        initialize_secure_heap_default().unwrap();
        let short = SecureBytes::with_len(16).unwrap();
        let err = AesGcmProvider::new(short, 4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let long = SecureBytes::with_len(64).unwrap();
        assert!(AesGcmProvider::new(long, 4).is_err());
    }

    #[test]
    fn round_trip_eight_bytes() {
        let provider = provider();
        let plaintext: Vec<u8> = (0u8..8).collect();

        let mut nonce = SecureBytes::new();
        let mut tag = SecureBytes::new();
        let ciphertext = provider.encrypt(&plaintext, &mut nonce, &mut tag).unwrap();

        assert_eq!(ciphertext.len(), 8);
        assert_eq!(nonce.len(), 12);
        assert_eq!(tag.len(), 16);
        assert_ne!(ciphertext.as_slice(), plaintext.as_slice());

        let decrypted = provider.decrypt(&ciphertext, &nonce, &tag).unwrap();
        assert_eq!(decrypted.as_slice(), plaintext.as_slice());
    }

    #[test]
    fn fresh_nonces_every_call() {
        let provider = provider();
        let plaintext = b"same plaintext";

        let mut nonce1 = SecureBytes::new();
        let mut tag1 = SecureBytes::new();
        let ct1 = provider.encrypt(plaintext, &mut nonce1, &mut tag1).unwrap();

        let mut nonce2 = SecureBytes::new();
        let mut tag2 = SecureBytes::new();
        let ct2 = provider.encrypt(plaintext, &mut nonce2, &mut tag2).unwrap();

        assert_ne!(nonce1, nonce2);
        assert_ne!(ct1, ct2);
        assert_ne!(tag1, tag2);
    }

    #[test]
    fn caller_supplied_nonce_is_used_verbatim() {
        let provider = provider();
        let fixed = [0x5Au8; 12];

        let mut nonce1 = SecureBytes::from_slice(&fixed).unwrap();
        let mut tag1 = SecureBytes::new();
        let ct1 = provider.encrypt(b"payload", &mut nonce1, &mut tag1).unwrap();
        assert_eq!(nonce1.as_slice(), &fixed);

        let mut nonce2 = SecureBytes::from_slice(&fixed).unwrap();
        let mut tag2 = SecureBytes::new();
        let ct2 = provider.encrypt(b"payload", &mut nonce2, &mut tag2).unwrap();

        // Same key + nonce + plaintext is fully deterministic.
        assert_eq!(ct1, ct2);
        assert_eq!(tag1, tag2);
    }

    #[test]
    fn wrong_nonce_length_is_rejected() {
        let provider = provider();
        let mut nonce = SecureBytes::from_slice(&[0u8; 8]).unwrap();
        let mut tag = SecureBytes::new();
        let err = provider
            .encrypt(b"payload", &mut nonce, &mut tag)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn tamper_detection_on_every_component() {
        let provider = provider();
        let plaintext: Vec<u8> = (0u8..8).collect();

        let mut nonce = SecureBytes::new();
        let mut tag = SecureBytes::new();
        let ciphertext = provider.encrypt(&plaintext, &mut nonce, &mut tag).unwrap();

        // Flip one bit in the ciphertext.
        let mut bad_ct = ciphertext.try_clone().unwrap();
        bad_ct.as_mut_slice()[0] ^= 0x01;
        let err = provider.decrypt(&bad_ct, &nonce, &tag).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailure);

        // Flip one bit in the nonce.
        let mut bad_nonce = nonce.try_clone().unwrap();
        bad_nonce.as_mut_slice()[3] ^= 0x01;
        let err = provider.decrypt(&ciphertext, &bad_nonce, &tag).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailure);

        // Flip one bit in the tag.
        let mut bad_tag = tag.try_clone().unwrap();
        bad_tag.as_mut_slice()[15] ^= 0x01;
        let err = provider.decrypt(&ciphertext, &nonce, &bad_tag).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailure);

        // The untampered triple still decrypts.
        let decrypted = provider.decrypt(&ciphertext, &nonce, &tag).unwrap();
        assert_eq!(decrypted.as_slice(), plaintext.as_slice());
    }

    #[test]
    fn decrypt_validates_lengths() {
        let provider = provider();

        let err = provider
            .decrypt(b"ct", &[0u8; 11], &[0u8; 16])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = provider
            .decrypt(b"ct", &[0u8; 12], &[0u8; 15])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = provider.decrypt(b"", &[0u8; 12], &[0u8; 16]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn wrong_key_fails_authentication() {
        initialize_secure_heap_default().unwrap();
        let provider_a = provider();
        let provider_b = provider();

        let mut nonce = SecureBytes::new();
        let mut tag = SecureBytes::new();
        let ciphertext = provider_a.encrypt(b"secret", &mut nonce, &mut tag).unwrap();

        let err = provider_b.decrypt(&ciphertext, &nonce, &tag).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailure);
    }

    #[test]
    fn empty_plaintext_encrypts_but_never_decrypts() {
        let provider = provider();
        let mut nonce = SecureBytes::new();
        let mut tag = SecureBytes::new();

        let ciphertext = provider.encrypt(b"", &mut nonce, &mut tag).unwrap();
        assert!(ciphertext.is_empty());

        // The decrypt contract requires non-empty ciphertext.
        let err = provider.decrypt(&ciphertext, &nonce, &tag).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn sizes_are_fixed() {
        let provider = provider();
        assert_eq!(provider.iv_size(), 12);
        assert_eq!(provider.tag_size(), 16);
    }

    #[test]
    fn shared_across_threads() {
        let provider = std::sync::Arc::new(provider());

        let mut workers = Vec::new();
        for worker_id in 0u8..8 {
            let provider = std::sync::Arc::clone(&provider);
            workers.push(thread::spawn(move || {
                for round in 0u8..20 {
                    let plaintext = vec![worker_id ^ round; 256];
                    let mut nonce = SecureBytes::new();
                    let mut tag = SecureBytes::new();
                    let ciphertext = provider
                        .encrypt(&plaintext, &mut nonce, &mut tag)
                        .unwrap();
                    let decrypted = provider.decrypt(&ciphertext, &nonce, &tag).unwrap();
                    assert_eq!(decrypted.as_slice(), plaintext.as_slice());
                }
            }));
        }
        for worker in workers {
            worker.join().unwrap();
        }
    }
}
