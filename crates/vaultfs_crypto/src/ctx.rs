//! Owning AES-256-GCM cipher context.

use aes_gcm::aead::AeadInPlace;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce, Tag};
use vaultfs_core::{Error, SecureBytes, VaultResult};
use zeroize::Zeroize;

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;
/// GCM nonce size in bytes (96 bits).
pub const NONCE_SIZE: usize = 12;
/// GCM authentication tag size in bytes (128 bits).
pub const TAG_SIZE: usize = 16;

/// Direction a context is initialized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherMode {
    /// Sealing: plaintext in, ciphertext and tag out.
    Encrypt,
    /// Opening: ciphertext and tag in, plaintext out.
    Decrypt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// No key material installed.
    Clean,
    /// Initialized for one encrypt or decrypt pass.
    Ready(CipherMode),
    /// A failed `init`; must be `reset` before reuse.
    Poisoned,
}

/// An owning handle to a single AES-256-GCM cipher state.
///
/// Lifecycle: constructed clean, [`init`](GcmContext::init)ed with a key,
/// nonce, and mode, then driven through exactly one
/// [`encrypt_final`](GcmContext::encrypt_final) or
/// [`decrypt_final`](GcmContext::decrypt_final), after which it returns to
/// clean. A failed `init` poisons the context: every operation except
/// [`reset`](GcmContext::reset) fails until reset.
///
/// Contexts are single-threaded values; thread-safe sharing is the
/// [pool](crate::GcmContextPool)'s job. Moves are permitted, copies are
/// not.
pub struct GcmContext {
    cipher: Option<Aes256Gcm>,
    nonce: [u8; NONCE_SIZE],
    state: State,
}

impl std::fmt::Debug for GcmContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcmContext")
            .field("state", &self.state)
            .finish()
    }
}

impl GcmContext {
    /// Creates a clean context with no key material installed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cipher: None,
            nonce: [0u8; NONCE_SIZE],
            state: State::Clean,
        }
    }

    /// Returns the context to a clean state.
    ///
    /// Drops the key schedule and wipes the stored nonce. Idempotent and
    /// infallible; the required recovery step after a failed `init`.
    pub fn reset(&mut self) {
        self.cipher = None;
        self.nonce.zeroize();
        self.state = State::Clean;
    }

    /// Initializes the context for one encrypt or decrypt pass.
    ///
    /// The sequence mirrors the cipher's own setup order: reset, select
    /// AES-256-GCM, set the nonce length, install key and nonce. Any
    /// failing step leaves the context poisoned.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty nonce, `CryptoFailure`
    /// naming the failed step otherwise. Only 96-bit nonces are accepted:
    /// the AEAD backend fixes GCM's standard nonce size at the type level.
    pub fn init(&mut self, key: &[u8], nonce: &[u8], mode: CipherMode) -> VaultResult<()> {
        self.reset();

        if nonce.is_empty() {
            return Err(self.poison(Error::invalid_argument("nonce must be non-empty")));
        }
        if nonce.len() != NONCE_SIZE {
            return Err(self.poison(Error::crypto_failure(format!(
                "failed to set nonce length: expected {NONCE_SIZE} bytes, got {}",
                nonce.len()
            ))));
        }

        let cipher = match Aes256Gcm::new_from_slice(key) {
            Ok(cipher) => cipher,
            Err(_) => {
                return Err(self.poison(Error::crypto_failure(format!(
                    "failed to install key: expected {KEY_SIZE} bytes, got {}",
                    key.len()
                ))));
            }
        };

        self.cipher = Some(cipher);
        self.nonce.copy_from_slice(nonce);
        self.state = State::Ready(mode);
        Ok(())
    }

    /// Encrypts `buffer` in place and returns the 16-byte tag.
    ///
    /// Consumes the initialization: the context is clean again afterwards
    /// and must be re-`init`ed before the next pass. Ciphertext length
    /// equals plaintext length.
    ///
    /// # Errors
    ///
    /// Returns `CryptoFailure` if the context is not initialized for
    /// encryption, is poisoned, or the cipher fails.
    pub fn encrypt_final(&mut self, buffer: &mut SecureBytes) -> VaultResult<SecureBytes> {
        let cipher = self.take_ready(CipherMode::Encrypt)?;
        let nonce = Nonce::from_slice(&self.nonce);

        let result = cipher.encrypt_in_place_detached(nonce, b"", buffer.as_mut_slice());
        let tag = match result {
            Ok(tag) => tag,
            Err(_) => {
                self.state = State::Poisoned;
                return Err(Error::crypto_failure("encryption finalization failed"));
            }
        };

        let tag_bytes = SecureBytes::from_slice(tag.as_slice())?;
        self.reset();
        Ok(tag_bytes)
    }

    /// Decrypts `buffer` in place after verifying `tag`.
    ///
    /// The tag is checked before any keystream is applied, so on failure
    /// the buffer still holds the untouched ciphertext and no plaintext
    /// byte is produced. Consumes the initialization either way.
    ///
    /// # Errors
    ///
    /// Returns `CryptoFailure` if the context is not initialized for
    /// decryption or the tag has the wrong length;
    /// `AuthenticationFailure` when tag verification fails.
    pub fn decrypt_final(&mut self, buffer: &mut SecureBytes, tag: &[u8]) -> VaultResult<()> {
        let cipher = self.take_ready(CipherMode::Decrypt)?;

        if tag.len() != TAG_SIZE {
            self.state = State::Poisoned;
            return Err(Error::crypto_failure(format!(
                "failed to set authentication tag: expected {TAG_SIZE} bytes, got {}",
                tag.len()
            )));
        }

        let nonce = Nonce::from_slice(&self.nonce);
        let verdict = cipher.decrypt_in_place_detached(
            nonce,
            b"",
            buffer.as_mut_slice(),
            Tag::from_slice(tag),
        );
        self.reset();

        verdict.map_err(|_| {
            Error::authentication_failure("tag verification failed: data corrupted or tampered")
        })
    }

    /// Marks the context poisoned and passes the error through.
    fn poison(&mut self, err: Error) -> Error {
        self.cipher = None;
        self.state = State::Poisoned;
        err
    }

    fn take_ready(&mut self, expected: CipherMode) -> VaultResult<Aes256Gcm> {
        match self.state {
            State::Poisoned => Err(Error::crypto_failure(
                "cipher context is poisoned; reset before reuse",
            )),
            State::Ready(mode) if mode == expected => Ok(self
                .cipher
                .take()
                .expect("ready context always holds a cipher")),
            State::Ready(_) | State::Clean => Err(Error::crypto_failure(format!(
                "cipher context not initialized for {expected:?}"
            ))),
        }
    }
}

impl Default for GcmContext {
    fn default() -> Self {
        Self::new()
    }
}
