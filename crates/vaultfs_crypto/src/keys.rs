//! Key management: random generation, PBKDF2 derivation, verification.

use hmac::Hmac;
use pbkdf2::pbkdf2;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;
use vaultfs_core::{Error, SecureBytes, VaultResult};

/// Default master key size in bytes (256 bits).
pub const DEFAULT_MASTER_KEY_SIZE: usize = 32;
/// Largest master key the generator will produce.
pub const MAX_MASTER_KEY_SIZE: usize = 512;
/// Default salt size in bytes.
pub const DEFAULT_SALT_SIZE: usize = 16;
/// Largest salt the generator will produce.
pub const MAX_SALT_SIZE: usize = 64;
/// Largest derived key accepted by password verification.
pub const MAX_DERIVED_KEY_SIZE: usize = 64;
/// Default PBKDF2 iteration count.
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 100_000;

/// Key-derivation algorithm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyDerivationAlgorithm {
    /// PBKDF2 with HMAC-SHA256.
    #[default]
    Pbkdf2HmacSha256,
    /// PBKDF2 with HMAC-SHA512.
    Pbkdf2HmacSha512,
}

/// Stateless key-management operations.
///
/// All secret material flows through [`SecureBytes`], so generated keys,
/// salts, and derived keys are wiped when released. `KeyManager` is not
/// instantiable; every operation is an associated function.
pub struct KeyManager {
    _private: (),
}

impl KeyManager {
    /// Generates a cryptographically secure random master key.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` unless `size` is within
    /// `1..=`[`MAX_MASTER_KEY_SIZE`]; `CryptoFailure` if the OS RNG fails.
    pub fn generate_master_key(size: usize) -> VaultResult<SecureBytes> {
        if size == 0 || size > MAX_MASTER_KEY_SIZE {
            return Err(Error::invalid_argument(format!(
                "master key size must be within 1..={MAX_MASTER_KEY_SIZE} bytes, got {size}"
            )));
        }
        let mut key = SecureBytes::with_len(size)?;
        fill_random(key.as_mut_slice())?;
        Ok(key)
    }

    /// Generates a cryptographically secure random salt.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` unless `size` is within
    /// `1..=`[`MAX_SALT_SIZE`]; `CryptoFailure` if the OS RNG fails.
    pub fn generate_salt(size: usize) -> VaultResult<SecureBytes> {
        if size == 0 || size > MAX_SALT_SIZE {
            return Err(Error::invalid_argument(format!(
                "salt size must be within 1..={MAX_SALT_SIZE} bytes, got {size}"
            )));
        }
        let mut salt = SecureBytes::with_len(size)?;
        fill_random(salt.as_mut_slice())?;
        Ok(salt)
    }

    /// Derives a key of `derived_key_size` bytes from a password and salt.
    ///
    /// PBKDF2 strengthens low-entropy passwords by iterated HMAC; use
    /// [`DEFAULT_PBKDF2_ITERATIONS`] unless a deployment has measured
    /// reasons to deviate.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty password, empty salt, or
    /// zero output size; `CryptoFailure` if derivation fails.
    pub fn derive_key(
        password: &[u8],
        salt: &[u8],
        derived_key_size: usize,
        algorithm: KeyDerivationAlgorithm,
        iterations: u32,
    ) -> VaultResult<SecureBytes> {
        if password.is_empty() || salt.is_empty() || derived_key_size == 0 {
            return Err(Error::invalid_argument(
                "password, salt, and derived key size must all be non-empty",
            ));
        }

        let mut derived = SecureBytes::with_len(derived_key_size)?;
        let out = derived.as_mut_slice();
        match algorithm {
            KeyDerivationAlgorithm::Pbkdf2HmacSha256 => {
                pbkdf2::<Hmac<Sha256>>(password, salt, iterations, out).map_err(|_| {
                    Error::crypto_failure("key derivation failed (PBKDF2-HMAC-SHA256)")
                })?;
            }
            KeyDerivationAlgorithm::Pbkdf2HmacSha512 => {
                pbkdf2::<Hmac<Sha512>>(password, salt, iterations, out).map_err(|_| {
                    Error::crypto_failure("key derivation failed (PBKDF2-HMAC-SHA512)")
                })?;
            }
        }
        Ok(derived)
    }

    /// Verifies a password against an expected derived key.
    ///
    /// Derives a key with identical parameters and compares it to
    /// `expected_derived_key` in constant time, so timing reveals nothing
    /// about the position of the first differing byte. The locally derived
    /// key is wiped before returning.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty password or salt, a
    /// `derived_key_size` outside `1..=`[`MAX_DERIVED_KEY_SIZE`], or an
    /// `expected_derived_key` whose length differs from
    /// `derived_key_size`; `CryptoFailure` if derivation fails.
    pub fn verify_password(
        password: &[u8],
        salt: &[u8],
        expected_derived_key: &[u8],
        derived_key_size: usize,
        algorithm: KeyDerivationAlgorithm,
        iterations: u32,
    ) -> VaultResult<bool> {
        if password.is_empty() {
            return Err(Error::invalid_argument("password cannot be empty"));
        }
        if salt.is_empty() {
            return Err(Error::invalid_argument("salt cannot be empty"));
        }
        if derived_key_size == 0 || derived_key_size > MAX_DERIVED_KEY_SIZE {
            return Err(Error::invalid_argument(format!(
                "derived key size must be within 1..={MAX_DERIVED_KEY_SIZE} bytes, got {derived_key_size}"
            )));
        }
        if expected_derived_key.len() != derived_key_size {
            return Err(Error::invalid_argument(
                "expected derived key length does not match the requested size",
            ));
        }

        let derived = Self::derive_key(password, salt, derived_key_size, algorithm, iterations)
            .map_err(|err| match err.kind() {
                vaultfs_core::ErrorKind::CryptoFailure => {
                    Error::crypto_failure("key derivation failed during verification")
                }
                _ => err,
            })?;

        // Wiped on drop; comparison is constant-time over the full length.
        let matches: bool = derived.as_slice().ct_eq(expected_derived_key).into();
        Ok(matches)
    }
}

fn fill_random(out: &mut [u8]) -> VaultResult<()> {
    OsRng
        .try_fill_bytes(out)
        .map_err(|err| Error::crypto_failure(format!("secure random generation failed: {err}")))
}
