//! Error types for VaultFS.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for VaultFS operations.
pub type VaultResult<T> = Result<T, Error>;

/// Classification of every failure VaultFS can surface.
///
/// The set is closed: new failure modes must be mapped onto one of these
/// kinds rather than extending the enum ad hoc, so callers can match
/// exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad geometry, sizes, empty inputs, out-of-range block ids, or
    /// wrong key/nonce/tag lengths.
    InvalidArgument,
    /// Operation not permitted in the current lifecycle state
    /// (e.g. I/O on an unmounted volume).
    InvalidState,
    /// Open, seek, short read, write, close, or flush failure.
    IoFailure,
    /// Cipher initialization, RNG, or key-derivation failure.
    CryptoFailure,
    /// GCM tag verification failed on decrypt.
    ///
    /// Kept strictly separate from [`CryptoFailure`](ErrorKind::CryptoFailure):
    /// this kind is the signal for tampering or on-disk corruption.
    AuthenticationFailure,
    /// Secure heap uninitialized or exhausted.
    AllocationFailure,
    /// A timed operation gave up waiting.
    Timeout,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidArgument => "invalid argument",
            Self::InvalidState => "invalid state",
            Self::IoFailure => "I/O failure",
            Self::CryptoFailure => "crypto failure",
            Self::AuthenticationFailure => "authentication failure",
            Self::AllocationFailure => "allocation failure",
            Self::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// A structured VaultFS error.
///
/// Carries the failure [`kind`](Error::kind), a human-readable message, and
/// a numeric code: the OS errno for I/O failures where available, a
/// component-specific subcode otherwise, `0` when unused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    code: i32,
}

impl Error {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: 0,
        }
    }

    /// Attaches a numeric code (OS errno or component subcode).
    #[must_use]
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }

    /// Returns the error classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the numeric code (`0` when unused).
    #[must_use]
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Creates an [`ErrorKind::InvalidArgument`] error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    /// Creates an [`ErrorKind::InvalidState`] error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidState, message)
    }

    /// Creates an [`ErrorKind::IoFailure`] error.
    pub fn io_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IoFailure, message)
    }

    /// Creates an [`ErrorKind::CryptoFailure`] error.
    pub fn crypto_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CryptoFailure, message)
    }

    /// Creates an [`ErrorKind::AuthenticationFailure`] error.
    pub fn authentication_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthenticationFailure, message)
    }

    /// Creates an [`ErrorKind::AllocationFailure`] error.
    pub fn allocation_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AllocationFailure, message)
    }

    /// Creates an [`ErrorKind::Timeout`] error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        let code = err.raw_os_error().unwrap_or(0);
        Self::new(ErrorKind::IoFailure, err.to_string()).with_code(code)
    }
}
