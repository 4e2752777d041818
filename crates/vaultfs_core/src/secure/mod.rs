//! Secure memory for VaultFS.
//!
//! Every byte that carries a key, password, salt, plaintext, or derived
//! key lives in memory obtained from a process-wide *secure heap*: an
//! anonymous mapping that is locked in RAM where the platform allows and
//! whose bytes are overwritten with zero before any release.
//!
//! The heap must be initialized once, up front, with
//! [`initialize_secure_heap`]. Allocation through [`SecureBytes`] fails
//! closed when the heap is uninitialized or exhausted - there is no silent
//! fallback to the system allocator.

mod arena;
mod bytes;

pub use arena::{
    cleanup_secure_heap, initialize_secure_heap, initialize_secure_heap_default,
    DEFAULT_MIN_ALLOCATION, DEFAULT_SECURE_HEAP_SIZE,
};
pub use bytes::SecureBytes;
