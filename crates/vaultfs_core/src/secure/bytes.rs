//! Owning byte buffer backed by the secure heap.

use crate::error::VaultResult;
use crate::secure::arena;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use zeroize::Zeroize;

/// A contiguous, resizable byte buffer allocated from the secure heap.
///
/// The backing memory is page-locked (where the platform allows) and is
/// overwritten with zero at every point of release: on drop, on shrink,
/// and when a grow abandons the old allocation.
///
/// `SecureBytes` is move-only; duplication is explicit and fallible via
/// [`try_clone`](SecureBytes::try_clone), because it allocates from the
/// secure heap and the heap may be exhausted.
///
/// # Example
///
/// ```rust
/// use vaultfs_core::{initialize_secure_heap_default, SecureBytes};
///
/// initialize_secure_heap_default().unwrap();
/// let mut key = SecureBytes::with_len(32).unwrap();
/// key.as_mut_slice()[0] = 0x42;
/// assert_eq!(key.len(), 32);
/// // Dropping `key` wipes the backing memory.
/// ```
pub struct SecureBytes {
    /// Dangling when `cap == 0`; no allocation backs an empty buffer.
    ptr: NonNull<u8>,
    len: usize,
    cap: usize,
}

// The buffer uniquely owns its heap range.
unsafe impl Send for SecureBytes {}
unsafe impl Sync for SecureBytes {}

impl SecureBytes {
    /// Creates an empty buffer without touching the secure heap.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
            cap: 0,
        }
    }

    /// Creates a zero-filled buffer of `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns `AllocationFailure` when the secure heap is uninitialized
    /// or exhausted.
    pub fn with_len(len: usize) -> VaultResult<Self> {
        if len == 0 {
            return Ok(Self::new());
        }
        let (ptr, cap) = arena::allocate(len)?;
        unsafe {
            std::ptr::write_bytes(ptr.as_ptr(), 0, cap);
        }
        Ok(Self { ptr, len, cap })
    }

    /// Creates a buffer holding a copy of `data`.
    ///
    /// # Errors
    ///
    /// Returns `AllocationFailure` when the secure heap is uninitialized
    /// or exhausted.
    pub fn from_slice(data: &[u8]) -> VaultResult<Self> {
        let mut buf = Self::with_len(data.len())?;
        buf.as_mut_slice().copy_from_slice(data);
        Ok(buf)
    }

    /// Returns the number of live bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the bytes as a shared slice.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        if self.len == 0 {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Returns the bytes as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        if self.len == 0 {
            return &mut [];
        }
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Resizes the buffer to `new_len` bytes.
    ///
    /// Growth beyond the current capacity moves the contents to a fresh
    /// allocation and wipes the abandoned one; new bytes read as zero.
    /// Shrinking wipes the released tail in place.
    ///
    /// # Errors
    ///
    /// Returns `AllocationFailure` if a grow cannot be satisfied; the
    /// buffer is left unchanged in that case.
    pub fn resize(&mut self, new_len: usize) -> VaultResult<()> {
        if new_len <= self.cap {
            if new_len < self.len {
                unsafe {
                    std::slice::from_raw_parts_mut(self.ptr.as_ptr().add(new_len), self.len - new_len)
                        .zeroize();
                }
            } else if new_len > self.len {
                unsafe {
                    std::ptr::write_bytes(self.ptr.as_ptr().add(self.len), 0, new_len - self.len);
                }
            }
            self.len = new_len;
            return Ok(());
        }

        let (ptr, cap) = arena::allocate(new_len)?;
        unsafe {
            std::ptr::copy_nonoverlapping(self.ptr.as_ptr(), ptr.as_ptr(), self.len);
            std::ptr::write_bytes(ptr.as_ptr().add(self.len), 0, cap - self.len);
        }
        if self.cap > 0 {
            arena::deallocate(self.ptr, self.cap);
        }
        self.ptr = ptr;
        self.cap = cap;
        self.len = new_len;
        Ok(())
    }

    /// Shortens the buffer to `new_len` bytes, wiping the released tail.
    ///
    /// Lengths greater than the current length are ignored.
    pub fn truncate(&mut self, new_len: usize) {
        if new_len < self.len {
            // Within capacity; cannot fail.
            let _ = self.resize(new_len);
        }
    }

    /// Removes all bytes, wiping them.
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Returns a wiped-on-release copy of this buffer.
    ///
    /// # Errors
    ///
    /// Returns `AllocationFailure` when the secure heap is exhausted.
    pub fn try_clone(&self) -> VaultResult<Self> {
        Self::from_slice(self.as_slice())
    }
}

impl Default for SecureBytes {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SecureBytes {
    fn drop(&mut self) {
        if self.cap > 0 {
            arena::deallocate(self.ptr, self.cap);
        }
    }
}

impl Deref for SecureBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl DerefMut for SecureBytes {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl AsRef<[u8]> for SecureBytes {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl PartialEq for SecureBytes {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for SecureBytes {}

impl fmt::Debug for SecureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Contents stay out of logs and panic messages.
        f.debug_struct("SecureBytes").field("len", &self.len).finish()
    }
}
