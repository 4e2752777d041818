//! Process-wide secure heap.
//!
//! A single anonymous mapping backs all [`SecureBytes`](super::SecureBytes)
//! allocations. The mapping is `mlock`ed so secrets never reach swap, and
//! every freed range is zeroized before it becomes reusable. A first-fit
//! free list keeps the allocator simple; allocations are rounded up to the
//! configured minimum granularity.

use crate::error::{Error, VaultResult};
use parking_lot::Mutex;
use std::io;
use std::ptr::{self, NonNull};
use zeroize::Zeroize;

/// Default secure heap size: 64 MiB.
pub const DEFAULT_SECURE_HEAP_SIZE: usize = 64 * 1024 * 1024;

/// Default minimum allocation granularity: 64 bytes.
pub const DEFAULT_MIN_ALLOCATION: usize = 64;

/// A free range inside the heap, in bytes from the mapping base.
#[derive(Debug, Clone, Copy)]
struct FreeRange {
    offset: usize,
    len: usize,
}

/// A locked anonymous mapping with a first-fit free-list allocator.
struct Heap {
    base: *mut u8,
    size: usize,
    min_allocation: usize,
    /// Free ranges, sorted by offset, coalesced.
    free: Vec<FreeRange>,
    /// Count of live allocations; teardown refuses while non-zero.
    live: usize,
    /// Whether `mlock` succeeded on the mapping.
    locked: bool,
}

// The raw pointer never leaves the mutex-guarded heap.
unsafe impl Send for Heap {}

impl Heap {
    fn new(size: usize, min_allocation: usize) -> VaultResult<Self> {
        if size == 0 {
            return Err(Error::invalid_argument("secure heap size must be non-zero"));
        }
        if min_allocation == 0 || !min_allocation.is_power_of_two() {
            return Err(Error::invalid_argument(
                "minimum allocation must be a non-zero power of two",
            ));
        }
        if size < min_allocation {
            return Err(Error::invalid_argument(
                "secure heap size must be at least one allocation unit",
            ));
        }

        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            let errno = io::Error::last_os_error().raw_os_error().unwrap_or(0);
            return Err(Error::allocation_failure("failed to map secure heap").with_code(errno));
        }

        let locked = unsafe { libc::mlock(base, size) } == 0;
        if !locked {
            tracing::warn!(size, "mlock on secure heap failed; secrets may be swappable");
        }

        Ok(Self {
            base: base.cast::<u8>(),
            size,
            min_allocation,
            free: vec![FreeRange { offset: 0, len: size }],
            live: 0,
            locked,
        })
    }

    fn allocate(&mut self, len: usize) -> VaultResult<(NonNull<u8>, usize)> {
        debug_assert!(len > 0, "zero-length allocations never reach the heap");

        let granted = round_up(len, self.min_allocation)
            .ok_or_else(|| Error::allocation_failure("allocation size overflow"))?;

        let slot = self
            .free
            .iter()
            .position(|range| range.len >= granted)
            .ok_or_else(|| Error::allocation_failure("secure heap exhausted"))?;

        let range = self.free[slot];
        if range.len == granted {
            self.free.remove(slot);
        } else {
            self.free[slot] = FreeRange {
                offset: range.offset + granted,
                len: range.len - granted,
            };
        }
        self.live += 1;

        let ptr = unsafe { self.base.add(range.offset) };
        Ok((NonNull::new(ptr).expect("heap base is non-null"), granted))
    }

    /// Zeroizes and returns `granted` bytes at `ptr` to the free list.
    fn deallocate(&mut self, ptr: NonNull<u8>, granted: usize) {
        let offset = ptr.as_ptr() as usize - self.base as usize;
        debug_assert!(offset + granted <= self.size);

        unsafe {
            std::slice::from_raw_parts_mut(ptr.as_ptr(), granted).zeroize();
        }

        insert_free(&mut self.free, FreeRange { offset, len: granted });
        self.live -= 1;
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        unsafe {
            std::slice::from_raw_parts_mut(self.base, self.size).zeroize();
            if self.locked {
                libc::munlock(self.base.cast(), self.size);
            }
            if libc::munmap(self.base.cast(), self.size) != 0 {
                tracing::warn!("failed to unmap secure heap");
            }
        }
    }
}

fn round_up(len: usize, unit: usize) -> Option<usize> {
    len.checked_add(unit - 1).map(|n| n & !(unit - 1))
}

/// Inserts a range into the sorted free list, coalescing with neighbors.
fn insert_free(free: &mut Vec<FreeRange>, range: FreeRange) {
    let idx = free.partition_point(|r| r.offset < range.offset);
    free.insert(idx, range);

    // Merge with the successor first so indices stay valid.
    if idx + 1 < free.len() && free[idx].offset + free[idx].len == free[idx + 1].offset {
        free[idx].len += free[idx + 1].len;
        free.remove(idx + 1);
    }
    if idx > 0 && free[idx - 1].offset + free[idx - 1].len == free[idx].offset {
        free[idx - 1].len += free[idx].len;
        free.remove(idx);
    }
}

static HEAP: Mutex<Option<Heap>> = Mutex::new(None);

/// Initializes the process-wide secure heap.
///
/// Must be called before the first [`SecureBytes`](super::SecureBytes)
/// allocation. Calling it again while the heap is live is a no-op.
///
/// The mapping is locked in RAM via `mlock`; on platforms or under limits
/// (`RLIMIT_MEMLOCK`) where locking fails, a warning is logged and the
/// heap proceeds unlocked - zeroization on release is unaffected.
///
/// # Errors
///
/// Returns `InvalidArgument` if `size` is zero, `min_allocation` is zero
/// or not a power of two, or `size < min_allocation`. Returns
/// `AllocationFailure` if the mapping cannot be created.
pub fn initialize_secure_heap(size: usize, min_allocation: usize) -> VaultResult<()> {
    let mut heap = HEAP.lock();
    if heap.is_some() {
        return Ok(());
    }
    *heap = Some(Heap::new(size, min_allocation)?);
    tracing::info!(size, min_allocation, "secure heap initialized");
    Ok(())
}

/// Initializes the secure heap with the default size and granularity.
///
/// # Errors
///
/// See [`initialize_secure_heap`].
pub fn initialize_secure_heap_default() -> VaultResult<()> {
    initialize_secure_heap(DEFAULT_SECURE_HEAP_SIZE, DEFAULT_MIN_ALLOCATION)
}

/// Tears down the secure heap, zeroizing and unmapping the whole region.
///
/// # Errors
///
/// Returns `InvalidState` if the heap is not initialized or if any secure
/// buffer is still live.
pub fn cleanup_secure_heap() -> VaultResult<()> {
    let mut guard = HEAP.lock();
    let heap = match guard.take() {
        Some(heap) => heap,
        None => return Err(Error::invalid_state("secure heap is not initialized")),
    };

    if heap.live > 0 {
        let live = heap.live;
        *guard = Some(heap);
        return Err(Error::invalid_state(format!(
            "secure heap still in use: {live} live buffers"
        )));
    }

    drop(heap);
    tracing::info!("secure heap released");
    Ok(())
}

/// Allocates `len` bytes from the global heap.
///
/// Returns the pointer and the granted capacity (rounded up to the
/// minimum allocation unit). Fails closed when the heap is uninitialized.
pub(crate) fn allocate(len: usize) -> VaultResult<(NonNull<u8>, usize)> {
    let mut guard = HEAP.lock();
    let heap = guard
        .as_mut()
        .ok_or_else(|| Error::allocation_failure("secure heap is not initialized"))?;
    heap.allocate(len)
}

/// Returns `granted` bytes at `ptr` to the global heap.
pub(crate) fn deallocate(ptr: NonNull<u8>, granted: usize) {
    let mut guard = HEAP.lock();
    if let Some(heap) = guard.as_mut() {
        // The live-count teardown guard makes a missing heap unreachable
        // while any buffer exists.
        heap.deallocate(ptr, granted);
    }
}
