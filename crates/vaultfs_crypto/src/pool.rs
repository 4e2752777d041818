//! Bounded, thread-safe pool of AES-GCM cipher contexts.

use crate::ctx::GcmContext;
use parking_lot::{Condvar, Mutex};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};
use vaultfs_core::{Error, VaultResult};

struct PoolState {
    /// Idle contexts; reuse is LIFO so recently-used key schedules stay
    /// cache-warm.
    idle: Vec<GcmContext>,
    /// Contexts ever created; never exceeds `max_size`, never decremented.
    current_size: usize,
}

/// A bounded pool of [`GcmContext`]s.
///
/// Pooling amortizes context allocation and bounds the number of
/// concurrent cipher operations. Acquisition blocks when all `max_size`
/// contexts are outstanding; release wakes exactly one waiter.
///
/// The pool is always held behind an [`Arc`]: every [`PoolHandle`] keeps a
/// strong reference so the pool cannot be dropped while a context is
/// outstanding.
///
/// # Example
///
/// ```rust
/// use vaultfs_crypto::GcmContextPool;
///
/// let pool = GcmContextPool::new(4).unwrap();
/// let ctx = pool.acquire();
/// assert_eq!(pool.capacity(), 4);
/// drop(ctx); // returned to the pool, one waiter signalled
/// ```
pub struct GcmContextPool {
    state: Mutex<PoolState>,
    available: Condvar,
    max_size: usize,
}

impl GcmContextPool {
    /// Creates a pool that will hold at most `max_size` contexts.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `max_size` is zero.
    pub fn new(max_size: usize) -> VaultResult<Arc<Self>> {
        if max_size == 0 {
            return Err(Error::invalid_argument("pool size must be at least 1"));
        }
        Ok(Arc::new(Self {
            state: Mutex::new(PoolState {
                idle: Vec::with_capacity(max_size),
                current_size: 0,
            }),
            available: Condvar::new(),
            max_size,
        }))
    }

    /// Acquires a context, blocking until one is available.
    ///
    /// Idle contexts are reused LIFO. When none is idle and the pool is
    /// below capacity, a fresh context is created outside the critical
    /// section. At capacity, the caller waits for a release.
    pub fn acquire(self: &Arc<Self>) -> PoolHandle {
        let mut state = self.state.lock();
        loop {
            if let Some(ctx) = state.idle.pop() {
                return PoolHandle::new(Arc::clone(self), ctx);
            }
            if state.current_size < self.max_size {
                state.current_size += 1;
                drop(state);
                return PoolHandle::new(Arc::clone(self), GcmContext::new());
            }
            self.available.wait(&mut state);
        }
    }

    /// Acquires a context, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if no context became available in time. No
    /// context is left outstanding on the error path.
    pub fn acquire_timeout(self: &Arc<Self>, timeout: Duration) -> VaultResult<PoolHandle> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(ctx) = state.idle.pop() {
                return Ok(PoolHandle::new(Arc::clone(self), ctx));
            }
            if state.current_size < self.max_size {
                state.current_size += 1;
                drop(state);
                return Ok(PoolHandle::new(Arc::clone(self), GcmContext::new()));
            }
            if self.available.wait_until(&mut state, deadline).timed_out() {
                return Err(Error::timeout(
                    "no cipher context became available before the deadline",
                ));
            }
        }
    }

    /// Number of idle contexts right now.
    #[must_use]
    pub fn available(&self) -> usize {
        self.state.lock().idle.len()
    }

    /// Number of contexts created so far (outstanding + idle).
    #[must_use]
    pub fn size(&self) -> usize {
        self.state.lock().current_size
    }

    /// Maximum number of contexts this pool will ever hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Returns a context to the pool and wakes one waiter.
    fn release(&self, mut ctx: GcmContext) {
        ctx.reset();
        let mut state = self.state.lock();
        state.idle.push(ctx);
        drop(state);
        self.available.notify_one();
    }
}

impl std::fmt::Debug for GcmContextPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("GcmContextPool")
            .field("max_size", &self.max_size)
            .field("current_size", &state.current_size)
            .field("idle", &state.idle.len())
            .finish()
    }
}

/// RAII token for exclusive use of a pooled [`GcmContext`].
///
/// Dereferences to the context for its whole lifetime. On drop the
/// context is reset and returned to the pool; the handle is move-only and
/// keeps the pool alive through its `Arc`.
pub struct PoolHandle {
    pool: Arc<GcmContextPool>,
    ctx: Option<GcmContext>,
}

impl PoolHandle {
    fn new(pool: Arc<GcmContextPool>, ctx: GcmContext) -> Self {
        Self {
            pool,
            ctx: Some(ctx),
        }
    }
}

impl Deref for PoolHandle {
    type Target = GcmContext;

    fn deref(&self) -> &GcmContext {
        self.ctx.as_ref().expect("handle holds a context until drop")
    }
}

impl DerefMut for PoolHandle {
    fn deref_mut(&mut self) -> &mut GcmContext {
        self.ctx.as_mut().expect("handle holds a context until drop")
    }
}

impl Drop for PoolHandle {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            self.pool.release(ctx);
        }
    }
}

impl std::fmt::Debug for PoolHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::{CipherMode, NONCE_SIZE};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use vaultfs_core::{initialize_secure_heap_default, ErrorKind};

    #[test]
    fn zero_capacity_is_rejected() {
        let err = GcmContextPool::new(0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn acquire_and_release_round_trip() {
        let pool = GcmContextPool::new(3).unwrap();
        assert_eq!(pool.available(), 0);
        assert_eq!(pool.size(), 0);

        let handle = pool.acquire();
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.available(), 0);

        drop(handle);
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn released_contexts_are_reused() {
        let pool = GcmContextPool::new(3).unwrap();

        for _ in 0..10 {
            let _handle = pool.acquire();
        }

        // Sequential acquire/release cycles never grow the pool past one.
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn contexts_come_back_reset() {
        initialize_secure_heap_default().unwrap();
        let pool = GcmContextPool::new(1).unwrap();
        let key = [0x42u8; 32];
        let nonce = [0x07u8; NONCE_SIZE];

        {
            let mut handle = pool.acquire();
            handle.init(&key, &nonce, CipherMode::Encrypt).unwrap();
        }

        {
            // Same (only) context; a fresh init must succeed cleanly.
            let mut handle = pool.acquire();
            handle.init(&key, &nonce, CipherMode::Encrypt).unwrap();
        }
    }

    #[test]
    fn pool_blocks_at_capacity_and_release_wakes_one_waiter() {
        let pool = GcmContextPool::new(3).unwrap();

        let h1 = pool.acquire();
        let _h2 = pool.acquire();
        let _h3 = pool.acquire();
        assert_eq!(pool.size(), 3);

        let (tx, rx) = mpsc::channel();
        let waiter_pool = Arc::clone(&pool);
        let waiter = thread::spawn(move || {
            let handle = waiter_pool.acquire();
            tx.send(()).unwrap();
            drop(handle);
        });

        // The fourth acquire must still be blocked.
        assert!(rx
            .recv_timeout(Duration::from_millis(50))
            .is_err());

        drop(h1);

        // Releasing one context unblocks the waiter within bounded time.
        rx.recv_timeout(Duration::from_secs(5))
            .expect("waiter should acquire after release");
        waiter.join().unwrap();
    }

    #[test]
    fn acquire_timeout_reports_timeout() {
        let pool = GcmContextPool::new(1).unwrap();
        let _held = pool.acquire();

        let err = pool
            .acquire_timeout(Duration::from_millis(20))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);

        // The failed wait must not leak a slot.
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn acquire_timeout_succeeds_when_capacity_remains() {
        let pool = GcmContextPool::new(2).unwrap();
        let _held = pool.acquire();
        let second = pool.acquire_timeout(Duration::from_millis(100)).unwrap();
        drop(second);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn concurrent_hammering_respects_the_cap() {
        let pool = GcmContextPool::new(4).unwrap();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::new();
        for _ in 0..16 {
            let pool = Arc::clone(&pool);
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            workers.push(thread::spawn(move || {
                for _ in 0..50 {
                    let _handle = pool.acquire();
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            }));
        }
        for worker in workers {
            worker.join().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 4);
        assert_eq!(pool.available(), pool.size());
        assert!(pool.size() <= 4);
    }
}
