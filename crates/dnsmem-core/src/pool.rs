//! Fixed-size memory pools backed by a parent [`MemoryContext`]
//! (spec.md §4.2): a freelist of same-size blocks, refilled from and
//! drained back to the parent in batches.

use std::sync::Arc;
use std::thread::ThreadId;

use parking_lot::Mutex;

use crate::context::{truncate_name, MemBlock, MemoryContext};
use crate::error::{fatal, MemError, MemResult};

/// Pool names share the context name cap (spec.md §9).
pub use crate::context::MAX_NAME_LEN;

struct PoolState {
    freelist: Vec<MemBlock>,
    free_count: usize,
    free_max: usize,
    allocated: usize,
    max_alloc: usize,
    fill_count: usize,
    name: Option<String>,
}

struct PoolInner {
    element_size: usize,
    parent: MemoryContext,
    state: Mutex<PoolState>,
    /// A lock a caller has associated via [`MemoryPool::associate_lock`].
    /// Once set, this pool's single-thread contract (`owner_thread`) is no
    /// longer enforced — the caller's lock is the synchronization
    /// mechanism instead (spec.md §4.2).
    shared_lock: Mutex<Option<Arc<parking_lot::Mutex<()>>>>,
    /// The thread that first used this pool, when no external lock has
    /// been associated. Rust cannot flip a type's `Send`/`Sync`-ness at
    /// runtime the way the source toggles its locking strategy, so the
    /// single-thread contract is enforced by comparing `ThreadId`s instead
    /// and aborting on a cross-thread call — the same tier-2 "programming
    /// error" treatment spec.md §7 gives other contract violations.
    owner_thread: Mutex<Option<ThreadId>>,
}

/// A fixed-size-block pool drawing its backing storage from a parent
/// [`MemoryContext`] (spec.md §4.2).
///
/// Like [`MemoryContext`], this wraps an `Arc` and represents one logical
/// reference; dropping the last one tears the pool down.
pub struct MemoryPool(Arc<PoolInner>);

impl MemoryPool {
    /// Create a pool of `element_size`-byte blocks under `parent`.
    ///
    /// Defaults match spec.md §4.2 exactly: `max_alloc` unbounded,
    /// `free_max = 1`, `fill_count = 1`. Use [`Self::set_free_max`],
    /// [`Self::set_max_alloc`], and [`Self::set_fill_count`] to change
    /// them before the first `get`.
    pub fn create(parent: &MemoryContext, element_size: usize) -> MemResult<Self> {
        let parent = parent.attach()?;
        parent.register_pool();
        Ok(MemoryPool(Arc::new(PoolInner {
            element_size,
            parent,
            state: Mutex::new(PoolState {
                freelist: Vec::new(),
                free_count: 0,
                free_max: 1,
                allocated: 0,
                max_alloc: 0,
                fill_count: 1,
                name: None,
            }),
            shared_lock: Mutex::new(None),
            owner_thread: Mutex::new(None),
        })))
    }

    /// Associate an external lock with this pool, disabling the
    /// single-thread-only contract: callers take `lock` themselves around
    /// every `get`/`put` from then on (spec.md §4.2).
    pub fn associate_lock(&self, lock: Arc<parking_lot::Mutex<()>>) {
        *self.0.shared_lock.lock() = Some(lock);
        *self.0.owner_thread.lock() = None;
    }

    fn enforce_single_thread_contract(&self) {
        if self.0.shared_lock.lock().is_some() {
            return;
        }
        let current = std::thread::current().id();
        let mut owner = self.0.owner_thread.lock();
        match *owner {
            None => *owner = Some(current),
            Some(id) if id == current => {}
            Some(_) => {
                drop(owner);
                fatal(
                    "pool",
                    "accessed from a second thread without an associated lock",
                );
            }
        }
    }

    /// Borrow the externally associated lock, if any, for the duration of
    /// `f`.
    fn with_external_lock<R>(&self, f: impl FnOnce() -> R) -> R {
        let guard = self.0.shared_lock.lock();
        match guard.as_ref() {
            Some(lock) => {
                let _held = lock.lock();
                f()
            }
            None => {
                drop(guard);
                f()
            }
        }
    }

    /// Name this pool for diagnostics (truncated to [`MAX_NAME_LEN`]).
    pub fn set_name(&self, name: &str) {
        self.0.state.lock().name = Some(truncate_name(name));
    }

    pub fn name(&self) -> Option<String> {
        self.0.state.lock().name.clone()
    }

    pub fn element_size(&self) -> usize {
        self.0.element_size
    }

    /// How many spare blocks to keep on the freelist before returning the
    /// rest to the parent on `put`.
    pub fn set_free_max(&self, free_max: usize) {
        self.0.state.lock().free_max = free_max;
    }

    pub fn free_max(&self) -> usize {
        self.0.state.lock().free_max
    }

    /// Cap on outstanding (allocated, not-yet-returned) blocks. `0` means
    /// unbounded.
    pub fn set_max_alloc(&self, max_alloc: usize) {
        self.0.state.lock().max_alloc = max_alloc;
    }

    pub fn max_alloc(&self) -> usize {
        self.0.state.lock().max_alloc
    }

    /// How many blocks to request from the parent context per refill
    /// batch.
    pub fn set_fill_count(&self, fill_count: usize) {
        self.0.state.lock().fill_count = fill_count.max(1);
    }

    pub fn fill_count(&self) -> usize {
        self.0.state.lock().fill_count
    }

    pub fn allocated(&self) -> usize {
        self.0.state.lock().allocated
    }

    pub fn free_count(&self) -> usize {
        self.0.state.lock().free_count
    }

    /// Take one block from the freelist, refilling from the parent
    /// context in a batch first if the freelist is empty.
    pub fn get(&self) -> MemResult<MemBlock> {
        self.enforce_single_thread_contract();
        self.with_external_lock(|| self.get_locked())
    }

    fn get_locked(&self) -> MemResult<MemBlock> {
        let element_size = self.0.element_size;
        let mut state = self.0.state.lock();

        if state.max_alloc != 0 && state.allocated >= state.max_alloc {
            return Err(MemError::Quota);
        }

        if state.freelist.is_empty() {
            let batch = state.fill_count;
            let free_max = state.free_max;
            drop(state);
            // Released before calling into the parent: a parent's `get`
            // may itself trigger quota bookkeeping or (in principle) a
            // caller-supplied allocator callback that reenters this pool,
            // so the pool lock must never be held across the call.
            let mut fresh = Vec::with_capacity(batch);
            for _ in 0..batch {
                match self.0.parent.get(element_size) {
                    Ok(block) => fresh.push(block),
                    Err(err) if fresh.is_empty() => return Err(err),
                    Err(_) => break,
                }
            }

            // The first block becomes this call's result; of the rest,
            // only up to `free_max` are kept on the freelist — any extra
            // is freed back to the parent immediately rather than ever
            // touching the freelist (spec.md §4.2 step 3).
            let result = fresh.remove(0);
            let keep = free_max.min(fresh.len());
            let excess = fresh.split_off(keep);

            state = self.0.state.lock();
            state.freelist.extend(fresh);
            state.free_count = state.freelist.len();
            state.allocated += 1;
            drop(state);

            for block in excess {
                self.0.parent.put(block, element_size);
            }
            return Ok(result);
        }

        let block = state
            .freelist
            .pop()
            .expect("freelist was just confirmed non-empty");
        state.free_count = state.freelist.len();
        state.allocated += 1;
        Ok(block)
    }

    /// Return a block to the freelist, releasing the oldest spares back
    /// to the parent context once `free_max` is exceeded.
    pub fn put(&self, block: MemBlock) {
        self.enforce_single_thread_contract();
        self.with_external_lock(|| self.put_locked(block));
    }

    fn put_locked(&self, block: MemBlock) {
        let element_size = self.0.element_size;
        let mut state = self.0.state.lock();
        state.allocated = state.allocated.saturating_sub(1);
        state.freelist.push(block);
        state.free_count = state.freelist.len();

        // `free_max == 0` is a literal zero-retention cap, not "unbounded"
        // — spec.md §8's invariant is `freelist length == min(free_max,
        // peak_allocated)` for every `free_max` including zero.
        let mut spill = Vec::new();
        while state.freelist.len() > state.free_max {
            spill.push(state.freelist.remove(0));
        }
        state.free_count = state.freelist.len();
        drop(state);

        for block in spill {
            self.0.parent.put(block, element_size);
        }
    }

    /// Tear this pool down explicitly. Named for parity with spec.md's
    /// `pool_destroy`; the actual work — draining the freelist back to the
    /// parent and deregistering — happens in `Drop`, same as
    /// [`MemoryContext::detach`].
    pub fn pool_destroy(self) {}
}

impl Drop for MemoryPool {
    fn drop(&mut self) {
        if Arc::strong_count(&self.0) > 1 {
            return;
        }

        let mut state = self.0.state.lock();
        if state.allocated != 0 {
            let outstanding = state.allocated;
            drop(state);
            fatal(
                "pool teardown",
                &format!("{outstanding} block(s) still outstanding"),
            );
        }

        let element_size = self.0.element_size;
        let freelist = std::mem::take(&mut state.freelist);
        drop(state);

        for block in freelist {
            self.0.parent.put(block, element_size);
        }
        self.0.parent.deregister_pool();
    }
}
