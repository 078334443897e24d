//! The memory context (MCTX): a named, reference-counted arena wrapping
//! a backend, enforcing a byte quota, and recording every live
//! allocation for leak and double-free detection (spec.md §4.1).

use std::ffi::c_void;
use std::panic::Location;
use std::sync::Arc;

use parking_lot::Mutex;

use dnsmem_backend::{AllocFn, AllocOptions, Backend, FreeFn, RawBlock};

use crate::config::{self, ContextFlags};
use crate::debug_record::DebugRecordTable;
use crate::destroy::{self, DestroyQueue, DestroyTarget, EventId};
use crate::error::{fatal, MemError, MemResult};
use crate::log::{ContextLogLevel, TraceLog};

/// Context names are capped at this many characters for diagnostic-format
/// stability (spec.md §9).
pub const MAX_NAME_LEN: usize = 15;

/// Truncate `name` to at most [`MAX_NAME_LEN`] `char`s.
///
/// spec.md §3 caps names at "≤15 chars", not bytes — `String::truncate`
/// operates on byte offsets and panics if that offset isn't a char
/// boundary, which a multi-byte UTF-8 name can easily land on. Counting
/// `char`s instead sidesteps that entirely.
pub(crate) fn truncate_name(name: &str) -> String {
    name.chars().take(MAX_NAME_LEN).collect()
}

/// An allocation handle returned by [`MemoryContext::get`],
/// [`MemoryContext::allocate`], or [`MemoryContext::strdup`].
///
/// Deliberately not `Clone`/`Copy`: passing a `MemBlock` into `put`/`free`
/// consumes it, so ordinary Rust move semantics give the "clear the
/// caller's pointer after free" convention spec.md §9 asks for — a
/// caller simply cannot hold on to a block past the call that releases
/// it.
#[derive(Debug)]
pub struct MemBlock {
    pub(crate) ptr: *mut u8,
}

impl MemBlock {
    /// Raw pointer to the user-visible region. Valid for reads/writes of
    /// the requested size until the matching `put`/`free` call; what the
    /// caller does with it from there is outside this crate's contract
    /// (the same boundary `std::alloc::GlobalAlloc` draws).
    #[must_use]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }
}

struct ContextState {
    in_use: usize,
    max_in_use: usize,
    quota: usize,
    terminal: bool,
    pool_count: usize,
    debug_records: DebugRecordTable,
    destroy_queue: DestroyQueue,
    trace_log: TraceLog,
}

struct ContextInner {
    name: Option<String>,
    backend: Backend,
    /// Kept in its own lock, separate from `state`, so reading the flags
    /// snapshot at the top of `get`/`put`/`allocate`/`free` never
    /// contends with debug-record/quota bookkeeping — and so a context
    /// can override them post hoc (SPEC_FULL.md §6) without taking the
    /// same lock every other operation does.
    flags: Mutex<ContextFlags>,
    state: Mutex<ContextState>,
}

/// A named, reference-counted memory arena: the allocation surface
/// `dnsmem-core` exposes to callers.
///
/// Every `MemoryContext` value is one logical reference (spec.md's
/// `attach`/`detach`); cloning is only possible through [`Self::attach`],
/// and dropping a value is the Rust-idiomatic `detach` — see this type's
/// `Drop` impl.
pub struct MemoryContext(Arc<ContextInner>);

impl MemoryContext {
    /// Create a context over the host's system allocator, seeded from
    /// the process-wide default flags (`dnsmem_core::config`).
    ///
    /// `init_chunk_size`/`target_size` are advisory hints accepted for
    /// API stability per spec.md §4.1; this implementation does not act
    /// on them.
    pub fn create(name: Option<&str>, init_chunk_size: usize, target_size: usize) -> MemResult<Self> {
        let _ = (init_chunk_size, target_size);
        Self::new(name, Backend::system(), config::default_flags())
    }

    /// Create a context with explicit flags instead of the process-wide
    /// defaults.
    pub fn create_with_flags(name: Option<&str>, flags: ContextFlags) -> MemResult<Self> {
        Self::new(name, Backend::system(), flags)
    }

    /// Create a context over a caller-supplied `(alloc, free)` pair
    /// instead of the system allocator.
    pub fn create_extended(
        name: Option<&str>,
        init_chunk_size: usize,
        target_size: usize,
        alloc_fn: AllocFn,
        free_fn: FreeFn,
        arg: *mut c_void,
    ) -> MemResult<Self> {
        let _ = (init_chunk_size, target_size);
        Self::new(name, Backend::custom(alloc_fn, free_fn, arg), config::default_flags())
    }

    fn new(name: Option<&str>, backend: Backend, flags: ContextFlags) -> MemResult<Self> {
        let name = name.map(truncate_name);
        Ok(MemoryContext(Arc::new(ContextInner {
            name,
            backend,
            flags: Mutex::new(flags),
            state: Mutex::new(ContextState {
                in_use: 0,
                max_in_use: 0,
                quota: 0,
                terminal: false,
                pool_count: 0,
                debug_records: DebugRecordTable::new(),
                destroy_queue: DestroyQueue::new(),
                trace_log: TraceLog::new(),
            }),
        })))
    }

    /// Copy this handle and increment the context's logical refcount.
    /// Fails with [`MemError::ShuttingDown`] once [`Self::destroy`] has
    /// been called — no new attach succeeds on a terminal context.
    pub fn attach(&self) -> MemResult<Self> {
        let state = self.0.state.lock();
        if state.terminal {
            return Err(MemError::ShuttingDown);
        }
        Ok(MemoryContext(Arc::clone(&self.0)))
    }

    /// Release this handle. Named for parity with spec.md's `detach`;
    /// the actual decrement-and-maybe-teardown logic lives in `Drop`, so
    /// this is equivalent to (and no different from) simply letting the
    /// value go out of scope.
    pub fn detach(self) {}

    /// Set the terminal flag: blocks new attaches, `get`/`allocate`,
    /// pool creation, and `on_destroy`. Does not force immediate
    /// teardown — that still only happens when the last handle (this one
    /// or a sibling created via `attach`) is dropped.
    pub fn destroy(&self) {
        self.0.state.lock().terminal = true;
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn set_quota(&self, quota: usize) {
        self.0.state.lock().quota = quota;
    }

    pub fn get_quota(&self) -> usize {
        self.0.state.lock().quota
    }

    pub fn in_use(&self) -> usize {
        self.0.state.lock().in_use
    }

    pub fn max_in_use(&self) -> usize {
        self.0.state.lock().max_in_use
    }

    /// The flags this context currently runs with.
    pub fn flags(&self) -> ContextFlags {
        *self.0.flags.lock()
    }

    /// Override every flag at once. SPEC_FULL.md §6's "individual
    /// contexts may override [the process-wide default flags] post hoc"
    /// — this is that override, applied live: it takes effect on the
    /// very next `get`/`put`/`allocate`/`free` call.
    pub fn set_flags(&self, flags: ContextFlags) {
        *self.0.flags.lock() = flags;
    }

    pub fn set_fill_on_alloc(&self, fill_on_alloc: bool) {
        self.0.flags.lock().fill_on_alloc = fill_on_alloc;
    }

    pub fn set_fill_on_free(&self, fill_on_free: bool) {
        self.0.flags.lock().fill_on_free = fill_on_free;
    }

    pub fn set_check_overrun(&self, check_overrun: bool) {
        self.0.flags.lock().check_overrun = check_overrun;
    }

    pub fn set_trace(&self, trace: bool) {
        self.0.flags.lock().trace = trace;
    }

    pub fn set_record(&self, record: bool) {
        self.0.flags.lock().record = record;
    }

    pub fn set_destroy_check(&self, destroy_check: bool) {
        self.0.flags.lock().destroy_check = destroy_check;
    }

    /// Sized allocation: the caller remembers `size` and passes it back
    /// to [`Self::put`].
    #[track_caller]
    pub fn get(&self, size: usize) -> MemResult<MemBlock> {
        self.alloc_inner(size, false, Location::caller())
    }

    /// Release a block obtained from [`Self::get`] with the same `size`
    /// it was allocated with.
    pub fn put(&self, block: MemBlock, size: usize) {
        let flags = *self.0.flags.lock();
        if !dnsmem_backend::verify_guard(block.ptr, size, flags.check_overrun) {
            fatal("put", "overrun guard corrupted past the requested size");
        }

        let mut state = self.0.state.lock();
        if flags.record {
            match state.debug_records.remove(block.ptr as usize) {
                Some(rec) if rec.size == size => {}
                Some(rec) => {
                    drop(state);
                    fatal(
                        "put",
                        &format!(
                            "debug record size mismatch: recorded {}, freed as {size}",
                            rec.size
                        ),
                    );
                }
                None => {
                    drop(state);
                    fatal("put", "no debug record for pointer — double free or foreign pointer");
                }
            }
        }
        if flags.fill_on_free {
            dnsmem_backend::scribble(block.ptr, size, dnsmem_backend::FILL_FREE_BYTE);
        }
        state.in_use = state.in_use.saturating_sub(size);
        if flags.trace {
            state.trace_log.push(
                ContextLogLevel::Trace,
                "put",
                Some(block.ptr as usize),
                Some(size),
                "success",
                state.in_use,
            );
        }
        drop(state);

        let effective = dnsmem_backend::effective_size(size, false, flags.check_overrun);
        dnsmem_backend::release(
            &self.0.backend,
            RawBlock {
                ptr: block.ptr,
                effective_size: effective,
            },
        );
    }

    /// Unsized allocation: the size is stored in a hidden header so
    /// [`Self::free`] can recover it without the caller remembering it.
    #[track_caller]
    pub fn allocate(&self, size: usize) -> MemResult<MemBlock> {
        self.alloc_inner(size, true, Location::caller())
    }

    /// Release a block obtained from [`Self::allocate`] or
    /// [`Self::strdup`].
    pub fn free(&self, block: MemBlock) {
        let flags = *self.0.flags.lock();
        let (size, raw_block) = dnsmem_backend::header_lookup(block.ptr, flags.check_overrun);
        if !dnsmem_backend::verify_guard(block.ptr, size, flags.check_overrun) {
            fatal("free", "overrun guard corrupted past the requested size");
        }

        let mut state = self.0.state.lock();
        if flags.record {
            match state.debug_records.remove(block.ptr as usize) {
                Some(rec) if rec.size == size => {}
                Some(rec) => {
                    drop(state);
                    fatal(
                        "free",
                        &format!(
                            "debug record size mismatch: recorded {}, header says {size}",
                            rec.size
                        ),
                    );
                }
                None => {
                    drop(state);
                    fatal("free", "no debug record for pointer — double free or foreign pointer");
                }
            }
        }
        if flags.fill_on_free {
            dnsmem_backend::scribble(block.ptr, size, dnsmem_backend::FILL_FREE_BYTE);
        }
        state.in_use = state.in_use.saturating_sub(size);
        if flags.trace {
            state.trace_log.push(
                ContextLogLevel::Trace,
                "free",
                Some(block.ptr as usize),
                Some(size),
                "success",
                state.in_use,
            );
        }
        drop(state);

        dnsmem_backend::release(&self.0.backend, raw_block);
    }

    /// `allocate(len(s) + 1)` followed by a copy of `s`'s bytes and a NUL
    /// terminator.
    #[track_caller]
    pub fn strdup(&self, s: &str) -> MemResult<MemBlock> {
        let location = Location::caller();
        let bytes = s.as_bytes();
        let block = self.alloc_inner(bytes.len() + 1, true, location)?;
        dnsmem_backend::copy_into(block.ptr, bytes);
        dnsmem_backend::write_byte_at(block.ptr, bytes.len(), 0);
        Ok(block)
    }

    fn alloc_inner(&self, size: usize, with_header: bool, location: &'static Location<'static>) -> MemResult<MemBlock> {
        let flags = *self.0.flags.lock();
        let opts = AllocOptions {
            check_overrun: flags.check_overrun,
            fill_on_alloc: flags.fill_on_alloc,
            with_header,
        };
        let guard_len = if flags.check_overrun { dnsmem_backend::GUARD_WIDTH } else { 0 };

        {
            let mut state = self.0.state.lock();
            if state.terminal {
                return Err(MemError::ShuttingDown);
            }
            let effective_for_quota = size.saturating_add(guard_len);
            if state.quota != 0 && state.in_use.saturating_add(effective_for_quota) > state.quota {
                if flags.trace {
                    state.trace_log.push(
                        ContextLogLevel::Warn,
                        if with_header { "allocate" } else { "get" },
                        None,
                        Some(size),
                        "quota",
                        state.in_use,
                    );
                }
                return Err(MemError::Quota);
            }
        }

        let Some(tracked) = dnsmem_backend::tracked_alloc(&self.0.backend, size, opts) else {
            if flags.trace {
                let mut state = self.0.state.lock();
                let in_use = state.in_use;
                state.trace_log.push(
                    ContextLogLevel::Warn,
                    if with_header { "allocate" } else { "get" },
                    None,
                    Some(size),
                    "oom",
                    in_use,
                );
            }
            return Err(MemError::OutOfMemory);
        };

        let mut state = self.0.state.lock();
        if flags.record {
            state.debug_records.insert(tracked.user_ptr as usize, size, location);
        }
        state.in_use += size;
        if state.in_use > state.max_in_use {
            state.max_in_use = state.in_use;
        }
        if flags.trace {
            state.trace_log.push(
                ContextLogLevel::Trace,
                if with_header { "allocate" } else { "get" },
                Some(tracked.user_ptr as usize),
                Some(size),
                "success",
                state.in_use,
            );
        }
        Ok(MemBlock { ptr: tracked.user_ptr })
    }

    /// Transfer ownership of `(task, event)` into the destroy queue.
    /// Fails with [`MemError::ShuttingDown`] — without consuming
    /// `event` — once [`Self::destroy`] has been called.
    pub fn on_destroy(&self, task: Arc<dyn DestroyTarget>, event: EventId) -> MemResult<()> {
        let mut state = self.0.state.lock();
        if state.terminal {
            return Err(MemError::ShuttingDown);
        }
        state.destroy_queue.push(task, event);
        Ok(())
    }

    /// Remove and return every trace-log record buffered since the last
    /// drain.
    pub fn drain_trace_log(&self) -> Vec<crate::log::ContextLogRecord> {
        self.0.state.lock().trace_log.drain()
    }

    /// Emit the human-readable diagnostic block spec.md §6 describes:
    /// name, counters, quota, and — when record mode is on — one line
    /// per live allocation.
    pub fn stats<W: std::fmt::Write>(&self, w: &mut W) -> std::fmt::Result {
        let state = self.0.state.lock();
        writeln!(
            w,
            "context name={} in_use={} max_in_use={} quota={}",
            self.0.name.as_deref().unwrap_or("<unnamed>"),
            state.in_use,
            state.max_in_use,
            state.quota,
        )?;
        if self.0.flags.lock().record {
            for (ptr, rec) in state.debug_records.iter() {
                writeln!(w, "{ptr:#x} size={} {}:{}", rec.size, rec.file, rec.line)?;
            }
        }
        Ok(())
    }

    pub(crate) fn register_pool(&self) {
        self.0.state.lock().pool_count += 1;
    }

    pub(crate) fn deregister_pool(&self) {
        self.0.state.lock().pool_count -= 1;
    }
}

impl Drop for MemoryContext {
    fn drop(&mut self) {
        // `Arc::strong_count` still counts this very instance, so `== 1`
        // here means it is the last handle; every other `MemoryContext`
        // clone created via `attach` (directly, or indirectly through a
        // pool's parent handle) has already been dropped.
        if Arc::strong_count(&self.0) > 1 {
            return;
        }

        let mut state = self.0.state.lock();

        if state.pool_count != 0 {
            drop(state);
            fatal(
                "context teardown",
                "pools still attached when the last reference was released",
            );
        }

        if !state.debug_records.is_empty() {
            if self.0.flags.lock().destroy_check {
                let leaked = state.debug_records.len();
                drop(state);
                fatal("context teardown", &format!("{leaked} live allocation(s) outstanding"));
            }
            eprintln!(
                "dnsmem: leak report for context {:?}: {} outstanding allocation(s)",
                self.0.name.as_deref().unwrap_or("<unnamed>"),
                state.debug_records.len(),
            );
            for (ptr, rec) in state.debug_records.iter() {
                eprintln!("  {ptr:#x} size={} {}:{}", rec.size, rec.file, rec.line);
            }
        }

        let entries = state.destroy_queue.drain();
        drop(state);
        destroy::dispatch(entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_lifecycle_returns_in_use_to_zero() {
        let ctx = MemoryContext::create(Some("test"), 0, 0).unwrap();
        let block = ctx.get(100).unwrap();
        assert_eq!(ctx.in_use(), 100);
        ctx.put(block, 100);
        assert_eq!(ctx.in_use(), 0);
    }

    #[test]
    fn quota_trip_then_drain_then_succeed() {
        let ctx = MemoryContext::create(None, 0, 0).unwrap();
        ctx.set_quota(1000);

        let first = ctx.get(600).unwrap();
        assert_eq!(ctx.in_use(), 600);

        assert_eq!(ctx.get(600).unwrap_err(), MemError::Quota);
        assert_eq!(ctx.in_use(), 600);

        ctx.put(first, 600);
        assert_eq!(ctx.in_use(), 0);

        let second = ctx.get(600).unwrap();
        ctx.put(second, 600);
    }

    #[test]
    fn reducing_quota_below_in_use_blocks_until_drain() {
        let ctx = MemoryContext::create(None, 0, 0).unwrap();
        let block = ctx.get(500).unwrap();
        ctx.set_quota(400);
        assert_eq!(ctx.get(1).unwrap_err(), MemError::Quota);
        ctx.put(block, 500);
        let again = ctx.get(400).unwrap();
        ctx.put(again, 400);
    }

    #[test]
    fn terminal_context_refuses_new_allocations() {
        let ctx = MemoryContext::create(None, 0, 0).unwrap();
        ctx.destroy();
        assert_eq!(ctx.get(16).unwrap_err(), MemError::ShuttingDown);
        assert_eq!(ctx.allocate(16).unwrap_err(), MemError::ShuttingDown);
    }

    #[test]
    fn terminal_context_refuses_new_attaches_and_on_destroy() {
        let ctx = MemoryContext::create(None, 0, 0).unwrap();
        ctx.destroy();
        assert_eq!(ctx.attach().unwrap_err(), MemError::ShuttingDown);

        struct Noop;
        impl DestroyTarget for Noop {
            fn notify(&self, _event: EventId) {}
        }
        assert_eq!(ctx.on_destroy(Arc::new(Noop), 1).unwrap_err(), MemError::ShuttingDown);
    }

    #[test]
    fn attach_then_detach_leaves_counters_unchanged() {
        let ctx = MemoryContext::create(None, 0, 0).unwrap();
        let block = ctx.get(64).unwrap();
        let before = ctx.in_use();

        let handle = ctx.attach().unwrap();
        handle.detach();

        assert_eq!(ctx.in_use(), before);
        ctx.put(block, 64);
    }

    #[test]
    fn strdup_round_trips_bytes_and_frees_len_plus_one() {
        let ctx = MemoryContext::create(None, 0, 0).unwrap();
        let block = ctx.strdup("hello").unwrap();
        for (i, expected) in b"hello\0".iter().enumerate() {
            assert_eq!(dnsmem_backend::read_byte_at(block.as_ptr(), i), *expected);
        }
        assert_eq!(ctx.in_use(), 6);
        ctx.free(block);
        assert_eq!(ctx.in_use(), 0);
    }

    #[test]
    fn multi_byte_name_truncates_on_a_char_boundary_instead_of_panicking() {
        // 20 copies of a 3-byte character: byte offset 15 (the old
        // `String::truncate(MAX_NAME_LEN)` cutoff) lands mid-character.
        let name: String = std::iter::repeat('★').take(20).collect();
        let ctx = MemoryContext::create(Some(&name), 0, 0).unwrap();
        assert_eq!(ctx.name().unwrap().chars().count(), MAX_NAME_LEN);
    }

    #[test]
    fn flags_can_be_overridden_after_creation() {
        let ctx = MemoryContext::create(None, 0, 0).unwrap();
        assert!(!ctx.flags().record);

        ctx.set_record(true);
        assert!(ctx.flags().record);

        let leaked = ctx.get(8).unwrap();
        std::mem::forget(leaked);
        drop(ctx); // record mode was live at alloc time, so the leak is tracked.
    }

    #[test]
    fn set_flags_replaces_the_whole_set_at_once() {
        let ctx = MemoryContext::create(None, 0, 0).unwrap();
        let flags = ContextFlags {
            fill_on_alloc: true,
            trace: true,
            ..ContextFlags::default()
        };
        ctx.set_flags(flags);
        assert_eq!(ctx.flags(), flags);

        let block = ctx.get(8).unwrap();
        for i in 0..8 {
            assert_eq!(
                dnsmem_backend::read_byte_at(block.as_ptr(), i),
                dnsmem_backend::FILL_ON_ALLOC_BYTE
            );
        }
        ctx.put(block, 8);
        assert!(!ctx.drain_trace_log().is_empty());
    }

    #[test]
    fn get_zero_succeeds_with_distinguishable_sentinel() {
        let ctx = MemoryContext::create(None, 0, 0).unwrap();
        let block = ctx.get(0).unwrap();
        assert!(!block.as_ptr().is_null());
        ctx.put(block, 0);
    }

    #[test]
    fn leak_is_reported_without_aborting_when_destroy_check_is_off() {
        let flags = ContextFlags {
            record: true,
            ..ContextFlags::default()
        };
        let ctx = MemoryContext::create_with_flags(None, flags).unwrap();
        let leaked = ctx.get(42).unwrap();
        std::mem::forget(leaked);
        drop(ctx); // leak report goes to stderr; process does not abort
    }

    #[test]
    fn overrun_within_bounds_round_trips() {
        let flags = ContextFlags {
            check_overrun: true,
            ..ContextFlags::default()
        };
        let ctx = MemoryContext::create_with_flags(None, flags).unwrap();
        let block = ctx.get(24).unwrap();
        ctx.put(block, 24);
    }

    #[test]
    fn fill_on_alloc_scribbles_before_the_caller_writes() {
        let flags = ContextFlags {
            fill_on_alloc: true,
            ..ContextFlags::default()
        };
        let ctx = MemoryContext::create_with_flags(None, flags).unwrap();
        let block = ctx.get(8).unwrap();
        for i in 0..8 {
            assert_eq!(
                dnsmem_backend::read_byte_at(block.as_ptr(), i),
                dnsmem_backend::FILL_ON_ALLOC_BYTE
            );
        }
        ctx.put(block, 8);
    }

    #[test]
    fn destroy_notification_dispatches_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        struct OrderTracker {
            id: u32,
            order: Arc<Mutex<Vec<u32>>>,
        }
        impl DestroyTarget for OrderTracker {
            fn notify(&self, event: EventId) {
                self.order.lock().push((self.id, event).0);
            }
        }

        let ctx = MemoryContext::create(None, 0, 0).unwrap();
        ctx.on_destroy(
            Arc::new(OrderTracker {
                id: 1,
                order: order.clone(),
            }),
            1,
        )
        .unwrap();
        ctx.on_destroy(
            Arc::new(OrderTracker {
                id: 2,
                order: order.clone(),
            }),
            2,
        )
        .unwrap();

        drop(ctx);
        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[test]
    fn attach_allows_pool_style_shared_ownership_and_defers_teardown() {
        let ctx = MemoryContext::create(None, 0, 0).unwrap();
        ctx.register_pool();
        let block = ctx.get(16).unwrap();

        let handle = ctx.attach().unwrap();
        drop(ctx); // only one of two handles dropped; strong_count still > 1

        handle.put(block, 16);
        handle.deregister_pool();
        // `handle` drops at end of scope, triggering teardown for real.
    }

    #[test]
    fn accounting_invariant_holds_under_deterministic_trace() {
        fn lcg(state: &mut u64) -> u64 {
            *state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            *state
        }

        let ctx = MemoryContext::create(None, 0, 0).unwrap();
        let mut live: Vec<(MemBlock, usize)> = Vec::new();
        let mut rng = 0xA5A5_5A5A_DEAD_BEEFu64;
        let mut expected_in_use = 0usize;

        for _ in 0..500 {
            let r = lcg(&mut rng);
            if r % 2 == 0 || live.is_empty() {
                let size = ((r >> 8) as usize % 4096) + 1;
                if let Ok(block) = ctx.get(size) {
                    live.push((block, size));
                    expected_in_use += size;
                }
            } else {
                let idx = (r as usize) % live.len();
                let (block, size) = live.swap_remove(idx);
                ctx.put(block, size);
                expected_in_use -= size;
            }
            assert_eq!(ctx.in_use(), expected_in_use);
        }

        for (block, size) in live {
            ctx.put(block, size);
            expected_in_use -= size;
        }
        assert_eq!(ctx.in_use(), 0);
        assert_eq!(expected_in_use, 0);
    }
}
