//! Child-process fixture for exercising `dnsmem-core`'s abort path.
//!
//! Each scenario below deliberately violates a programming-error
//! contract (spec.md §7 tier 2) and is expected to call
//! `std::process::abort()` rather than return. Run directly with
//! `SCENARIO=<name>` set; the integration tests in `tests/` spawn this
//! binary as a subprocess per scenario and assert on its exit status.

use std::sync::Arc;

use dnsmem_core::{ContextFlags, MemoryContext, MemoryPool};

const VAR_NAME: &str = "SCENARIO";

/// A mismatched size passed to `put` is a programming error the debug
/// record table catches directly — no unsafe aliasing required, since
/// `put`'s `size` parameter is independent of the `MemBlock` it
/// consumes.
fn size_mismatch_free() {
    let flags = ContextFlags {
        record: true,
        ..ContextFlags::default()
    };
    let ctx = MemoryContext::create_with_flags(Some("size-mismatch"), flags).unwrap();
    let block = ctx.get(64).unwrap();
    ctx.put(block, 32);
}

fn pool_destroy_with_outstanding() {
    let ctx = MemoryContext::create(Some("pool-leak"), 0, 0).unwrap();
    let pool = MemoryPool::create(&ctx, 32).unwrap();
    pool.set_free_max(4);
    let block = pool.get().unwrap();
    std::mem::forget(block);
    drop(pool);
}

fn context_teardown_with_pool_attached() {
    let ctx = MemoryContext::create(Some("ctx-leak"), 0, 0).unwrap();
    let pool = MemoryPool::create(&ctx, 32).unwrap();
    pool.set_free_max(4);
    std::mem::forget(pool);
    drop(ctx);
}

fn leak_under_destroy_check() {
    let flags = ContextFlags {
        record: true,
        destroy_check: true,
        ..ContextFlags::default()
    };
    let ctx = MemoryContext::create_with_flags(Some("leak-strict"), flags).unwrap();
    let block = ctx.get(16).unwrap();
    std::mem::forget(block);
    drop(ctx);
}

fn cross_thread_pool_without_lock() {
    let ctx = MemoryContext::create(Some("cross-thread"), 0, 0).unwrap();
    let pool = Arc::new(MemoryPool::create(&ctx, 16).unwrap());
    pool.set_free_max(4);
    let first = pool.get().unwrap();
    pool.put(first);

    let pool_clone = Arc::clone(&pool);
    std::thread::spawn(move || {
        let block = pool_clone.get().unwrap();
        pool_clone.put(block);
    })
    .join()
    .ok();
}

fn main() {
    let scenario = std::env::var(VAR_NAME).unwrap_or_default();
    match scenario.as_str() {
        "size_mismatch_free" => size_mismatch_free(),
        "pool_destroy_with_outstanding" => pool_destroy_with_outstanding(),
        "context_teardown_with_pool_attached" => context_teardown_with_pool_attached(),
        "leak_under_destroy_check" => leak_under_destroy_check(),
        "cross_thread_pool_without_lock" => cross_thread_pool_without_lock(),
        other => panic!("unknown fatal-fixture scenario: {other:?}"),
    }
    println!("fatal-fixture: scenario did not abort");
}
