//! Error kinds surfaced to callers (spec.md §7 tier 1), and the abort
//! path for programming errors and corruption (tiers 2 and 3).

use thiserror::Error;

/// Expected failures, returned to the immediate caller. No internal
/// retries and no silent substitution: a context either completes an
/// operation or reports exactly one of these.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MemError {
    #[error("backend allocation failed")]
    OutOfMemory,
    #[error("allocation would exceed the context quota")]
    Quota,
    #[error("context is shutting down")]
    ShuttingDown,
}

pub type MemResult<T> = Result<T, MemError>;

/// Report a tier-2/3 failure (precondition violation or corruption) to
/// the diagnostic channel and abort the process.
///
/// These never propagate as `Result`s: per spec.md §7, a double-free, a
/// corrupted guard, or a pool destroyed with outstanding allocations
/// means memory safety is already in question, and the library trades
/// liveness for not running further code on top of that corruption.
pub(crate) fn fatal(where_: &str, detail: &str) -> ! {
    eprintln!("dnsmem: fatal: {where_}: {detail}");
    std::process::abort();
}
