//! Process-wide default context flags, set once at startup.
//!
//! The source's global debug flag word is replaced here with, per
//! spec.md §9's "global debug flag -> per-process configuration object"
//! design note, a process-wide configuration value consulted by
//! `MemoryContext::create` to seed per-context flags. Backed by a
//! `OnceLock`, the same primitive `glibc_rust::safety::registry` uses for
//! its lazily built registry.

use std::sync::OnceLock;

/// Runtime-toggleable behavior flags carried by a
/// [`crate::context::MemoryContext`] (spec.md §3's context flags, §6's
/// flag table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextFlags {
    /// Scribble every freshly returned region with a fixed byte.
    pub fill_on_alloc: bool,
    /// Scribble every region about to be released with a different fixed
    /// byte.
    pub fill_on_free: bool,
    /// Append and verify a guard pattern past each allocation's
    /// requested size.
    pub check_overrun: bool,
    /// Append a record to the context's trace log on every allocation
    /// and free.
    pub trace: bool,
    /// Maintain the debug-record table, enabling leak and double-free
    /// detection.
    pub record: bool,
    /// Assert zero outstanding debug-record entries at teardown instead
    /// of merely reporting them.
    pub destroy_check: bool,
}

impl Default for ContextFlags {
    fn default() -> Self {
        Self {
            fill_on_alloc: false,
            fill_on_free: false,
            check_overrun: false,
            trace: false,
            record: false,
            destroy_check: false,
        }
    }
}

static DEFAULT_FLAGS: OnceLock<ContextFlags> = OnceLock::new();

/// Set the process-wide default flags that every subsequently created
/// context (via [`crate::context::MemoryContext::create`]) seeds from.
///
/// Callable at most once, before the first `create`, matching spec.md
/// §9's "process-wide configuration value initialized once at startup."
/// A second call is a no-op; the returned value is whichever flags
/// actually won the race to initialize.
pub fn set_default_flags(flags: ContextFlags) -> ContextFlags {
    *DEFAULT_FLAGS.get_or_init(|| flags)
}

/// The process-wide default flags, falling back to
/// [`ContextFlags::default`] if [`set_default_flags`] was never called.
#[must_use]
pub fn default_flags() -> ContextFlags {
    *DEFAULT_FLAGS.get_or_init(ContextFlags::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_all_off() {
        let flags = ContextFlags::default();
        assert!(!flags.fill_on_alloc);
        assert!(!flags.fill_on_free);
        assert!(!flags.check_overrun);
        assert!(!flags.trace);
        assert!(!flags.record);
        assert!(!flags.destroy_check);
    }
}
