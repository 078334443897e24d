//! Hidden size-prefix header for unsized allocation.
//!
//! `allocate(size)` stores `size` just before the pointer it hands back,
//! so `free(ptr)` can recover it without the caller remembering it. This
//! is the allocator's own bookkeeping, separate from the debug-record
//! table (which tracks size for leak/double-free diagnostics only when
//! record mode is on).

/// Bytes reserved for the hidden header.
pub const HEADER_SIZE: usize = std::mem::size_of::<usize>();

/// Write `size` into the header at `raw_base`.
///
/// # Safety
/// `raw_base` must be valid for writes of `HEADER_SIZE` bytes.
pub unsafe fn write_header(raw_base: *mut u8, size: usize) {
    // SAFETY: forwarded from the caller's obligation above; the write is
    // unaligned-safe regardless of `raw_base`'s alignment.
    unsafe {
        std::ptr::write_unaligned(raw_base.cast::<usize>(), size);
    }
}

/// Read the size previously written by [`write_header`] at `raw_base`.
///
/// # Safety
/// `raw_base` must point at a header previously written by
/// [`write_header`] and not yet released.
pub unsafe fn read_header(raw_base: *mut u8) -> usize {
    // SAFETY: forwarded from the caller's obligation above.
    unsafe { std::ptr::read_unaligned(raw_base.cast::<usize>()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let mut buf = [0u8; HEADER_SIZE + 16];
        unsafe {
            write_header(buf.as_mut_ptr(), 12345);
            assert_eq!(read_header(buf.as_mut_ptr()), 12345);
        }
    }
}
