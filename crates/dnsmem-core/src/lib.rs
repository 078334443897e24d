//! # dnsmem-core
//!
//! Hierarchical, quota-enforced, thread-safe memory contexts and pools
//! for a DNS infrastructure library.
//!
//! This crate is the safe logic layer: every raw pointer it touches was
//! produced, and will be released, by `dnsmem-backend`, the
//! `unsafe_code`-allowed primitives crate one layer below. No `unsafe`
//! code is permitted at the crate level.

#![deny(unsafe_code)]

pub mod config;
pub mod context;
pub mod debug_record;
pub mod destroy;
pub mod error;
pub mod log;
pub mod pool;

pub use config::ContextFlags;
pub use context::{MemBlock, MemoryContext, MAX_NAME_LEN};
pub use destroy::{DestroyTarget, EventId};
pub use error::{MemError, MemResult};
pub use log::{ContextLogLevel, ContextLogRecord};
pub use pool::MemoryPool;
