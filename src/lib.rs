//! Arena-backed allocation strategies.
//!
//! This crate provides interchangeable low-level allocation strategies over
//! a single pre-reserved block of memory, for performance-sensitive code
//! that wants to avoid per-allocation system calls and control
//! fragmentation explicitly:
//!
//! - [`LinearAllocator`] - bump pointer, no individual free
//! - [`StackAllocator`] - LIFO allocation and release
//! - [`PoolAllocator`] - uniform fixed-size chunks
//! - [`FreeListAllocator`] - variable sizes with splitting, coalescing and
//!   first-fit/best-fit placement
//!
//! Every strategy implements the same contract and tracks its used bytes
//! and peak watermark. All strategies are single-threaded by design: an
//! instance owns its arena exclusively and must be externally serialized.
//!
//! # Example
//!
//! ```
//! use memarena::allocator::{Allocator, FreeListAllocator, PlacementPolicy, Resettable};
//! use std::alloc::Layout;
//!
//! let allocator = FreeListAllocator::new(4096, PlacementPolicy::FindFirst)?;
//!
//! unsafe {
//!     let layout = Layout::from_size_align(256, 8).unwrap();
//!     let ptr = allocator.allocate(layout)?;
//!     // ... use the memory ...
//!     allocator.deallocate(ptr.cast(), layout);
//!
//!     // Or reclaim everything at once:
//!     allocator.reset();
//! }
//! # Ok::<(), memarena::AllocError>(())
//! ```

#![warn(missing_docs)]

pub mod allocator;
pub mod arena;
pub mod error;
pub mod utils;

pub use allocator::{
    Allocator, AllocatorStats, FreeListAllocator, LinearAllocator, MemoryUsage, PlacementPolicy,
    PoolAllocator, Resettable, StackAllocator, StatisticsProvider, SystemAllocator,
};
pub use arena::Arena;
pub use error::{AllocError, AllocResult};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
