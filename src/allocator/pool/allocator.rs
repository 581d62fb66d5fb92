//! Main pool allocator implementation.
//!
//! # Safety
//!
//! The arena is carved into equally sized chunks at construction and every
//! free chunk stores a link to the next one in its own first bytes
//! (an intrusive singly-linked free list). Construction guarantees that
//! chunk bases are aligned for the link type, so the list nodes are always
//! written at aligned addresses.
//!
//! ## Invariants
//!
//! - `capacity == chunk_size * chunk_count`
//! - The free list only threads chunks that are not currently handed out
//! - Every list node sits at `start_addr + i * chunk_size` for some `i`

use core::alloc::Layout;
use core::cell::Cell;
use core::ptr::{self, NonNull};

use tracing::trace;

use super::PoolConfig;
use crate::allocator::stats::{AllocatorStats, UsageCounters};
use crate::allocator::traits::{Allocator, MemoryUsage, Resettable, StatisticsProvider};
use crate::arena::{ARENA_ALIGN, Arena};
use crate::error::{AllocError, AllocResult};
use crate::utils::is_power_of_two;

/// Link stored in the first bytes of every free chunk.
#[repr(C)]
struct FreeChunk {
    next: *mut FreeChunk,
}

/// Pool allocator for fixed-size chunks.
///
/// All requests are served from equally sized chunks; a request may be
/// smaller than the chunk (the chunk size is the declared maximum) but the
/// full chunk is consumed either way.
///
/// # Memory Layout
/// ```text
/// [chunk0][chunk1][chunk2][chunk3]...[chunkN]
///    |       |                |
///  [free] → [free] ──────→ [free] → null
/// ```
pub struct PoolAllocator {
    arena: Arena,
    chunk_size: usize,
    chunk_count: usize,
    head: Cell<*mut FreeChunk>,
    free_count: Cell<usize>,
    config: PoolConfig,
    counters: UsageCounters,
}

impl PoolAllocator {
    /// Creates a pool allocator with custom configuration.
    ///
    /// # Errors
    /// `InvalidConfig` when `chunk_size` cannot hold a free-list link, when
    /// it is not a multiple of the link alignment, or when `total_size` is
    /// not a whole number of chunks.
    pub fn with_config(
        total_size: usize,
        chunk_size: usize,
        config: PoolConfig,
    ) -> AllocResult<Self> {
        if chunk_size < size_of::<FreeChunk>() {
            return Err(AllocError::InvalidConfig(
                "chunk size cannot hold a free-list link",
            ));
        }
        if chunk_size % align_of::<FreeChunk>() != 0 {
            return Err(AllocError::InvalidConfig(
                "chunk size must be a multiple of the link alignment",
            ));
        }
        if total_size == 0 || total_size % chunk_size != 0 {
            return Err(AllocError::InvalidConfig(
                "total size must be a whole number of chunks",
            ));
        }

        let arena = Arena::new(total_size)?;
        let allocator = Self {
            arena,
            chunk_size,
            chunk_count: total_size / chunk_size,
            head: Cell::new(ptr::null_mut()),
            free_count: Cell::new(0),
            config,
            counters: UsageCounters::new(),
        };
        allocator.rebuild_free_list();
        Ok(allocator)
    }

    /// Creates a pool allocator with the default configuration.
    pub fn new(total_size: usize, chunk_size: usize) -> AllocResult<Self> {
        Self::with_config(total_size, chunk_size, PoolConfig::default())
    }

    /// Size of each chunk in bytes.
    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks in the pool.
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Total capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Number of chunks currently free.
    #[inline]
    pub fn free_chunks(&self) -> usize {
        self.free_count.get()
    }

    /// Number of chunks currently handed out.
    #[inline]
    pub fn allocated_chunks(&self) -> usize {
        self.chunk_count - self.free_count.get()
    }

    /// Whether no chunk is left.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.head.get().is_null()
    }

    /// High-water mark of used bytes.
    #[inline]
    pub fn peak(&self) -> usize {
        self.counters.peak()
    }

    /// Whether `ptr` points into this pool's arena.
    pub fn contains(&self, ptr: *const u8) -> bool {
        self.arena.contains(ptr as usize)
    }

    /// Largest alignment a chunk base is guaranteed to have.
    ///
    /// Chunk bases sit at `start + i * chunk_size` with a 16-aligned start,
    /// so the guarantee is the chunk size's largest power-of-two divisor,
    /// capped at the arena's base alignment.
    pub fn natural_alignment(&self) -> usize {
        (1usize << self.chunk_size.trailing_zeros()).min(ARENA_ALIGN)
    }

    /// Threads every chunk onto the free list, first chunk at the head.
    fn rebuild_free_list(&self) {
        let mut prev: *mut FreeChunk = ptr::null_mut();

        for i in (0..self.chunk_count).rev() {
            let chunk = (self.arena.start_addr() + i * self.chunk_size) as *mut FreeChunk;
            // SAFETY: the chunk base is inside the arena and aligned for
            // FreeChunk (construction requires chunk_size to be a multiple
            // of the link alignment, and the arena base is 16-aligned).
            unsafe {
                (*chunk).next = prev;
            }
            prev = chunk;
        }

        self.head.set(prev);
        self.free_count.set(self.chunk_count);
    }
}

// SAFETY: chunks are disjoint by construction, the free list only threads
// chunks that are not handed out, and allocate/deallocate keep it that way.
unsafe impl Allocator for PoolAllocator {
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        let (size, align) = (layout.size(), layout.align());
        if size == 0 {
            return Ok(NonNull::slice_from_raw_parts(NonNull::<u8>::dangling(), 0));
        }
        if !is_power_of_two(align) || align > self.natural_alignment() {
            return Err(AllocError::InvalidAlignment { alignment: align });
        }
        if size > self.chunk_size {
            return Err(AllocError::ChunkMismatch {
                requested: size,
                chunk_size: self.chunk_size,
            });
        }

        let chunk = self.head.get();
        if chunk.is_null() {
            self.counters.record_failure();
            return Err(AllocError::PoolExhausted {
                chunk_count: self.chunk_count,
            });
        }

        // SAFETY: a non-null head is a free chunk inside the arena; its link
        // was written by rebuild_free_list or deallocate.
        unsafe {
            self.head.set((*chunk).next);
        }
        self.free_count.set(self.free_count.get() - 1);

        if let Some(pattern) = self.config.alloc_pattern {
            // SAFETY: the chunk is now exclusively owned by this allocation.
            unsafe {
                ptr::write_bytes(chunk.cast::<u8>(), pattern, self.chunk_size);
            }
        }

        self.counters.record_allocation(self.chunk_size);
        trace!(address = chunk as usize, size, "pool allocate");

        // SAFETY: chunk is non-null, checked above.
        let ptr = unsafe { NonNull::new_unchecked(chunk.cast::<u8>()) };
        Ok(NonNull::slice_from_raw_parts(ptr, size))
    }

    /// Returns a chunk to the free list.
    ///
    /// # Panics
    /// When `ptr` does not belong to this pool or is not a chunk boundary.
    /// Both indicate a foreign or corrupted pointer; relinking it would
    /// corrupt the free list silently. A chunk that is already on the free
    /// list cannot be told apart from a live one and remains the caller's
    /// responsibility.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }

        let address = ptr.as_ptr() as usize;
        assert!(
            self.contains(ptr.as_ptr()),
            "pointer does not belong to this pool"
        );
        assert!(
            (address - self.arena.start_addr()) % self.chunk_size == 0,
            "pointer is not a chunk boundary"
        );

        if let Some(pattern) = self.config.dealloc_pattern {
            // SAFETY: the chunk range was validated above and the caller
            // guarantees it is no longer in use.
            unsafe {
                ptr::write_bytes(ptr.as_ptr(), pattern, self.chunk_size);
            }
        }

        let chunk = address as *mut FreeChunk;
        // SAFETY: the chunk base is aligned for FreeChunk (validated above)
        // and the chunk is no longer in use.
        unsafe {
            (*chunk).next = self.head.get();
        }
        self.head.set(chunk);
        self.free_count.set(self.free_count.get() + 1);

        self.counters.record_deallocation(self.chunk_size);
        trace!(address, "pool free");
    }
}

impl MemoryUsage for PoolAllocator {
    fn used_memory(&self) -> usize {
        self.allocated_chunks() * self.chunk_size
    }

    fn available_memory(&self) -> Option<usize> {
        Some(self.free_chunks() * self.chunk_size)
    }

    fn total_memory(&self) -> Option<usize> {
        Some(self.capacity())
    }
}

impl Resettable for PoolAllocator {
    unsafe fn reset(&self) {
        self.rebuild_free_list();
        self.counters.reset();
        trace!("pool reset");
    }
}

impl StatisticsProvider for PoolAllocator {
    fn statistics(&self) -> AllocatorStats {
        self.counters.snapshot()
    }
}
