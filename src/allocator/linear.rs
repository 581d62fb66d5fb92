//! Monotonic bump allocation over an owned arena.
//!
//! The linear strategy only ever advances a cursor; individual frees do not
//! exist. Callers reclaim memory wholesale through
//! [`Resettable::reset`](crate::allocator::Resettable::reset).

use core::alloc::Layout;
use core::cell::Cell;
use core::ptr::NonNull;

use tracing::trace;

use super::stats::{AllocatorStats, UsageCounters};
use super::traits::{Allocator, MemoryUsage, Resettable, StatisticsProvider};
use crate::arena::Arena;
use crate::error::{AllocError, AllocResult};
use crate::utils::{is_aligned, is_power_of_two, padding_for};

/// Bump-pointer allocator: O(1) allocation, no individual free.
///
/// # Memory Layout
/// ```text
/// [start]----[alloc1]--[alloc2]----[cursor]..........[end]
///             <---- allocated ---->  <-- available -->
/// ```
pub struct LinearAllocator {
    arena: Arena,
    /// Absolute address of the next free byte.
    cursor: Cell<usize>,
    counters: UsageCounters,
}

impl LinearAllocator {
    /// Creates a linear allocator over a fresh arena of `capacity` bytes.
    pub fn new(capacity: usize) -> AllocResult<Self> {
        let arena = Arena::new(capacity)?;
        let cursor = Cell::new(arena.start_addr());
        Ok(Self {
            arena,
            cursor,
            counters: UsageCounters::new(),
        })
    }

    /// Total capacity of the arena.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Bytes consumed so far, padding included.
    #[inline]
    pub fn used(&self) -> usize {
        self.cursor.get() - self.arena.start_addr()
    }

    /// Bytes remaining.
    #[inline]
    pub fn available(&self) -> usize {
        self.arena.end_addr() - self.cursor.get()
    }

    /// High-water mark of [`used`](Self::used).
    #[inline]
    pub fn peak(&self) -> usize {
        self.counters.peak()
    }

    fn try_bump(&self, size: usize, align: usize) -> AllocResult<NonNull<u8>> {
        if !is_power_of_two(align) {
            return Err(AllocError::InvalidAlignment { alignment: align });
        }

        let current = self.cursor.get();
        // No header precedes a linear allocation, so an aligned cursor needs
        // no padding at all.
        let padding = if is_aligned(current, align) {
            0
        } else {
            padding_for(current, align)
        };

        let new_cursor = current
            .checked_add(padding)
            .and_then(|a| a.checked_add(size))
            .ok_or(AllocError::ArenaExhausted {
                requested: size,
                available: self.available(),
            })?;

        if new_cursor > self.arena.end_addr() {
            self.counters.record_failure();
            return Err(AllocError::ArenaExhausted {
                requested: size,
                available: self.available(),
            });
        }

        let address = current + padding;
        self.cursor.set(new_cursor);
        self.counters.record_allocation(padding + size);
        trace!(address, size, padding, "linear allocate");

        // SAFETY: address lies inside the arena, which never starts at null.
        Ok(unsafe { NonNull::new_unchecked(address as *mut u8) })
    }
}

// SAFETY: the cursor only moves forward between resets, so returned ranges
// are in-bounds, aligned and disjoint.
unsafe impl Allocator for LinearAllocator {
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        if layout.size() == 0 {
            return Ok(NonNull::slice_from_raw_parts(NonNull::<u8>::dangling(), 0));
        }
        let ptr = self.try_bump(layout.size(), layout.align())?;
        Ok(NonNull::slice_from_raw_parts(ptr, layout.size()))
    }

    /// Individual frees are unsupported by design.
    ///
    /// # Panics
    /// Always. Use [`reset`](Resettable::reset) to reclaim the arena.
    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {
        panic!("LinearAllocator cannot release individual allocations; call reset() instead");
    }
}

impl MemoryUsage for LinearAllocator {
    fn used_memory(&self) -> usize {
        self.used()
    }

    fn available_memory(&self) -> Option<usize> {
        Some(self.available())
    }

    fn total_memory(&self) -> Option<usize> {
        Some(self.capacity())
    }
}

impl Resettable for LinearAllocator {
    unsafe fn reset(&self) {
        self.cursor.set(self.arena.start_addr());
        self.counters.reset();
        trace!("linear reset");
    }
}

impl StatisticsProvider for LinearAllocator {
    fn statistics(&self) -> AllocatorStats {
        self.counters.snapshot()
    }
}
