//! Main stack allocator implementation.
//!
//! # Safety
//!
//! Each allocation is preceded by a one-byte slot header recording the
//! padding applied for that slot. `deallocate` reads the header back and
//! rewinds the cursor to the slot's start, which is only correct when the
//! pointer being released is the most recently allocated still-live slot.
//! LIFO order is therefore a caller precondition, not something the
//! allocator can detect after the fact.
//!
//! ## Invariants
//!
//! - The live region is one contiguous prefix of the arena
//! - Every payload is preceded by its padding byte at `payload - 1`
//! - The cursor always lies within `[start_addr, end_addr]`

use core::alloc::Layout;
use core::cell::Cell;
use core::ptr::{self, NonNull};

use tracing::trace;

use super::{StackConfig, StackMarker};
use crate::allocator::stats::{AllocatorStats, UsageCounters};
use crate::allocator::traits::{Allocator, MemoryUsage, Resettable, StatisticsProvider};
use crate::arena::Arena;
use crate::error::{AllocError, AllocResult};
use crate::utils::{is_power_of_two, padding_with_header};

/// Padding byte stored immediately before every payload.
#[repr(C)]
struct SlotHeader {
    padding: u8,
}

const SLOT_HEADER_SIZE: usize = size_of::<SlotHeader>();

/// Largest alignment the stack strategy accepts.
///
/// The per-slot padding is stored in a `u8`, which bounds the padding a
/// single slot can carry.
pub const MAX_STACK_ALIGNMENT: usize = 128;

/// Stack allocator with LIFO allocation and release.
///
/// More flexible than [`LinearAllocator`](crate::allocator::LinearAllocator)
/// in that individual frees exist, but only in reverse allocation order.
///
/// # Memory Layout
/// ```text
/// [start]--[pad|H|slot1]--[pad|H|slot2]--[cursor].....[end]
///           <------ allocated ------->    <- available ->
/// ```
pub struct StackAllocator {
    arena: Arena,
    /// Absolute address of the top of the stack.
    cursor: Cell<usize>,
    config: StackConfig,
    counters: UsageCounters,
}

impl StackAllocator {
    /// Creates a stack allocator with custom configuration.
    pub fn with_config(capacity: usize, config: StackConfig) -> AllocResult<Self> {
        let arena = Arena::new(capacity)?;
        let cursor = Cell::new(arena.start_addr());
        Ok(Self {
            arena,
            cursor,
            config,
            counters: UsageCounters::new(),
        })
    }

    /// Creates a stack allocator with the default configuration.
    pub fn new(capacity: usize) -> AllocResult<Self> {
        Self::with_config(capacity, StackConfig::default())
    }

    /// Total capacity of the arena.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Bytes consumed by live slots, padding and headers included.
    #[inline]
    pub fn used(&self) -> usize {
        self.cursor.get() - self.arena.start_addr()
    }

    /// Bytes remaining above the top of the stack.
    #[inline]
    pub fn available(&self) -> usize {
        self.arena.end_addr() - self.cursor.get()
    }

    /// High-water mark of [`used`](Self::used).
    #[inline]
    pub fn peak(&self) -> usize {
        self.counters.peak()
    }

    /// Saves the current top of the stack.
    pub fn mark(&self) -> StackMarker {
        StackMarker {
            position: self.cursor.get(),
        }
    }

    /// Rewinds the stack to `marker`, releasing every slot allocated after
    /// it was taken.
    ///
    /// A marker that is out of bounds or ahead of the current top is ignored
    /// (it can only arise from misuse, asserted in debug builds).
    ///
    /// # Safety
    /// All pointers handed out after the marker was taken become invalid.
    pub unsafe fn release(&self, marker: StackMarker) {
        let current = self.cursor.get();
        if marker.position > current
            || marker.position < self.arena.start_addr()
            || marker.position > self.arena.end_addr()
        {
            debug_assert!(false, "stale or foreign stack marker");
            return;
        }

        let freed = current - marker.position;
        if freed == 0 {
            return;
        }

        if let Some(pattern) = self.config.dealloc_pattern {
            // SAFETY: [marker.position, current) is inside the arena and no
            // longer holds live slots after the rewind below.
            unsafe {
                ptr::write_bytes(marker.position as *mut u8, pattern, freed);
            }
        }

        self.cursor.set(marker.position);
        self.counters.record_deallocation(freed);
        trace!(position = marker.position, freed, "stack release");
    }
}

// SAFETY: the cursor only moves forward between releases, slot ranges are
// bounds-checked before the cursor advances, and the one-byte header always
// fits inside the slot's padding (padding_with_header guarantees it).
unsafe impl Allocator for StackAllocator {
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        let (size, align) = (layout.size(), layout.align());
        if size == 0 {
            return Ok(NonNull::slice_from_raw_parts(NonNull::<u8>::dangling(), 0));
        }
        if !is_power_of_two(align) || align > MAX_STACK_ALIGNMENT {
            return Err(AllocError::InvalidAlignment { alignment: align });
        }

        let current = self.cursor.get();
        let padding = padding_with_header(current, align, SLOT_HEADER_SIZE);

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

        let payload = current + padding;

        // SAFETY: padding >= SLOT_HEADER_SIZE, so the header byte lands
        // inside this slot's padding, within the arena. padding <= 255 holds
        // because align is capped at MAX_STACK_ALIGNMENT.
        unsafe {
            let header = (payload - SLOT_HEADER_SIZE) as *mut SlotHeader;
            (*header).padding = padding as u8;
        }

        if let Some(pattern) = self.config.alloc_pattern {
            // SAFETY: [payload, payload + size) was bounds-checked above and
            // belongs exclusively to this slot.
            unsafe {
                ptr::write_bytes(payload as *mut u8, pattern, size);
            }
        }

        self.cursor.set(new_cursor);
        self.counters.record_allocation(padding + size);
        trace!(address = payload, size, padding, "stack allocate");

        // SAFETY: payload is inside the arena, which never starts at null.
        let ptr = unsafe { NonNull::new_unchecked(payload as *mut u8) };
        Ok(NonNull::slice_from_raw_parts(ptr, size))
    }

    /// Releases the most recently allocated slot.
    ///
    /// # Safety
    /// In addition to the contract requirements, `ptr` must be the top-most
    /// live slot. Releasing out of LIFO order rewinds the cursor over slots
    /// that are still live, silently invalidating them.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }

        let address = ptr.as_ptr() as usize;
        debug_assert!(self.arena.contains(address));

        // SAFETY: every payload handed out by allocate is preceded by its
        // slot header; the caller guarantees ptr came from allocate.
        let padding = unsafe {
            let header = (address - SLOT_HEADER_SIZE) as *const SlotHeader;
            (*header).padding as usize
        };

        let slot_start = address - padding;
        let freed = padding + layout.size();

        if let Some(pattern) = self.config.dealloc_pattern {
            // SAFETY: the slot range was valid when allocated and the caller
            // guarantees it is no longer in use.
            unsafe {
                ptr::write_bytes(slot_start as *mut u8, pattern, freed);
            }
        }

        self.cursor.set(slot_start);
        self.counters.record_deallocation(freed);
        trace!(address, freed, "stack free");
    }
}

impl MemoryUsage for StackAllocator {
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

impl Resettable for StackAllocator {
    unsafe fn reset(&self) {
        self.cursor.set(self.arena.start_addr());
        self.counters.reset();
        trace!("stack reset");
    }
}

impl StatisticsProvider for StackAllocator {
    fn statistics(&self) -> AllocatorStats {
        self.counters.snapshot()
    }
}
