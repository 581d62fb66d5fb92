//! Main free-list allocator implementation.
//!
//! # Safety
//!
//! Free memory describes itself: every free block starts with a [`FreeNode`]
//! holding the block's size and a link to the next free block, kept in
//! strictly ascending address order. Allocated blocks instead carry an
//! [`AllocationHeader`] immediately before the payload, recording how many
//! bytes the block consumed and how much alignment padding precedes the
//! header, so `deallocate` can recover the block's full extent from the
//! pointer alone.
//!
//! ## Invariants
//!
//! - Free nodes are ordered by strictly ascending address
//! - No two free nodes describe overlapping ranges
//! - Adjacent free nodes exist only transiently: coalescing merges them on
//!   every free
//! - Every free node sits at an address aligned for `FreeNode`; allocation
//!   rounds the consumed byte count up to keep split points aligned

use core::alloc::Layout;
use core::cell::Cell;
use core::ptr::{self, NonNull};

use tracing::trace;

use super::PlacementPolicy;
use crate::allocator::stats::{AllocatorStats, UsageCounters};
use crate::allocator::traits::{Allocator, MemoryUsage, Resettable, StatisticsProvider};
use crate::arena::Arena;
use crate::error::{AllocError, AllocResult};
use crate::utils::{align_up, is_power_of_two, padding_with_header};

/// Node overlaid on every free block.
#[repr(C)]
struct FreeNode {
    block_size: usize,
    next: *mut FreeNode,
}

/// Header stored immediately before every allocated payload.
///
/// `block_size` is the full extent consumed from the free block (header,
/// alignment padding and payload); `padding` is the distance from the
/// block's start to the header.
#[repr(C)]
struct AllocationHeader {
    block_size: usize,
    padding: u8,
}

const NODE_SIZE: usize = size_of::<FreeNode>();
const HEADER_SIZE: usize = size_of::<AllocationHeader>();

/// Smallest payload the strategy accepts: a freed block must be able to
/// hold a [`FreeNode`] again.
pub const MIN_ALLOCATION: usize = NODE_SIZE;

/// Smallest alignment the strategy accepts.
pub const MIN_ALIGNMENT: usize = 8;

/// Largest alignment the strategy accepts (the header stores the padding in
/// a `u8`).
pub const MAX_ALIGNMENT: usize = 128;

/// A block picked by the search, with everything removal needs.
struct FindSlot {
    node: *mut FreeNode,
    previous: *mut FreeNode,
    padding: usize,
}

/// Variable-size allocator over an address-ordered intrusive free list.
///
/// Supports block splitting on allocation, coalescing on free, and a
/// first-fit or best-fit search selected at construction.
pub struct FreeListAllocator {
    arena: Arena,
    policy: PlacementPolicy,
    head: Cell<*mut FreeNode>,
    counters: UsageCounters,
}

impl FreeListAllocator {
    /// Creates a free-list allocator over a fresh arena of `capacity`
    /// bytes, using `policy` for every search.
    pub fn new(capacity: usize, policy: PlacementPolicy) -> AllocResult<Self> {
        if capacity < NODE_SIZE {
            return Err(AllocError::InvalidConfig(
                "capacity cannot hold a single free-list node",
            ));
        }
        let arena = Arena::new(capacity)?;
        let allocator = Self {
            arena,
            policy,
            head: Cell::new(ptr::null_mut()),
            counters: UsageCounters::new(),
        };
        allocator.rebuild_free_list();
        Ok(allocator)
    }

    /// Total capacity of the arena.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Bytes consumed by live blocks, headers and padding included.
    #[inline]
    pub fn used(&self) -> usize {
        self.counters.used()
    }

    /// Bytes not attributed to live blocks.
    #[inline]
    pub fn available(&self) -> usize {
        self.capacity() - self.used()
    }

    /// High-water mark of [`used`](Self::used).
    #[inline]
    pub fn peak(&self) -> usize {
        self.counters.peak()
    }

    /// The search policy this instance was built with.
    #[inline]
    pub fn policy(&self) -> PlacementPolicy {
        self.policy
    }

    /// Number of blocks currently on the free list.
    ///
    /// O(n) walk; mostly useful to observe fragmentation and coalescing.
    pub fn free_block_count(&self) -> usize {
        let mut count = 0;
        let mut it = self.head.get();
        while !it.is_null() {
            count += 1;
            // SAFETY: the list only threads nodes this allocator wrote into
            // its own free memory.
            it = unsafe { (*it).next };
        }
        count
    }

    /// Discards all list structure and covers the arena with one free node.
    fn rebuild_free_list(&self) {
        let first = self.arena.start_addr() as *mut FreeNode;
        // SAFETY: the arena start is 16-aligned and capacity holds at least
        // one node (checked at construction).
        unsafe {
            (*first).block_size = self.arena.capacity();
            (*first).next = ptr::null_mut();
        }
        self.head.set(first);
    }

    fn find(&self, size: usize, align: usize) -> Option<FindSlot> {
        match self.policy {
            PlacementPolicy::FindFirst => self.find_first(size, align),
            PlacementPolicy::FindBest => self.find_best(size, align),
        }
    }

    /// First block, in address order, whose size covers payload plus
    /// header-aware padding.
    fn find_first(&self, size: usize, align: usize) -> Option<FindSlot> {
        let mut previous: *mut FreeNode = ptr::null_mut();
        let mut it = self.head.get();

        while !it.is_null() {
            let padding = padding_with_header(it as usize, align, HEADER_SIZE);
            let required = size + padding;
            // SAFETY: it is a live node of the owned list.
            let block_size = unsafe { (*it).block_size };
            if block_size >= required {
                return Some(FindSlot {
                    node: it,
                    previous,
                    padding,
                });
            }
            previous = it;
            // SAFETY: as above.
            it = unsafe { (*it).next };
        }
        None
    }

    /// Whole-list scan tracking the smallest sufficient block. On equal
    /// slack the later node in scan order wins.
    fn find_best(&self, size: usize, align: usize) -> Option<FindSlot> {
        let mut best: Option<FindSlot> = None;
        let mut smallest_slack = usize::MAX;
        let mut previous: *mut FreeNode = ptr::null_mut();
        let mut it = self.head.get();

        while !it.is_null() {
            let padding = padding_with_header(it as usize, align, HEADER_SIZE);
            let required = size + padding;
            // SAFETY: it is a live node of the owned list.
            let block_size = unsafe { (*it).block_size };
            if block_size >= required && block_size - required <= smallest_slack {
                smallest_slack = block_size - required;
                best = Some(FindSlot {
                    node: it,
                    previous,
                    padding,
                });
            }
            previous = it;
            // SAFETY: as above.
            it = unsafe { (*it).next };
        }
        best
    }

    /// Links `node` right after `previous` (at the head when `previous` is
    /// null).
    ///
    /// # Safety
    /// Both pointers must be valid nodes of this list (or null for
    /// `previous`), and the caller must preserve ascending address order.
    unsafe fn insert_after(&self, previous: *mut FreeNode, node: *mut FreeNode) {
        // SAFETY: caller contract.
        unsafe {
            if previous.is_null() {
                (*node).next = self.head.get();
                self.head.set(node);
            } else {
                (*node).next = (*previous).next;
                (*previous).next = node;
            }
        }
    }

    /// Unlinks `node`, the immediate successor of `previous` (the head when
    /// `previous` is null).
    ///
    /// # Safety
    /// `node` must directly follow `previous` in this list.
    unsafe fn remove_after(&self, previous: *mut FreeNode, node: *mut FreeNode) {
        // SAFETY: caller contract.
        unsafe {
            if previous.is_null() {
                self.head.set((*node).next);
            } else {
                (*previous).next = (*node).next;
            }
        }
    }

    /// Merges `node` with its successor and predecessor where they touch.
    ///
    /// Runs both checks on every free, forward first, so a freed block can
    /// absorb its follower and then be absorbed by its predecessor in the
    /// same call.
    ///
    /// # Safety
    /// `previous` must be `node`'s predecessor in the list (null at the
    /// head).
    unsafe fn coalesce(&self, previous: *mut FreeNode, node: *mut FreeNode) {
        // SAFETY: all involved pointers are live nodes of the owned list;
        // adjacency is established by exact end == start address matches.
        unsafe {
            let next = (*node).next;
            if !next.is_null() && node as usize + (*node).block_size == next as usize {
                (*node).block_size += (*next).block_size;
                self.remove_after(node, next);
            }

            if !previous.is_null() && previous as usize + (*previous).block_size == node as usize {
                (*previous).block_size += (*node).block_size;
                self.remove_after(previous, node);
            }
        }
    }
}

// SAFETY: blocks handed out are carved from free nodes after bounds-checked
// fit computation; the free list never references allocated bytes.
unsafe impl Allocator for FreeListAllocator {
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        let (size, align) = (layout.size(), layout.align());
        if size == 0 {
            return Ok(NonNull::slice_from_raw_parts(NonNull::<u8>::dangling(), 0));
        }
        if size < MIN_ALLOCATION {
            return Err(AllocError::InvalidSize {
                size,
                min: MIN_ALLOCATION,
            });
        }
        if !is_power_of_two(align) || align < MIN_ALIGNMENT || align > MAX_ALIGNMENT {
            return Err(AllocError::InvalidAlignment { alignment: align });
        }

        let Some(slot) = self.find(size, align) else {
            self.counters.record_failure();
            return Err(AllocError::ArenaExhausted {
                requested: size,
                available: self.available(),
            });
        };
        let FindSlot {
            node,
            previous,
            padding,
        } = slot;

        let required = size + padding;
        // SAFETY: node was returned by find, so it is a live list node and
        // block_size >= required.
        let block_size = unsafe { (*node).block_size };

        // Splitting must leave the leftover node at an address aligned for
        // FreeNode, so the consumed extent is rounded up to the node
        // alignment before carving.
        let split_point = align_up(required, align_of::<FreeNode>());
        let consumed = if block_size > split_point && block_size - split_point > NODE_SIZE {
            let rest = block_size - split_point;
            let leftover = (node as usize + split_point) as *mut FreeNode;
            // SAFETY: leftover lies inside the chosen block, past the bytes
            // being consumed, and is node-aligned by construction.
            unsafe {
                (*leftover).block_size = rest;
                (*leftover).next = ptr::null_mut();
                self.insert_after(node, leftover);
            }
            split_point
        } else {
            // Remainder too small to track: the whole block is consumed.
            block_size
        };

        // SAFETY: previous is node's predecessor as reported by find, and
        // the leftover (if any) was inserted after node, not between them.
        unsafe {
            self.remove_after(previous, node);
        }

        let alignment_padding = padding - HEADER_SIZE;
        let header_addr = node as usize + alignment_padding;
        let payload = header_addr + HEADER_SIZE;

        // SAFETY: header_addr + HEADER_SIZE == payload <= node + required,
        // all within the chosen block; payload alignment >= 8 makes the
        // header write aligned.
        unsafe {
            let header = header_addr as *mut AllocationHeader;
            (*header).block_size = consumed;
            (*header).padding = alignment_padding as u8;
        }

        self.counters.record_allocation(consumed);
        trace!(address = payload, size, padding, consumed, "free-list allocate");

        // SAFETY: payload is inside the arena, which never starts at null.
        let ptr = unsafe { NonNull::new_unchecked(payload as *mut u8) };
        Ok(NonNull::slice_from_raw_parts(ptr, size))
    }

    /// Returns a block to the free list and coalesces with its neighbors.
    ///
    /// # Safety
    /// In addition to the contract requirements, `ptr` must not already
    /// have been released: the strategy has no way to recognize a double
    /// free and the list would be corrupted silently.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }

        let address = ptr.as_ptr() as usize;
        let header_addr = address - HEADER_SIZE;

        // SAFETY: allocate placed the header directly before the payload;
        // the caller guarantees ptr came from allocate on this instance.
        let (block_start, block_size) = unsafe {
            let header = header_addr as *const AllocationHeader;
            (
                header_addr - (*header).padding as usize,
                (*header).block_size,
            )
        };
        debug_assert!(self.arena.contains_range(block_start, block_size));

        let node = block_start as *mut FreeNode;
        // SAFETY: the block is no longer in use and starts at a
        // node-aligned address (allocate only carves at aligned offsets).
        unsafe {
            (*node).block_size = block_size;
            (*node).next = ptr::null_mut();
        }

        // Walk to the ascending-address insertion point.
        let mut previous: *mut FreeNode = ptr::null_mut();
        let mut it = self.head.get();
        while !it.is_null() && (it as usize) < block_start {
            previous = it;
            // SAFETY: it is a live node of the owned list.
            it = unsafe { (*it).next };
        }

        // SAFETY: previous is the last node below block_start, preserving
        // address order; coalesce requires exactly that predecessor.
        unsafe {
            self.insert_after(previous, node);
            self.counters.record_deallocation(block_size);
            self.coalesce(previous, node);
        }
        trace!(address, block_size, "free-list free");
    }
}

impl MemoryUsage for FreeListAllocator {
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

impl Resettable for FreeListAllocator {
    unsafe fn reset(&self) {
        self.rebuild_free_list();
        self.counters.reset();
        trace!("free-list reset");
    }
}

impl StatisticsProvider for FreeListAllocator {
    fn statistics(&self) -> AllocatorStats {
        self.counters.snapshot()
    }
}
