//! The contract every allocation strategy implements.
//!
//! The system is built around a small set of traits:
//! - [`Allocator`]: raw allocation and deallocation over a [`Layout`]
//! - [`MemoryUsage`]: used/available/total accounting
//! - [`Resettable`]: wholesale reclamation of the backing arena
//! - [`StatisticsProvider`]: operation counters and the peak watermark
//!
//! # Safety
//!
//! `Allocator` is an `unsafe trait`: implementors must hand out pointers that
//! are valid, properly aligned, and disjoint from every other live
//! allocation of the same instance. Callers in turn must only release
//! pointers they obtained from the same instance, with the layout they
//! requested. The strategies here are single-threaded by design; nothing in
//! this contract synchronizes concurrent use.

use core::alloc::Layout;
use core::ptr::NonNull;

use super::stats::AllocatorStats;
use crate::error::AllocResult;

/// Raw allocation interface shared by every strategy.
///
/// # Safety Requirements
///
/// Implementors must ensure that:
/// - Returned pointers are valid for reads and writes of `layout.size()`
///   bytes and aligned to `layout.align()`
/// - Live allocations never overlap
/// - `deallocate` is only required to be meaningful for pointers previously
///   returned by the same instance with the same layout
pub unsafe trait Allocator {
    /// Allocates memory for the given layout.
    ///
    /// Zero-sized layouts succeed with a dangling pointer on every strategy.
    ///
    /// # Safety
    /// The returned memory is uninitialized and must not be read before
    /// being written. The pointer is invalidated by `reset` and by dropping
    /// the allocator.
    ///
    /// # Errors
    /// Capacity exhaustion and malformed requests surface as typed
    /// [`AllocError`](crate::error::AllocError) values; see each strategy
    /// for the variants it produces.
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>>;

    /// Releases a previously allocated pointer.
    ///
    /// # Safety
    /// - `ptr` must come from `allocate` on this instance with this `layout`
    /// - `ptr` must not be used after this call
    /// - Strategy-specific ordering rules apply (the stack strategy requires
    ///   LIFO order; the linear strategy supports no individual release)
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// Memory accounting every strategy exposes.
pub trait MemoryUsage {
    /// Bytes currently attributed to live allocations.
    fn used_memory(&self) -> usize;

    /// Bytes still available for allocation, if the strategy knows.
    fn available_memory(&self) -> Option<usize>;

    /// Total capacity, if the strategy knows.
    fn total_memory(&self) -> Option<usize> {
        self.available_memory()
            .map(|available| self.used_memory() + available)
    }

    /// Usage as a percentage of total capacity.
    fn memory_usage_percent(&self) -> Option<f32> {
        self.total_memory().map(|total| {
            if total == 0 {
                0.0
            } else {
                (self.used_memory() as f32 / total as f32) * 100.0
            }
        })
    }
}

/// Wholesale reclamation of the arena.
pub trait Resettable {
    /// Returns the allocator to its freshly constructed state.
    ///
    /// Arena contents are not cleared; only the bookkeeping is rebuilt.
    ///
    /// # Safety
    /// Every pointer previously returned by this instance becomes invalid
    /// immediately. The caller must ensure none are still in use.
    unsafe fn reset(&self);

    /// Whether reset is currently safe to perform.
    fn can_reset(&self) -> bool {
        true
    }
}

/// Operation counters and the peak watermark.
pub trait StatisticsProvider {
    /// Snapshot of the current statistics.
    fn statistics(&self) -> AllocatorStats;
}

// Blanket impls so `&T` can stand in for `T` at the contract boundary.

// SAFETY: forwards every call to the underlying allocator; the contract is
// preserved by delegation.
unsafe impl<T: Allocator + ?Sized> Allocator for &T {
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        // SAFETY: same contract as T::allocate.
        unsafe { (**self).allocate(layout) }
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: same contract as T::deallocate.
        unsafe { (**self).deallocate(ptr, layout) }
    }
}

impl<T: MemoryUsage + ?Sized> MemoryUsage for &T {
    fn used_memory(&self) -> usize {
        (**self).used_memory()
    }

    fn available_memory(&self) -> Option<usize> {
        (**self).available_memory()
    }

    fn total_memory(&self) -> Option<usize> {
        (**self).total_memory()
    }
}

impl<T: Resettable + ?Sized> Resettable for &T {
    unsafe fn reset(&self) {
        // SAFETY: same contract as T::reset.
        unsafe { (**self).reset() }
    }

    fn can_reset(&self) -> bool {
        (**self).can_reset()
    }
}
