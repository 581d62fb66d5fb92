//! Usage and operation counters.

use core::cell::Cell;
use core::fmt;

/// Snapshot of an allocator's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Bytes currently attributed to live allocations.
    pub allocated_bytes: usize,
    /// Highest value `allocated_bytes` has ever reached.
    pub peak_allocated_bytes: usize,
    /// Number of successful allocations.
    pub allocation_count: usize,
    /// Number of deallocations.
    pub deallocation_count: usize,
    /// Number of refused allocation attempts.
    pub failed_allocations: usize,
}

impl AllocatorStats {
    /// Whether any allocation is still outstanding.
    pub fn has_active_allocations(&self) -> bool {
        self.allocation_count > self.deallocation_count
    }

    /// Allocations minus deallocations.
    pub fn allocation_balance(&self) -> isize {
        self.allocation_count as isize - self.deallocation_count as isize
    }
}

impl fmt::Display for AllocatorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "used {} bytes (peak {}), {} allocs / {} frees, {} refused",
            self.allocated_bytes,
            self.peak_allocated_bytes,
            self.allocation_count,
            self.deallocation_count,
            self.failed_allocations
        )
    }
}

/// Interior-mutable counters shared by the strategies.
///
/// `used` counts the full footprint of each live allocation (payload plus
/// padding plus header where the strategy stores one); `peak` is its
/// monotonically non-decreasing high-water mark. Plain `Cell`s: the
/// strategies are single-threaded by design.
#[derive(Debug, Default)]
pub(crate) struct UsageCounters {
    used: Cell<usize>,
    peak: Cell<usize>,
    allocations: Cell<usize>,
    deallocations: Cell<usize>,
    failures: Cell<usize>,
}

impl UsageCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_allocation(&self, bytes: usize) {
        let used = self.used.get() + bytes;
        self.used.set(used);
        if used > self.peak.get() {
            self.peak.set(used);
        }
        self.allocations.set(self.allocations.get() + 1);
    }

    pub fn record_deallocation(&self, bytes: usize) {
        debug_assert!(bytes <= self.used.get());
        self.used.set(self.used.get().saturating_sub(bytes));
        self.deallocations.set(self.deallocations.get() + 1);
    }

    pub fn record_failure(&self) {
        self.failures.set(self.failures.get() + 1);
    }

    pub fn used(&self) -> usize {
        self.used.get()
    }

    pub fn peak(&self) -> usize {
        self.peak.get()
    }

    /// Zeroes everything, `peak` included. Used by `reset`.
    pub fn reset(&self) {
        self.used.set(0);
        self.peak.set(0);
        self.allocations.set(0);
        self.deallocations.set(0);
        self.failures.set(0);
    }

    pub fn snapshot(&self) -> AllocatorStats {
        AllocatorStats {
            allocated_bytes: self.used.get(),
            peak_allocated_bytes: self.peak.get(),
            allocation_count: self.allocations.get(),
            deallocation_count: self.deallocations.get(),
            failed_allocations: self.failures.get(),
        }
    }
}
