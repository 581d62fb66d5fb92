//! Search policy for the free-list allocator.

/// How the free list is searched for a block to serve a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementPolicy {
    /// Take the first block, in address order, large enough for the
    /// request. Cheap, biased toward low addresses.
    FindFirst,
    /// Scan the whole list and take the block wasting the least space.
    /// Slower per allocation, less external fragmentation.
    FindBest,
}
