//! Position markers for scoped deallocation.

/// A saved stack position.
///
/// Obtained from [`StackAllocator::mark`](super::StackAllocator::mark) and
/// consumed by [`StackAllocator::release`](super::StackAllocator::release),
/// which frees every slot allocated after the mark in one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackMarker {
    pub(super) position: usize,
}
