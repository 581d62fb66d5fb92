//! RAII-based stack frame for automatic restoration.

use super::{StackAllocator, StackMarker};

/// Scope guard releasing back to a marked stack position on drop.
///
/// ```
/// use memarena::allocator::{Allocator, StackAllocator, StackFrame};
/// use std::alloc::Layout;
///
/// let allocator = StackAllocator::new(1024)?;
/// {
///     let _frame = StackFrame::new(&allocator);
///     unsafe {
///         allocator.allocate(Layout::from_size_align(64, 8).unwrap())?;
///     }
/// } // everything allocated inside the frame is released here
/// assert_eq!(allocator.used(), 0);
/// # Ok::<(), memarena::AllocError>(())
/// ```
pub struct StackFrame<'a> {
    allocator: &'a StackAllocator,
    marker: StackMarker,
}

impl<'a> StackFrame<'a> {
    /// Opens a frame at the current stack position.
    pub fn new(allocator: &'a StackAllocator) -> Self {
        let marker = allocator.mark();
        Self { allocator, marker }
    }

    /// The underlying allocator.
    pub fn allocator(&self) -> &'a StackAllocator {
        self.allocator
    }
}

impl Drop for StackFrame<'_> {
    fn drop(&mut self) {
        // SAFETY: the frame borrows the allocator for its whole lifetime, so
        // releasing on drop observes the usual marker contract; pointers
        // allocated inside the frame must not outlive it.
        unsafe {
            self.allocator.release(self.marker);
        }
    }
}
