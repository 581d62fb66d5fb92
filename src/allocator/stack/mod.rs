//! LIFO stack allocation.
//!
//! ## Modules
//! - `allocator` - main [`StackAllocator`] implementation
//! - `config` - debug fill patterns
//! - `marker` - positions for scoped release
//! - `frame` - RAII helper restoring a marker on drop

pub mod allocator;
pub mod config;
pub mod frame;
pub mod marker;

pub use allocator::StackAllocator;
pub use config::StackConfig;
pub use frame::StackFrame;
pub use marker::StackMarker;
