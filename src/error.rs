//! Error type shared by every allocation strategy.
//!
//! All refusals are typed and recoverable: capacity exhaustion, pool
//! exhaustion and malformed requests come back as [`AllocError`] values the
//! caller can branch on. The one deliberate exception is
//! [`LinearAllocator::deallocate`](crate::allocator::LinearAllocator), which
//! panics because individual frees are unsupported by design there.

use thiserror::Error;

/// Errors produced by the allocation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The arena has no room left for the request.
    #[error("arena exhausted: requested {requested} bytes, {available} available")]
    ArenaExhausted {
        /// Bytes the caller asked for.
        requested: usize,
        /// Bytes the arena could still hand out.
        available: usize,
    },

    /// Every chunk of the pool is in use.
    #[error("pool exhausted: all {chunk_count} chunks are in use")]
    PoolExhausted {
        /// Number of chunks the pool was built with.
        chunk_count: usize,
    },

    /// The requested alignment is not a power of two, or falls outside the
    /// strategy's supported range.
    #[error("unsupported alignment {alignment}")]
    InvalidAlignment {
        /// The offending alignment.
        alignment: usize,
    },

    /// The requested size is below the strategy's minimum footprint.
    #[error("allocation of {size} bytes is below the strategy minimum of {min}")]
    InvalidSize {
        /// Bytes the caller asked for.
        size: usize,
        /// Smallest size the strategy can represent.
        min: usize,
    },

    /// A pool request larger than the configured chunk size.
    #[error("request of {requested} bytes does not fit a {chunk_size}-byte chunk")]
    ChunkMismatch {
        /// Bytes the caller asked for.
        requested: usize,
        /// Fixed chunk size of the pool.
        chunk_size: usize,
    },

    /// Construction-time misconfiguration.
    #[error("invalid allocator configuration: {0}")]
    InvalidConfig(&'static str),
}

impl AllocError {
    /// Whether the error is a capacity condition the caller can recover from
    /// by freeing or resetting, as opposed to a malformed request.
    pub fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            AllocError::ArenaExhausted { .. } | AllocError::PoolExhausted { .. }
        )
    }
}

/// Result type for allocation operations.
pub type AllocResult<T> = Result<T, AllocError>;
