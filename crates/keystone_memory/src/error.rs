//! # Memory Error Types
//!
//! All errors that can occur while reserving, allocating or resolving memory.

use thiserror::Error;

use crate::handle::Handle;

/// Errors that can occur in the memory manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// The arena reservation could not be satisfied at construction.
    #[error("out of memory: could not reserve {requested_bytes} bytes for the arena")]
    OutOfMemory {
        /// Total bytes the size-class table asked for.
        requested_bytes: usize,
    },

    /// The size class serving a request has no free block left.
    #[error("pool {pool_index} exhausted: no free {block_size}-byte blocks")]
    PoolExhausted {
        /// Index of the exhausted pool.
        pool_index: u32,
        /// Block size of the exhausted pool.
        block_size: usize,
    },

    /// The request is larger than every size class.
    #[error("request too large: {requested} bytes exceeds largest size class of {largest} bytes")]
    RequestTooLarge {
        /// Requested size in bytes.
        requested: usize,
        /// Largest block size the manager serves.
        largest: usize,
    },

    /// The handle references a pool or block that does not exist.
    #[error("invalid handle: {0}")]
    InvalidHandle(Handle),

    /// No pool exists at this index.
    #[error("invalid pool index: {0}")]
    InvalidPool(u32),

    /// The handle's generation no longer matches its block.
    #[error("stale handle: {0}")]
    StaleHandle(Handle),

    /// A typed payload does not fit into the block it was written to.
    #[error("payload of {payload_bytes} bytes does not fit a {block_size}-byte block")]
    PayloadTooLarge {
        /// Size of the payload type.
        payload_bytes: usize,
        /// Size of the target block.
        block_size: usize,
    },

    /// A typed payload needs stronger alignment than blocks guarantee.
    #[error("payload alignment {align} exceeds the 16-byte block alignment")]
    MisalignedPayload {
        /// Alignment required by the payload type.
        align: usize,
    },

    /// Invalid size-class table or configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
