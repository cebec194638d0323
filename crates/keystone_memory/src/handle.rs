//! # Handles
//!
//! Handles are opaque references to allocated blocks consisting of:
//! - The index of the pool (size class) that owns the block
//! - The index of the block within that pool
//! - A generation counter for detecting stale references
//!
//! A handle never carries an address. Addresses are resolved through the
//! [`MemoryManager`](crate::MemoryManager), which is what lets the manager
//! relocate blocks during compaction.

use std::fmt;

/// Opaque reference to an allocated block.
///
/// Handles are plain `Copy` values. Holding one does not keep the block
/// alive: after [`free`](crate::MemoryManager::free) the handle dangles, and
/// whether that is detected depends on
/// [`check_generations`](crate::MemoryConfig::check_generations).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    pool: u32,
    block: u32,
    generation: u32,
}

impl Handle {
    /// Null/invalid handle. Never returned by an allocation.
    pub const NULL: Self = Self {
        pool: u32::MAX,
        block: u32::MAX,
        generation: 0,
    };

    /// Creates a handle from its parts.
    ///
    /// # Arguments
    ///
    /// * `pool` - Index of the owning pool
    /// * `block` - Index of the block within the pool
    /// * `generation` - Generation of the block when it was handed out
    #[inline]
    #[must_use]
    pub const fn new(pool: u32, block: u32, generation: u32) -> Self {
        Self {
            pool,
            block,
            generation,
        }
    }

    /// Returns the pool index.
    #[inline]
    #[must_use]
    pub const fn pool_index(self) -> u32 {
        self.pool
    }

    /// Returns the block index within the pool.
    #[inline]
    #[must_use]
    pub const fn block_index(self) -> u32 {
        self.block
    }

    /// Returns the generation the handle was issued with.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Checks if this is the null handle.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.pool == u32::MAX && self.block == u32::MAX
    }

    /// Returns a handle to another block of the same pool.
    #[inline]
    #[must_use]
    pub(crate) const fn relocated(self, block: u32, generation: u32) -> Self {
        Self {
            pool: self.pool,
            block,
            generation,
        }
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("Handle(null)");
        }
        write!(
            f,
            "Handle(pool={}, block={}, gen={})",
            self.pool, self.block, self.generation
        )
    }
}
