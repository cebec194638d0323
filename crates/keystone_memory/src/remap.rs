//! # Compaction Remap
//!
//! The old→new block table produced by compacting one pool.
//!
//! Compaction renumbers blocks, so handles issued before it must be
//! rewritten before they are resolved again. The manager cannot see the
//! handles its callers hold; it hands back a [`Remap`] (and optionally calls
//! a closure per move) and the caller rewrites what it owns.
//!
//! A moved block lands under a generation newer than anything its
//! destination slot carried before, so handles to the hole it filled stay
//! stale.
//!
//! ```rust,ignore
//! let remap = manager.defragment(pool)?;
//! remap.apply_all(&mut particle_handles);
//! ```

use crate::handle::Handle;

/// One block relocated by compaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockMove {
    /// Block index before compaction.
    pub from: u32,
    /// Block index after compaction.
    pub to: u32,
    /// Generation the block had at `from`.
    pub from_generation: u32,
    /// Generation the block has at `to`.
    pub to_generation: u32,
}

impl BlockMove {
    /// Handle to the block before the move.
    #[inline]
    #[must_use]
    pub const fn old_handle(&self, pool: u32) -> Handle {
        Handle::new(pool, self.from, self.from_generation)
    }

    /// Handle to the block after the move.
    #[inline]
    #[must_use]
    pub const fn new_handle(&self, pool: u32) -> Handle {
        Handle::new(pool, self.to, self.to_generation)
    }
}

/// Block moves performed by one compaction of one pool.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Remap {
    pool: u32,
    /// Sorted by `from`.
    moves: Vec<BlockMove>,
}

impl Remap {
    /// Creates a remap from moves sorted by source block.
    pub(crate) fn new(pool: u32, moves: Vec<BlockMove>) -> Self {
        debug_assert!(moves.windows(2).all(|w| w[0].from < w[1].from));
        Self { pool, moves }
    }

    /// Index of the compacted pool.
    #[inline]
    #[must_use]
    pub const fn pool_index(&self) -> u32 {
        self.pool
    }

    /// Number of blocks that moved.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    /// Returns `true` if compaction moved nothing.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Iterates over block moves in ascending `from` order.
    pub fn moves(&self) -> impl Iterator<Item = BlockMove> + '_ {
        self.moves.iter().copied()
    }

    /// Returns the post-compaction handle for `handle`.
    ///
    /// Handles of other pools, handles of blocks that did not move and
    /// handles whose generation does not match the moved block come back
    /// unchanged.
    #[must_use]
    pub fn translate(&self, handle: Handle) -> Handle {
        if handle.pool_index() != self.pool {
            return handle;
        }
        match self
            .moves
            .binary_search_by_key(&handle.block_index(), |m| m.from)
        {
            Ok(i) if self.moves[i].from_generation == handle.generation() => {
                handle.relocated(self.moves[i].to, self.moves[i].to_generation)
            }
            _ => handle,
        }
    }

    /// Rewrites `handle` in place. Returns `true` if it changed.
    pub fn apply(&self, handle: &mut Handle) -> bool {
        let translated = self.translate(*handle);
        let changed = translated != *handle;
        *handle = translated;
        changed
    }

    /// Rewrites every handle in `handles`. Returns how many changed.
    pub fn apply_all(&self, handles: &mut [Handle]) -> usize {
        let mut changed = 0;
        for handle in handles.iter_mut() {
            if self.apply(handle) {
                changed += 1;
            }
        }
        changed
    }
}
