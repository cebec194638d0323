//! # Pool Statistics
//!
//! Point-in-time snapshots of pool occupancy for debugging and capacity
//! planning. Not part of the allocation contract.

use std::fmt;

use serde::Serialize;

use crate::pool::Pool;

/// Snapshot of one pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Index of the pool in the size-class table.
    pub pool_index: u32,
    /// Bytes per block.
    pub block_size: usize,
    /// Total blocks.
    pub capacity: u32,
    /// Free blocks.
    pub free_count: u32,
    /// Block the next allocation will receive, if any.
    pub free_head: Option<u32>,
    /// Highest number of blocks ever allocated at once.
    pub peak_allocated: u32,
    /// Allocations rejected because the pool was empty.
    pub exhausted_count: u64,
    /// Offset of the pool's region within the arena.
    pub base_offset: usize,
}

impl PoolStats {
    pub(crate) fn from_pool(pool_index: u32, pool: &Pool) -> Self {
        Self {
            pool_index,
            block_size: pool.block_size(),
            capacity: pool.capacity(),
            free_count: pool.free_count(),
            free_head: pool.free_head(),
            peak_allocated: pool.peak_allocated(),
            exhausted_count: pool.exhausted_count(),
            base_offset: pool.base_offset(),
        }
    }

    /// Allocated blocks.
    #[inline]
    #[must_use]
    pub const fn allocated_count(&self) -> u32 {
        self.capacity - self.free_count
    }

    /// Fraction of blocks in use, in `[0.0, 1.0]`.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        f64::from(self.allocated_count()) / f64::from(self.capacity)
    }
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pool {:>2} [{:>8} B]: free {}/{}, head ",
            self.pool_index, self.block_size, self.free_count, self.capacity
        )?;
        match self.free_head {
            Some(head) => write!(f, "{head}")?,
            None => f.write_str("-")?,
        }
        write!(
            f,
            ", peak {}, exhausted {}",
            self.peak_allocated, self.exhausted_count
        )
    }
}

/// Snapshot of every pool of a manager.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ManagerStats {
    /// Total arena size in bytes.
    pub arena_bytes: usize,
    /// Per-pool snapshots in size-class order.
    pub pools: Vec<PoolStats>,
}

impl ManagerStats {
    /// Bytes held by allocated blocks (block granularity).
    #[must_use]
    pub fn allocated_bytes(&self) -> usize {
        self.pools
            .iter()
            .map(|p| p.block_size * p.allocated_count() as usize)
            .sum()
    }

    /// Total allocated blocks across all pools.
    #[must_use]
    pub fn allocated_blocks(&self) -> u64 {
        self.pools.iter().map(|p| u64::from(p.allocated_count())).sum()
    }

    /// Total exhausted allocations across all pools.
    #[must_use]
    pub fn exhausted_count(&self) -> u64 {
        self.pools.iter().map(|p| p.exhausted_count).sum()
    }
}

impl fmt::Display for ManagerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "arena {} B, {} B allocated in {} blocks",
            self.arena_bytes,
            self.allocated_bytes(),
            self.allocated_blocks()
        )?;
        for pool in &self.pools {
            writeln!(f, "  {pool}")?;
        }
        Ok(())
    }
}
