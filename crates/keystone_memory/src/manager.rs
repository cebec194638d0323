//! # Memory Manager
//!
//! Owns the arena and the ordered pools, routes requests to size classes
//! and resolves handles to bounded slices.
//!
//! ## Routing
//!
//! A request goes to the first pool whose block size is `>=` the requested
//! size. If that pool is empty the request fails with
//! [`MemoryError::PoolExhausted`]: there is no fallback to a larger class,
//! so each class keeps the capacity it was planned with.
//!
//! ## Lifetime
//!
//! ```text
//! MemoryManager::new(config)   ── one arena reservation, pools carved
//!       │
//!       ├─ allocate(size) ──► Handle
//!       ├─ block(handle)  ──► &[u8]       (valid until free/defragment)
//!       ├─ free(handle)
//!       ├─ defragment(pool) ──► Remap     (rewrite held handles)
//!       │
//!   drop(manager)              ── arena released, every handle dangles
//! ```
//!
//! Resolved slices borrow the manager, so the borrow checker already
//! forbids holding one across `free`, `defragment` or drop.

use std::fmt;
use std::ops::Range;

use bytemuck::Pod;

use crate::arena::Arena;
use crate::config::MemoryConfig;
use crate::error::{MemoryError, MemoryResult};
use crate::handle::Handle;
use crate::pool::Pool;
use crate::remap::Remap;
use crate::size_class::{SizeClassTable, ALIGNMENT};
use crate::stats::{ManagerStats, PoolStats};

/// Fixed-region, size-classed, handle-indirected allocator.
///
/// # Thread Safety
///
/// This manager is NOT thread-safe. Drive it from one thread, give each
/// thread its own manager, or share it through
/// [`SharedMemoryManager`](crate::SharedMemoryManager).
///
/// # Example
///
/// ```rust
/// use keystone_memory::{MemoryConfig, MemoryManager};
///
/// let config = MemoryConfig::from_pairs(&[(16, 64), (64, 16)]);
/// let mut memory = MemoryManager::new(&config)?;
///
/// let handle = memory.allocate(40)?;
/// memory.block_mut(handle)?[..4].copy_from_slice(&[1, 2, 3, 4]);
/// assert_eq!(memory.block(handle)?.len(), 64);
///
/// memory.free(handle)?;
/// # Ok::<(), keystone_memory::MemoryError>(())
/// ```
pub struct MemoryManager {
    /// The single raw reservation.
    arena: Arena,
    /// One pool per size class, ascending.
    pools: Vec<Pool>,
    /// The validated table the pools were built from.
    table: SizeClassTable,
    /// Reject handles whose generation does not match their block.
    check_generations: bool,
}

impl MemoryManager {
    /// Reserves the arena and carves it into pools.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::InvalidConfig`] if the size-class table is invalid
    /// - [`MemoryError::OutOfMemory`] if the reservation cannot be satisfied
    pub fn new(config: &MemoryConfig) -> MemoryResult<Self> {
        let table = config.size_class_table()?;
        let total = table.total_bytes().ok_or(MemoryError::OutOfMemory {
            requested_bytes: usize::MAX,
        })?;
        let mut arena = Arena::reserve(total)?;

        let mut pools = Vec::with_capacity(table.len());
        let mut offset = 0;
        for &class in table.as_slice() {
            // total_bytes() succeeded, so no footprint overflows.
            let footprint = class.block_size * class.block_count as usize;
            let region = &mut arena.as_bytes_mut()[offset..offset + footprint];
            pools.push(Pool::new(class, offset, region));
            offset += footprint;
        }

        tracing::debug!(
            "memory manager constructed: {} pools, {} byte arena, generation checks {}",
            pools.len(),
            arena.len(),
            config.check_generations
        );

        Ok(Self {
            arena,
            pools,
            table,
            check_generations: config.check_generations,
        })
    }

    /// Builds a manager over the default size-class catalogue.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfMemory`] if the reservation fails.
    pub fn with_default_classes() -> MemoryResult<Self> {
        Self::new(&MemoryConfig::default())
    }

    /// Returns the size-class table.
    #[inline]
    #[must_use]
    pub fn size_classes(&self) -> &SizeClassTable {
        &self.table
    }

    /// Returns the number of pools.
    #[inline]
    #[must_use]
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Returns a pool by index.
    #[inline]
    #[must_use]
    pub fn pool(&self, pool_index: u32) -> Option<&Pool> {
        self.pools.get(pool_index as usize)
    }

    /// Returns all pools in size-class order.
    #[inline]
    #[must_use]
    pub fn pools(&self) -> &[Pool] {
        &self.pools
    }

    /// Returns the arena size in bytes.
    #[inline]
    #[must_use]
    pub fn arena_bytes(&self) -> usize {
        self.arena.len()
    }

    /// Returns whether stale handles are rejected.
    #[inline]
    #[must_use]
    pub const fn checks_generations(&self) -> bool {
        self.check_generations
    }

    /// Allocates a block of at least `size` bytes.
    ///
    /// This is a **O(log classes)** routing step plus an **O(1)** pop.
    /// A `size` of zero is served by the smallest class.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::RequestTooLarge`] if no class is large enough
    /// - [`MemoryError::PoolExhausted`] if the serving class is empty
    pub fn allocate(&mut self, size: usize) -> MemoryResult<Handle> {
        let index = self
            .table
            .route(size)
            .ok_or_else(|| MemoryError::RequestTooLarge {
                requested: size,
                largest: self.table.largest_block_size(),
            })?;

        let pool = &mut self.pools[index];
        let region = &self.arena.as_bytes()[pool.region_range()];
        match pool.acquire(region) {
            Some(block) => Ok(Handle::new(
                pool_id(index),
                block,
                pool.current_generation(block),
            )),
            None => Err(MemoryError::PoolExhausted {
                pool_index: pool_id(index),
                block_size: pool.block_size(),
            }),
        }
    }

    /// Returns a block to its pool.
    ///
    /// The freed block is the next one its pool hands out.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::InvalidHandle`] if the handle names no block
    /// - [`MemoryError::StaleHandle`] if generation checks are on and the
    ///   block was already freed
    ///
    /// Without generation checks a double free is not detected and
    /// corrupts the pool's free chain.
    pub fn free(&mut self, handle: Handle) -> MemoryResult<()> {
        self.validate(handle)?;

        let pool = &mut self.pools[handle.pool_index() as usize];
        let region = &mut self.arena.as_bytes_mut()[pool.region_range()];
        pool.release(region, handle.block_index());
        Ok(())
    }

    /// Resolves a handle to its arena-relative byte offset.
    ///
    /// Equal to `pool_base_offset + block_size * block_index`. Stable until
    /// the block is freed or its pool is compacted.
    ///
    /// # Errors
    ///
    /// Same as [`block`](Self::block).
    pub fn offset(&self, handle: Handle) -> MemoryResult<usize> {
        self.locate(handle).map(|range| range.start)
    }

    /// Resolves a handle to its block.
    ///
    /// The slice is exactly `block_size` bytes and 16-byte aligned.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::InvalidHandle`] if the handle names no block
    /// - [`MemoryError::StaleHandle`] if generation checks are on and the
    ///   handle is stale
    pub fn block(&self, handle: Handle) -> MemoryResult<&[u8]> {
        let range = self.locate(handle)?;
        Ok(&self.arena.as_bytes()[range])
    }

    /// Resolves a handle to its block, mutably.
    ///
    /// # Errors
    ///
    /// Same as [`block`](Self::block).
    pub fn block_mut(&mut self, handle: Handle) -> MemoryResult<&mut [u8]> {
        let range = self.locate(handle)?;
        Ok(&mut self.arena.as_bytes_mut()[range])
    }

    /// Allocates a block sized for `T` and copies `value` into it.
    ///
    /// # Errors
    ///
    /// Same as [`allocate`](Self::allocate).
    pub fn allocate_value<T: Pod>(&mut self, value: &T) -> MemoryResult<Handle> {
        let handle = self.allocate(std::mem::size_of::<T>())?;
        self.write(handle, value)?;
        Ok(handle)
    }

    /// Copies `value` into the start of a block.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::PayloadTooLarge`] if `T` does not fit the block
    /// - any error of [`block_mut`](Self::block_mut)
    pub fn write<T: Pod>(&mut self, handle: Handle, value: &T) -> MemoryResult<()> {
        let bytes = bytemuck::bytes_of(value);
        let block = self.block_mut(handle)?;
        let target = payload_slice_mut(block, bytes.len())?;
        target.copy_from_slice(bytes);
        Ok(())
    }

    /// Copies a `T` out of the start of a block.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::PayloadTooLarge`] if `T` does not fit the block
    /// - any error of [`block`](Self::block)
    pub fn read<T: Pod>(&self, handle: Handle) -> MemoryResult<T> {
        let block = self.block(handle)?;
        let bytes = payload_slice(block, std::mem::size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Views the start of a block as a `T`.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::MisalignedPayload`] if `T` needs more than 16-byte alignment
    /// - [`MemoryError::PayloadTooLarge`] if `T` does not fit the block
    /// - any error of [`block`](Self::block)
    pub fn get<T: Pod>(&self, handle: Handle) -> MemoryResult<&T> {
        let align = check_alignment::<T>()?;
        let block = self.block(handle)?;
        let bytes = payload_slice(block, std::mem::size_of::<T>())?;
        bytemuck::try_from_bytes(bytes).map_err(|_| MemoryError::MisalignedPayload { align })
    }

    /// Views the start of a block as a mutable `T`.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn get_mut<T: Pod>(&mut self, handle: Handle) -> MemoryResult<&mut T> {
        let align = check_alignment::<T>()?;
        let block = self.block_mut(handle)?;
        let bytes = payload_slice_mut(block, std::mem::size_of::<T>())?;
        bytemuck::try_from_bytes_mut(bytes).map_err(|_| MemoryError::MisalignedPayload { align })
    }

    /// Returns `true` if the block `handle` names is currently allocated.
    ///
    /// Walks the pool's free chain, so this is a diagnostic, not a hot-path
    /// check. With generation checks on, a stale handle reports `false`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidHandle`] if the handle names no block.
    pub fn is_allocated(&self, handle: Handle) -> MemoryResult<bool> {
        let pool = match self.validate(handle) {
            Ok(pool) => pool,
            Err(MemoryError::StaleHandle(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        let region = &self.arena.as_bytes()[pool.region_range()];
        Ok(!pool.is_free(region, handle.block_index()))
    }

    /// Handles of every allocated block of a pool, in ascending block order.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidPool`] if the pool does not exist.
    pub fn live_handles(&self, pool_index: u32) -> MemoryResult<Vec<Handle>> {
        let pool = self
            .pool(pool_index)
            .ok_or(MemoryError::InvalidPool(pool_index))?;
        let free = pool.free_map(&self.arena.as_bytes()[pool.region_range()]);

        Ok((0..pool.capacity())
            .filter(|&block| !free[block as usize])
            .map(|block| Handle::new(pool_index, block, pool.current_generation(block)))
            .collect())
    }

    /// Compacts one pool, moving live blocks into its low end.
    ///
    /// This is a maintenance operation: call it between frames, never from
    /// inside one. Every handle into the pool issued before the call must be
    /// passed through the returned [`Remap`] before it is resolved again.
    /// Addresses and offsets resolved before the call are invalid.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidPool`] if the pool does not exist.
    pub fn defragment(&mut self, pool_index: u32) -> MemoryResult<Remap> {
        self.defragment_with(pool_index, |_, _| {})
    }

    /// Compacts one pool and reports every move to `on_move(old, new)`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidPool`] if the pool does not exist.
    pub fn defragment_with<F>(&mut self, pool_index: u32, mut on_move: F) -> MemoryResult<Remap>
    where
        F: FnMut(Handle, Handle),
    {
        let pool = self
            .pools
            .get_mut(pool_index as usize)
            .ok_or(MemoryError::InvalidPool(pool_index))?;
        let region = &mut self.arena.as_bytes_mut()[pool.region_range()];
        let moves = pool.compact(region);

        for m in &moves {
            on_move(m.old_handle(pool_index), m.new_handle(pool_index));
        }

        tracing::debug!(
            "compacted pool {} ({} B blocks): {} live, {} moved",
            pool_index,
            pool.block_size(),
            pool.allocated_count(),
            moves.len()
        );

        Ok(Remap::new(pool_index, moves))
    }

    /// Compacts every pool. Returns one remap per pool, in pool order.
    pub fn defragment_all(&mut self) -> Vec<Remap> {
        (0..pool_id(self.pools.len()))
            .filter_map(|pool_index| self.defragment(pool_index).ok())
            .collect()
    }

    /// Frees every block of every pool.
    ///
    /// Every outstanding handle dangles afterwards; with generation checks
    /// on, each of them is rejected as stale.
    pub fn clear(&mut self) {
        for pool in &mut self.pools {
            let region = &mut self.arena.as_bytes_mut()[pool.region_range()];
            pool.reset(region);
        }
    }

    /// Snapshot of one pool.
    #[must_use]
    pub fn pool_stats(&self, pool_index: u32) -> Option<PoolStats> {
        self.pool(pool_index)
            .map(|pool| PoolStats::from_pool(pool_index, pool))
    }

    /// Snapshot of every pool.
    #[must_use]
    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            arena_bytes: self.arena.len(),
            pools: self
                .pools
                .iter()
                .enumerate()
                .map(|(i, pool)| PoolStats::from_pool(pool_id(i), pool))
                .collect(),
        }
    }

    /// Emits the per-pool free count and free head through `tracing`.
    pub fn log_stats(&self) {
        for pool in self.stats().pools {
            tracing::info!("{}", pool);
        }
    }

    /// Checks that `handle` names an existing block of the right generation.
    fn validate(&self, handle: Handle) -> MemoryResult<&Pool> {
        let pool = self
            .pool(handle.pool_index())
            .ok_or(MemoryError::InvalidHandle(handle))?;
        if !pool.contains(handle.block_index()) {
            return Err(MemoryError::InvalidHandle(handle));
        }
        if self.check_generations
            && pool.current_generation(handle.block_index()) != handle.generation()
        {
            return Err(MemoryError::StaleHandle(handle));
        }
        Ok(pool)
    }

    /// Arena byte range of the block `handle` names.
    fn locate(&self, handle: Handle) -> MemoryResult<Range<usize>> {
        let pool = self.validate(handle)?;
        let block = pool.block_range(handle.block_index());
        let start = pool.base_offset() + block.start;
        Ok(start..start + pool.block_size())
    }
}

impl Drop for MemoryManager {
    fn drop(&mut self) {
        tracing::debug!("releasing {} byte arena", self.arena.len());
    }
}

impl fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryManager")
            .field("arena", &self.arena)
            .field("pools", &self.pools.len())
            .field("check_generations", &self.check_generations)
            .finish()
    }
}

impl fmt::Display for MemoryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stats())
    }
}

/// Pool indices fit in `u32`: the table length is validated below `u32::MAX`.
#[inline]
#[allow(clippy::cast_possible_truncation)]
const fn pool_id(index: usize) -> u32 {
    index as u32
}

#[inline]
fn check_alignment<T>() -> MemoryResult<usize> {
    let align = std::mem::align_of::<T>();
    if align > ALIGNMENT {
        return Err(MemoryError::MisalignedPayload { align });
    }
    Ok(align)
}

#[inline]
fn payload_slice(block: &[u8], payload_bytes: usize) -> MemoryResult<&[u8]> {
    block
        .get(..payload_bytes)
        .ok_or(MemoryError::PayloadTooLarge {
            payload_bytes,
            block_size: block.len(),
        })
}

#[inline]
fn payload_slice_mut(block: &mut [u8], payload_bytes: usize) -> MemoryResult<&mut [u8]> {
    let block_size = block.len();
    block
        .get_mut(..payload_bytes)
        .ok_or(MemoryError::PayloadTooLarge {
            payload_bytes,
            block_size,
        })
}
