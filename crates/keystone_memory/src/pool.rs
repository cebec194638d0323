//! # Pool Allocator
//!
//! Fixed-size block pool for one size class.
//!
//! The free list is intrusive: each free block stores the index of the next
//! free block in its first four bytes, so a pool needs no side storage for
//! its free chain. The pool itself never owns bytes. Every operation that
//! touches the chain borrows the pool's region of the arena, which the
//! [`MemoryManager`](crate::MemoryManager) hands out per call.

use std::ops::Range;

use crate::remap::BlockMove;
use crate::size_class::SizeClass;

/// Marks the end of a free chain.
pub const FREE_SENTINEL: u32 = u32::MAX;

/// Bytes of a free block used for the next-free link.
const LINK_BYTES: usize = std::mem::size_of::<u32>();

/// One size class: `capacity` homogeneous blocks plus an intrusive free stack.
///
/// Invariant: every index in `0..capacity` is either allocated or present
/// exactly once in the chain starting at `free_head`, and the chain has
/// exactly `free_count` links.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. It is only mutated through `&mut` access
/// to its manager.
#[derive(Debug)]
pub struct Pool {
    /// Bytes per block.
    block_size: usize,
    /// Total blocks.
    capacity: u32,
    /// Offset of this pool's region within the arena.
    base_offset: usize,
    /// First free block, or `FREE_SENTINEL`.
    free_head: u32,
    /// Number of links in the free chain.
    free_count: u32,
    /// Per-block generation, bumped whenever a block stops being live.
    generations: Box<[u32]>,
    /// High-water mark of allocated blocks.
    peak_allocated: u32,
    /// Acquires that found the pool empty.
    exhausted_count: u64,
}

impl Pool {
    /// Creates a pool over `region` and threads every block onto the free chain.
    ///
    /// `region` must be exactly [`footprint`](Self::footprint) bytes.
    pub(crate) fn new(class: SizeClass, base_offset: usize, region: &mut [u8]) -> Self {
        debug_assert!(class.block_size >= LINK_BYTES);
        debug_assert_eq!(Some(region.len()), class.footprint());

        let mut pool = Self {
            block_size: class.block_size,
            capacity: class.block_count,
            base_offset,
            free_head: FREE_SENTINEL,
            free_count: 0,
            generations: vec![0; class.block_count as usize].into_boxed_slice(),
            peak_allocated: 0,
            exhausted_count: 0,
        };
        pool.format_free_chain(region, 0);
        pool
    }

    /// Returns the block size in bytes.
    #[inline]
    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    /// Returns the total number of blocks.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Returns the offset of this pool's region within the arena.
    #[inline]
    #[must_use]
    pub const fn base_offset(&self) -> usize {
        self.base_offset
    }

    /// Returns the number of free blocks.
    #[inline]
    #[must_use]
    pub const fn free_count(&self) -> u32 {
        self.free_count
    }

    /// Returns the number of allocated blocks.
    #[inline]
    #[must_use]
    pub const fn allocated_count(&self) -> u32 {
        self.capacity.saturating_sub(self.free_count)
    }

    /// Returns the highest number of blocks ever allocated at once.
    #[inline]
    #[must_use]
    pub const fn peak_allocated(&self) -> u32 {
        self.peak_allocated
    }

    /// Returns how many acquires failed because the pool was empty.
    #[inline]
    #[must_use]
    pub const fn exhausted_count(&self) -> u64 {
        self.exhausted_count
    }

    /// Returns the block the next [`acquire`](Self::acquire) will hand out.
    #[inline]
    #[must_use]
    pub const fn free_head(&self) -> Option<u32> {
        if self.free_head == FREE_SENTINEL {
            None
        } else {
            Some(self.free_head)
        }
    }

    /// Returns the size of this pool's region in bytes.
    #[inline]
    #[must_use]
    pub const fn footprint(&self) -> usize {
        self.block_size * self.capacity as usize
    }

    /// Returns the arena byte range owned by this pool.
    #[inline]
    #[must_use]
    pub const fn region_range(&self) -> Range<usize> {
        self.base_offset..self.base_offset + self.footprint()
    }

    /// Returns the current generation of a block.
    #[inline]
    #[must_use]
    pub fn generation(&self, block: u32) -> Option<u32> {
        self.generations.get(block as usize).copied()
    }

    /// Generation of a block known to be in range.
    #[inline]
    pub(crate) fn current_generation(&self, block: u32) -> u32 {
        self.generations[block as usize]
    }

    /// Returns `true` if `block` indexes a block of this pool.
    #[inline]
    #[must_use]
    pub const fn contains(&self, block: u32) -> bool {
        block < self.capacity
    }

    /// Byte range of `block` relative to the pool's region.
    #[inline]
    #[must_use]
    pub const fn block_range(&self, block: u32) -> Range<usize> {
        let start = self.block_size * block as usize;
        start..start + self.block_size
    }

    /// Pops the free head.
    ///
    /// This is a **O(1)** operation. Returns `None` when the pool is
    /// exhausted; pools never grow.
    pub(crate) fn acquire(&mut self, region: &[u8]) -> Option<u32> {
        if self.free_count == 0 {
            self.exhausted_count += 1;
            return None;
        }

        let block = self.free_head;
        self.free_head = self.read_link(region, block);
        self.free_count -= 1;
        self.peak_allocated = self.peak_allocated.max(self.allocated_count());
        Some(block)
    }

    /// Pushes `block` as the new free head.
    ///
    /// This is a **O(1)** operation. The most recently released block is
    /// the next one acquired.
    ///
    /// The caller guarantees `block` is allocated. Releasing a free block
    /// corrupts the chain.
    pub(crate) fn release(&mut self, region: &mut [u8], block: u32) {
        debug_assert!(self.contains(block));

        self.write_link(region, block, self.free_head);
        self.free_head = block;
        self.free_count += 1;
        self.bump_generation(block);
    }

    /// Returns every block to the free chain in ascending order.
    ///
    /// All generations are bumped so no earlier handle stays valid.
    pub(crate) fn reset(&mut self, region: &mut [u8]) {
        for block in 0..self.capacity {
            self.bump_generation(block);
        }
        self.format_free_chain(region, 0);
    }

    /// Marks which blocks are free by walking the chain.
    ///
    /// The walk is bounded by `free_count` links.
    #[must_use]
    pub(crate) fn free_map(&self, region: &[u8]) -> Vec<bool> {
        let mut free = vec![false; self.capacity as usize];
        let mut cursor = self.free_head;
        for _ in 0..self.free_count {
            if !self.contains(cursor) {
                break;
            }
            free[cursor as usize] = true;
            cursor = self.read_link(region, cursor);
        }
        free
    }

    /// Returns `true` if `block` is on the free chain.
    ///
    /// O(free count): the chain is walked from the head.
    #[must_use]
    pub(crate) fn is_free(&self, region: &[u8], block: u32) -> bool {
        let mut cursor = self.free_head;
        for _ in 0..self.free_count {
            if cursor == block {
                return true;
            }
            if !self.contains(cursor) {
                break;
            }
            cursor = self.read_link(region, cursor);
        }
        false
    }

    /// Moves every live block into the low end of the region.
    ///
    /// Live blocks above the live count are copied, lowest first, into the
    /// lowest holes. Each destination takes a generation newer than both
    /// its own and the source's, so handles to the filled hole and to the
    /// vacated slot are both stale afterwards. The free chain is rebuilt in
    /// ascending order above the live blocks. Returns the moves sorted by
    /// `from`.
    ///
    /// Runs in O(capacity) time and allocates a free map plus the move list.
    pub(crate) fn compact(&mut self, region: &mut [u8]) -> Vec<BlockMove> {
        let free = self.free_map(region);
        let live = self.allocated_count();

        let holes = (0..live).filter(|&b| free[b as usize]);
        let movers = (live..self.capacity).filter(|&b| !free[b as usize]);
        let pairs: Vec<(u32, u32)> = movers.zip(holes).collect();

        let mut moves = Vec::with_capacity(pairs.len());
        for (from, to) in pairs {
            let src = self.block_range(from);
            region.copy_within(src, self.block_range(to).start);

            let from_generation = self.generations[from as usize];
            let to_generation = from_generation
                .max(self.generations[to as usize])
                .wrapping_add(1);
            self.generations[to as usize] = to_generation;
            self.bump_generation(from);

            moves.push(BlockMove {
                from,
                to,
                from_generation,
                to_generation,
            });
        }

        self.format_free_chain(region, live);
        moves
    }

    /// Chains blocks `first..capacity` in ascending order.
    fn format_free_chain(&mut self, region: &mut [u8], first: u32) {
        for block in first..self.capacity {
            let next = if block + 1 < self.capacity {
                block + 1
            } else {
                FREE_SENTINEL
            };
            self.write_link(region, block, next);
        }
        self.free_head = if first < self.capacity {
            first
        } else {
            FREE_SENTINEL
        };
        self.free_count = self.capacity - first;
    }

    #[inline]
    fn bump_generation(&mut self, block: u32) {
        let generation = &mut self.generations[block as usize];
        *generation = generation.wrapping_add(1);
    }

    #[inline]
    fn read_link(&self, region: &[u8], block: u32) -> u32 {
        let start = self.block_range(block).start;
        bytemuck::pod_read_unaligned(&region[start..start + LINK_BYTES])
    }

    #[inline]
    fn write_link(&self, region: &mut [u8], block: u32, next: u32) {
        let start = self.block_range(block).start;
        region[start..start + LINK_BYTES].copy_from_slice(bytemuck::bytes_of(&next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_with_region(block_size: usize, count: u32) -> (Pool, Vec<u8>) {
        let class = SizeClass::new(block_size, count);
        let mut region = vec![0u8; block_size * count as usize];
        let pool = Pool::new(class, 0, &mut region);
        (pool, region)
    }

    #[test]
    fn test_pool_acquire_release() {
        let (mut pool, mut region) = pool_with_region(32, 10);

        let b = pool.acquire(&region).unwrap();
        assert_eq!(b, 0);
        assert_eq!(pool.allocated_count(), 1);
        assert_eq!(pool.free_count(), 9);

        pool.release(&mut region, b);
        assert_eq!(pool.allocated_count(), 0);
        assert_eq!(pool.free_head(), Some(0));
    }

    #[test]
    fn test_pool_full() {
        let (mut pool, region) = pool_with_region(16, 2);

        assert!(pool.acquire(&region).is_some());
        assert!(pool.acquire(&region).is_some());
        assert!(pool.acquire(&region).is_none());
        assert_eq!(pool.free_head(), None);
        assert_eq!(pool.exhausted_count(), 1);
        assert_eq!(pool.peak_allocated(), 2);
    }

    #[test]
    fn test_pool_lifo_reuse() {
        let (mut pool, mut region) = pool_with_region(32, 8);

        let b1 = pool.acquire(&region).unwrap();
        let b2 = pool.acquire(&region).unwrap();
        let _b3 = pool.acquire(&region).unwrap();

        pool.release(&mut region, b2);
        pool.release(&mut region, b1);

        assert_eq!(pool.acquire(&region), Some(b1));
        assert_eq!(pool.acquire(&region), Some(b2));
    }

    #[test]
    fn test_release_bumps_generation() {
        let (mut pool, mut region) = pool_with_region(16, 1);

        let b = pool.acquire(&region).unwrap();
        assert_eq!(pool.generation(b), Some(0));
        pool.release(&mut region, b);
        assert_eq!(pool.generation(b), Some(1));
        assert_eq!(pool.generation(1), None);
    }

    #[test]
    fn test_free_map_matches_free_count() {
        let (mut pool, mut region) = pool_with_region(16, 6);
        let blocks: Vec<u32> = (0..6).map(|_| pool.acquire(&region).unwrap()).collect();
        pool.release(&mut region, blocks[1]);
        pool.release(&mut region, blocks[4]);

        let free = pool.free_map(&region);
        assert_eq!(free, vec![false, true, false, false, true, false]);
        assert!(pool.is_free(&region, 4));
        assert!(!pool.is_free(&region, 0));
        assert_eq!(
            free.iter().filter(|&&f| f).count(),
            pool.free_count() as usize
        );
    }

    #[test]
    fn test_compact_moves_live_blocks_down() {
        let (mut pool, mut region) = pool_with_region(16, 6);
        let blocks: Vec<u32> = (0..6).map(|_| pool.acquire(&region).unwrap()).collect();
        for &b in &blocks {
            let range = pool.block_range(b);
            region[range].fill(b as u8 + 1);
        }
        pool.release(&mut region, blocks[0]);
        pool.release(&mut region, blocks[2]);

        let moves = pool.compact(&mut region);
        let pairs: Vec<(u32, u32)> = moves.iter().map(|m| (m.from, m.to)).collect();
        assert_eq!(pairs, vec![(4, 0), (5, 2)]);

        // Holes 0 and 2 were freed once (generation 1); the movers were live
        // at generation 0. Destinations move past both.
        assert_eq!(moves[0].from_generation, 0);
        assert_eq!(moves[0].to_generation, 2);
        assert_eq!(pool.generation(0), Some(2));
        assert_eq!(pool.generation(4), Some(1));

        // Payloads followed their blocks.
        assert!(region[pool.block_range(0)].iter().all(|&b| b == 5));
        assert!(region[pool.block_range(2)].iter().all(|&b| b == 6));
        assert!(region[pool.block_range(1)].iter().all(|&b| b == 2));

        // Free chain now starts right after the live blocks.
        assert_eq!(pool.free_head(), Some(4));
        assert_eq!(pool.free_count(), 2);
        assert_eq!(pool.acquire(&region), Some(4));
        assert_eq!(pool.acquire(&region), Some(5));
        assert_eq!(pool.acquire(&region), None);
    }

    #[test]
    fn test_compact_without_holes_is_noop() {
        let (mut pool, mut region) = pool_with_region(16, 4);
        pool.acquire(&region).unwrap();
        pool.acquire(&region).unwrap();

        assert!(pool.compact(&mut region).is_empty());
        assert_eq!(pool.free_head(), Some(2));
        assert_eq!(pool.free_count(), 2);
    }

    #[test]
    fn test_compact_full_pool() {
        let (mut pool, mut region) = pool_with_region(16, 3);
        for _ in 0..3 {
            pool.acquire(&region).unwrap();
        }
        assert!(pool.compact(&mut region).is_empty());
        assert_eq!(pool.free_head(), None);
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn test_double_release_does_not_underflow_counts() {
        let (mut pool, mut region) = pool_with_region(16, 2);
        let b = pool.acquire(&region).unwrap();
        pool.release(&mut region, b);
        pool.release(&mut region, b);

        assert_eq!(pool.free_count(), 3);
        assert_eq!(pool.allocated_count(), 0);
    }

    #[test]
    fn test_reset() {
        let (mut pool, mut region) = pool_with_region(16, 4);
        let b = pool.acquire(&region).unwrap();
        pool.acquire(&region).unwrap();

        pool.reset(&mut region);
        assert_eq!(pool.free_count(), 4);
        assert_eq!(pool.free_head(), Some(0));
        assert_eq!(pool.generation(b), Some(1));
    }
}
