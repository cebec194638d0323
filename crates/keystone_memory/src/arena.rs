//! # Arena
//!
//! The single contiguous reservation every pool is carved from.
//!
//! The backing store is a vector of 16-byte aligned chunks viewed as bytes
//! through `bytemuck`, so the arena base is SIMD aligned without any unsafe
//! pointer work.

use bytemuck::{Pod, Zeroable};

use crate::error::{MemoryError, MemoryResult};
use crate::size_class::{align_up, ALIGNMENT};

/// One alignment unit of arena storage.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C, align(16))]
struct Chunk([u8; ALIGNMENT]);

/// A fixed, zero-initialised, 16-byte aligned byte region.
///
/// Reserved once; never grows or shrinks. Dropping the arena releases the
/// whole reservation.
///
/// # Thread Safety
///
/// The arena is plain owned data. Mutation requires `&mut`.
pub struct Arena {
    storage: Box<[Chunk]>,
}

impl Arena {
    /// Reserves `size` bytes (rounded up to the alignment unit).
    ///
    /// This is a one-shot reservation: failure is reported, not retried.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfMemory`] if the size overflows or the
    /// platform cannot satisfy the reservation.
    pub fn reserve(size: usize) -> MemoryResult<Self> {
        let oom = MemoryError::OutOfMemory {
            requested_bytes: size,
        };
        let chunks = align_up(size).ok_or_else(|| oom.clone())? / ALIGNMENT;

        let mut storage: Vec<Chunk> = Vec::new();
        storage.try_reserve_exact(chunks).map_err(|_| oom)?;
        storage.resize(chunks, Chunk::zeroed());

        Ok(Self {
            storage: storage.into_boxed_slice(),
        })
    }

    /// Returns the total size in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.len() * ALIGNMENT
    }

    /// Returns `true` if the arena holds no bytes.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// The whole arena as bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.storage)
    }

    /// The whole arena as mutable bytes.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.storage)
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_reserve() {
        let arena = Arena::reserve(1024).unwrap();
        assert_eq!(arena.len(), 1024);
        assert!(arena.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_arena_rounds_up() {
        let arena = Arena::reserve(17).unwrap();
        assert_eq!(arena.len(), 32);
    }

    #[test]
    fn test_arena_base_is_aligned() {
        let arena = Arena::reserve(64).unwrap();
        assert_eq!(arena.as_bytes().as_ptr() as usize % ALIGNMENT, 0);
    }

    #[test]
    fn test_arena_oom() {
        let result = Arena::reserve(usize::MAX);
        assert_eq!(
            result.unwrap_err(),
            MemoryError::OutOfMemory {
                requested_bytes: usize::MAX
            }
        );
    }

    #[test]
    fn test_arena_write() {
        let mut arena = Arena::reserve(32).unwrap();
        arena.as_bytes_mut()[31] = 0xAB;
        assert_eq!(arena.as_bytes()[31], 0xAB);
    }
}
