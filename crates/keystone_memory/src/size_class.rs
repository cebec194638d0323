//! # Size-Class Table
//!
//! The fixed catalogue of block sizes and counts a manager is built from.
//!
//! ## Layout
//!
//! Pools are laid out back-to-back in ascending size-class order inside one
//! arena, so the address of any block is:
//!
//! ```text
//! arena_base + pool_base_offset(i) + block_size(i) * block_index
//! ```
//!
//! Every block size is a multiple of [`ALIGNMENT`], which keeps every pool
//! base and every block start 16-byte aligned.

use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, MemoryResult};

/// Alignment unit for block sizes and pool bases (SIMD friendly).
pub const ALIGNMENT: usize = 16;

/// Default catalogue: (block size, block count). Already 16-byte aligned.
pub const DEFAULT_SIZE_CLASSES: [(usize, u32); 23] = [
    (16, 65536),
    (32, 4096),
    (48, 4096),
    (64, 2048),
    (80, 2048),
    (96, 2048),
    (112, 2048),
    (128, 2048),
    (256, 2048),
    (512, 2048),
    (1024, 2048),
    (2048, 2048),
    (4096, 512),
    (8192, 512),
    (16384, 1024),
    (32768, 512),
    (65536, 256),
    (131_072, 32),
    (262_144, 16),
    (524_288, 8),
    (1_048_576, 4),
    (2_097_152, 2),
    (4_194_304, 1),
];

/// Rounds `value` up to the next multiple of [`ALIGNMENT`].
///
/// Returns `None` on overflow.
#[inline]
#[must_use]
pub const fn align_up(value: usize) -> Option<usize> {
    match value.checked_add(ALIGNMENT - 1) {
        Some(v) => Some(v & !(ALIGNMENT - 1)),
        None => None,
    }
}

/// One size class: a block size served by exactly one pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SizeClass {
    /// Bytes per block.
    pub block_size: usize,
    /// Number of blocks in the pool.
    pub block_count: u32,
}

impl SizeClass {
    /// Creates a size class.
    #[inline]
    #[must_use]
    pub const fn new(block_size: usize, block_count: u32) -> Self {
        Self {
            block_size,
            block_count,
        }
    }

    /// Bytes this class occupies in the arena, or `None` on overflow.
    #[inline]
    #[must_use]
    pub const fn footprint(self) -> Option<usize> {
        self.block_size.checked_mul(self.block_count as usize)
    }
}

/// Validated, strictly ascending size-class table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SizeClassTable {
    classes: Vec<SizeClass>,
}

impl SizeClassTable {
    /// Validates and wraps a list of size classes.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidConfig`] if the table is empty, not
    /// strictly ascending, contains a block size that is zero or not a
    /// multiple of [`ALIGNMENT`], or a block count that is zero or collides
    /// with the free-list sentinel.
    pub fn new(classes: Vec<SizeClass>) -> MemoryResult<Self> {
        if classes.is_empty() {
            return Err(MemoryError::InvalidConfig(
                "size-class table is empty".to_string(),
            ));
        }
        if classes.len() >= u32::MAX as usize {
            return Err(MemoryError::InvalidConfig(format!(
                "too many size classes: {}",
                classes.len()
            )));
        }

        let mut previous: Option<usize> = None;
        for (i, class) in classes.iter().enumerate() {
            if class.block_size == 0 || class.block_size % ALIGNMENT != 0 {
                return Err(MemoryError::InvalidConfig(format!(
                    "size class {i}: block size {} is not a non-zero multiple of {ALIGNMENT}",
                    class.block_size
                )));
            }
            if class.block_count == 0 || class.block_count == u32::MAX {
                return Err(MemoryError::InvalidConfig(format!(
                    "size class {i}: block count {} out of range",
                    class.block_count
                )));
            }
            if let Some(prev) = previous {
                if class.block_size <= prev {
                    return Err(MemoryError::InvalidConfig(format!(
                        "size class {i}: block size {} does not ascend past {prev}",
                        class.block_size
                    )));
                }
            }
            previous = Some(class.block_size);
        }

        Ok(Self { classes })
    }

    /// Builds a table from `(block_size, block_count)` pairs.
    ///
    /// # Errors
    ///
    /// Same as [`SizeClassTable::new`].
    pub fn from_pairs(pairs: &[(usize, u32)]) -> MemoryResult<Self> {
        Self::new(
            pairs
                .iter()
                .map(|&(size, count)| SizeClass::new(size, count))
                .collect(),
        )
    }

    /// Number of size classes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// A validated table is never empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// The classes in ascending order.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[SizeClass] {
        &self.classes
    }

    /// Largest block size in the table.
    #[inline]
    #[must_use]
    pub fn largest_block_size(&self) -> usize {
        self.classes.last().map_or(0, |c| c.block_size)
    }

    /// Index of the first class whose block size is `>= size`.
    ///
    /// Binary search over the ascending table.
    #[inline]
    #[must_use]
    pub fn route(&self, size: usize) -> Option<usize> {
        let index = self.classes.partition_point(|c| c.block_size < size);
        (index < self.classes.len()).then_some(index)
    }

    /// Total arena bytes needed, each pool rounded up to [`ALIGNMENT`].
    ///
    /// Returns `None` if the total does not fit in `usize`.
    #[must_use]
    pub fn total_bytes(&self) -> Option<usize> {
        self.classes.iter().try_fold(0usize, |total, class| {
            total.checked_add(align_up(class.footprint()?)?)
        })
    }
}

impl Default for SizeClassTable {
    fn default() -> Self {
        Self {
            classes: DEFAULT_SIZE_CLASSES
                .iter()
                .map(|&(size, count)| SizeClass::new(size, count))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_is_valid() {
        let table = SizeClassTable::default();
        assert_eq!(
            SizeClassTable::new(table.as_slice().to_vec()).unwrap(),
            table
        );
        assert_eq!(table.len(), 23);
        assert_eq!(table.largest_block_size(), 4_194_304);
    }

    #[test]
    fn test_route_first_class_at_least_request() {
        let table = SizeClassTable::from_pairs(&[(16, 1), (32, 1), (48, 1), (64, 1)]).unwrap();
        assert_eq!(table.route(0), Some(0));
        assert_eq!(table.route(16), Some(0));
        assert_eq!(table.route(17), Some(1));
        assert_eq!(table.route(50), Some(3));
        assert_eq!(table.route(64), Some(3));
        assert_eq!(table.route(65), None);
    }

    #[test]
    fn test_rejects_unsorted() {
        let result = SizeClassTable::from_pairs(&[(32, 1), (16, 1)]);
        assert!(matches!(result, Err(MemoryError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_duplicate_sizes() {
        let result = SizeClassTable::from_pairs(&[(32, 1), (32, 4)]);
        assert!(matches!(result, Err(MemoryError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_unaligned_and_zero() {
        assert!(SizeClassTable::from_pairs(&[(24, 1)]).is_err());
        assert!(SizeClassTable::from_pairs(&[(0, 1)]).is_err());
        assert!(SizeClassTable::from_pairs(&[(16, 0)]).is_err());
        assert!(SizeClassTable::from_pairs(&[(16, u32::MAX)]).is_err());
        assert!(SizeClassTable::from_pairs(&[]).is_err());
    }

    #[test]
    fn test_total_bytes() {
        let table = SizeClassTable::from_pairs(&[(16, 4), (48, 3)]).unwrap();
        assert_eq!(table.total_bytes(), Some(16 * 4 + 48 * 3));

        let huge = SizeClassTable::from_pairs(&[(usize::MAX - 15, 2)]).unwrap();
        assert_eq!(huge.total_bytes(), None);
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0), Some(0));
        assert_eq!(align_up(1), Some(16));
        assert_eq!(align_up(16), Some(16));
        assert_eq!(align_up(17), Some(32));
        assert_eq!(align_up(usize::MAX), None);
    }
}
