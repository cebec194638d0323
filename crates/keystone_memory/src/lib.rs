//! # KEYSTONE Memory
//!
//! Fixed-region, size-classed, handle-indirected allocator designed for:
//! - One arena reserved at startup, never grown
//! - O(1) allocate and free in the frame loop
//! - Compaction between frames without invalidating handles
//!
//! ## Architecture Rules
//!
//! 1. **No heap allocations in hot path** - The arena and every pool are
//!    carved once at construction
//! 2. **Handles, not pointers** - Callers hold `(pool, block)` pairs and
//!    resolve them to bounded slices on demand
//! 3. **No silent fallback** - An exhausted size class fails; capacity is
//!    planned per class
//!
//! ## Layout
//!
//! ```text
//! arena ┌────────────┬──────────────┬─────────┬──────────────────┐
//!       │ 16 B × N0  │  32 B × N1   │   ...   │ 4 MiB × N22      │
//!       └────────────┴──────────────┴─────────┴──────────────────┘
//!        pool 0        pool 1                   pool 22
//! ```
//!
//! ## Example
//!
//! ```rust
//! use keystone_memory::{MemoryConfig, MemoryManager};
//!
//! let mut memory = MemoryManager::new(&MemoryConfig::from_pairs(&[(16, 8), (32, 8)]))?;
//!
//! let a = memory.allocate_value(&[1.0f32, 2.0, 3.0, 4.0])?;
//! let b = memory.allocate_value(&7u64)?;
//! memory.free(a)?;
//!
//! // Between frames: pack live blocks and rewrite held handles.
//! let remap = memory.defragment(0)?;
//! let b = remap.translate(b);
//! assert_eq!(memory.read::<u64>(b)?, 7);
//! # Ok::<(), keystone_memory::MemoryError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod arena;
pub mod config;
pub mod error;
pub mod handle;
pub mod manager;
pub mod pool;
pub mod remap;
pub mod shared;
pub mod size_class;
pub mod stats;

pub use arena::Arena;
pub use config::MemoryConfig;
pub use error::{MemoryError, MemoryResult};
pub use handle::Handle;
pub use manager::MemoryManager;
pub use pool::Pool;
pub use remap::{BlockMove, Remap};
pub use shared::SharedMemoryManager;
pub use size_class::{SizeClass, SizeClassTable, ALIGNMENT, DEFAULT_SIZE_CLASSES};
pub use stats::{ManagerStats, PoolStats};
