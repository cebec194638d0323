//! # Shared Memory Manager
//!
//! Integration-layer locking for callers that must allocate from more than
//! one thread.
//!
//! The core [`MemoryManager`] assumes exclusive access. This wrapper puts
//! one `parking_lot::Mutex` around it. Block access is closure-scoped so a
//! resolved slice can never outlive the lock that protects it.
//!
//! Prefer one manager per thread when heaps can be disjoint; use this only
//! when threads must share size classes.

use std::sync::Arc;

use bytemuck::Pod;
use parking_lot::Mutex;

use crate::error::MemoryResult;
use crate::handle::Handle;
use crate::manager::MemoryManager;
use crate::remap::Remap;
use crate::stats::ManagerStats;

/// A [`MemoryManager`] behind a mutex, cheaply cloneable across threads.
#[derive(Clone, Debug)]
pub struct SharedMemoryManager {
    inner: Arc<Mutex<MemoryManager>>,
}

impl SharedMemoryManager {
    /// Wraps a manager for shared use.
    #[must_use]
    pub fn new(manager: MemoryManager) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manager)),
        }
    }

    /// See [`MemoryManager::allocate`].
    ///
    /// # Errors
    ///
    /// Same as [`MemoryManager::allocate`].
    pub fn allocate(&self, size: usize) -> MemoryResult<Handle> {
        self.inner.lock().allocate(size)
    }

    /// See [`MemoryManager::allocate_value`].
    ///
    /// # Errors
    ///
    /// Same as [`MemoryManager::allocate_value`].
    pub fn allocate_value<T: Pod>(&self, value: &T) -> MemoryResult<Handle> {
        self.inner.lock().allocate_value(value)
    }

    /// See [`MemoryManager::free`].
    ///
    /// # Errors
    ///
    /// Same as [`MemoryManager::free`].
    pub fn free(&self, handle: Handle) -> MemoryResult<()> {
        self.inner.lock().free(handle)
    }

    /// Runs `f` on the block while holding the lock.
    ///
    /// # Errors
    ///
    /// Same as [`MemoryManager::block`].
    pub fn with_block<R>(&self, handle: Handle, f: impl FnOnce(&[u8]) -> R) -> MemoryResult<R> {
        let guard = self.inner.lock();
        guard.block(handle).map(f)
    }

    /// Runs `f` on the mutable block while holding the lock.
    ///
    /// # Errors
    ///
    /// Same as [`MemoryManager::block_mut`].
    pub fn with_block_mut<R>(
        &self,
        handle: Handle,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> MemoryResult<R> {
        let mut guard = self.inner.lock();
        guard.block_mut(handle).map(f)
    }

    /// See [`MemoryManager::read`].
    ///
    /// # Errors
    ///
    /// Same as [`MemoryManager::read`].
    pub fn read<T: Pod>(&self, handle: Handle) -> MemoryResult<T> {
        self.inner.lock().read(handle)
    }

    /// See [`MemoryManager::write`].
    ///
    /// # Errors
    ///
    /// Same as [`MemoryManager::write`].
    pub fn write<T: Pod>(&self, handle: Handle, value: &T) -> MemoryResult<()> {
        self.inner.lock().write(handle, value)
    }

    /// See [`MemoryManager::defragment`].
    ///
    /// # Errors
    ///
    /// Same as [`MemoryManager::defragment`].
    pub fn defragment(&self, pool_index: u32) -> MemoryResult<Remap> {
        self.inner.lock().defragment(pool_index)
    }

    /// See [`MemoryManager::stats`].
    #[must_use]
    pub fn stats(&self) -> ManagerStats {
        self.inner.lock().stats()
    }

    /// Runs `f` with exclusive access to the whole manager.
    pub fn with_manager<R>(&self, f: impl FnOnce(&mut MemoryManager) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut *guard)
    }
}
