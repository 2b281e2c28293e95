use std::path::Path;
use std::sync::Arc;

use crate::catalog::{Catalog, CatalogResult};
use crate::storage::{BufferPool, DEFAULT_POOL_CAPACITY};
use crate::txn::LockManager;

/// Owns and wires the three process-wide services: the catalog of
/// tables, the page-level lock manager, and the buffer pool that
/// mediates every page access between the two.
///
/// The pool holds the catalog and the lock manager; the catalog holds
/// the heap files; nothing points back up, so there is no cyclic
/// ownership anywhere in the engine.
pub struct Database {
    catalog: Arc<Catalog>,
    locks: Arc<LockManager>,
    pool: Arc<BufferPool>,
}

impl Database {
    pub fn new() -> Self {
        Self::with_pool_capacity(DEFAULT_POOL_CAPACITY)
    }

    /// Build a database whose buffer pool caches at most `capacity` pages
    pub fn with_pool_capacity(capacity: usize) -> Self {
        let catalog = Arc::new(Catalog::new());
        let locks = Arc::new(LockManager::new());
        let pool = Arc::new(BufferPool::with_capacity(
            Arc::clone(&catalog),
            Arc::clone(&locks),
            capacity,
        ));
        Self {
            catalog,
            locks,
            pool,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.locks
    }

    /// Load a schema file into the catalog; see `Catalog::load_schema`
    pub fn load_schema<P: AsRef<Path>>(&self, path: P) -> CatalogResult<Vec<String>> {
        self.catalog.load_schema(path)
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
