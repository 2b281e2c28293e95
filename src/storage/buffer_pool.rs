use std::sync::{Arc, RwLock};

use lru::LruCache;
use tracing::warn;

use super::error::{StorageError, StorageResult};
use super::heap_page::HeapPage;
use super::{PageId, Permissions, DEFAULT_POOL_CAPACITY};
use crate::catalog::Catalog;
use crate::tuple::Tuple;
use crate::txn::{LockManager, TransactionId};

/// Shared handle to a cached page
pub type PageRef = Arc<RwLock<HeapPage>>;

/// The single in-memory cache of disk pages, and the only path from
/// operators to the file layer.
///
/// Every `get_page` goes through the lock manager first, then the cache
/// (that order avoids inversion with the per-page lock slots). The pool
/// is NO-STEAL: a dirty page never leaves memory before the transaction
/// that dirtied it commits, so eviction can fail when every candidate is
/// dirty or pinned by another writer.
///
/// Lookups never promote cache entries, so the cache's internal order
/// stays insertion order and the eviction scan below is FIFO over the
/// candidate set.
pub struct BufferPool {
    catalog: Arc<Catalog>,
    locks: Arc<LockManager>,
    cache: RwLock<LruCache<PageId, PageRef>>,
    capacity: usize,
}

impl BufferPool {
    pub fn new(catalog: Arc<Catalog>, locks: Arc<LockManager>) -> Self {
        Self::with_capacity(catalog, locks, DEFAULT_POOL_CAPACITY)
    }

    pub fn with_capacity(catalog: Arc<Catalog>, locks: Arc<LockManager>, capacity: usize) -> Self {
        // the cache itself is unbounded: capacity is enforced here because
        // eviction must be able to fail under NO-STEAL instead of silently
        // dropping a dirty page
        assert!(capacity > 0, "buffer pool capacity must be non-zero");
        Self {
            catalog,
            locks,
            cache: RwLock::new(LruCache::unbounded()),
            capacity,
        }
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.locks
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Fetch a page, taking the page lock implied by `perm` first. A lock
    /// wait that times out aborts the transaction.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permissions,
    ) -> StorageResult<PageRef> {
        if !self.locks.lock_page(tid, pid, perm) {
            return Err(StorageError::TransactionAborted(pid));
        }

        {
            let cache = self.cache.read().unwrap();
            if let Some(page) = cache.peek(&pid) {
                return Ok(Arc::clone(page));
            }
        }

        let mut cache = self.cache.write().unwrap();
        // somebody may have loaded it while we waited for the write lock
        if let Some(page) = cache.peek(&pid) {
            return Ok(Arc::clone(page));
        }
        if cache.len() >= self.capacity {
            self.evict_locked(tid, &mut cache)?;
        }
        let file = self.catalog.table_file(pid.table_id)?;
        let page = Arc::new(RwLock::new(file.read_page(pid)?));
        cache.put(pid, Arc::clone(&page));
        Ok(page)
    }

    /// Release `tid`'s lock on one page early. Only safe for pages the
    /// transaction has read but not written (the append scan uses this).
    pub fn release_page(&self, tid: TransactionId, pid: PageId) {
        self.locks.unlock_page(tid, pid);
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.locks.holds_lock(tid, pid)
    }

    /// Insert a tuple into the given table, marking every page the file
    /// touched as dirty and making sure it is cached.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: i32,
        tuple: &Tuple,
    ) -> StorageResult<()> {
        let file = self.catalog.table_file(table_id)?;
        let dirty = file.insert_tuple(self, tid, tuple)?;
        for page in &dirty {
            page.write().unwrap().mark_dirty(true, tid);
        }
        self.admit(tid, &dirty)
    }

    /// Delete the tuple its record id points at, with the same dirty-page
    /// bookkeeping as `insert_tuple`
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> StorageResult<()> {
        let rid = tuple.record_id().ok_or(StorageError::MissingRecordId)?;
        let file = self.catalog.table_file(rid.page_id.table_id)?;
        let dirty = file.delete_tuple(self, tid, tuple)?;
        for page in &dirty {
            page.write().unwrap().mark_dirty(true, tid);
        }
        self.admit(tid, &dirty)
    }

    /// Make sure every page in `pages` is cached, evicting as needed
    fn admit(&self, tid: TransactionId, pages: &[PageRef]) -> StorageResult<()> {
        let mut cache = self.cache.write().unwrap();
        for page in pages {
            let pid = page.read().unwrap().id();
            if cache.peek(&pid).is_some() {
                continue;
            }
            if cache.len() >= self.capacity {
                self.evict_locked(tid, &mut cache)?;
            }
            cache.put(pid, Arc::clone(page));
        }
        Ok(())
    }

    /// Commit or abort `tid`.
    ///
    /// Shared-only locks are released first so blocked readers get going;
    /// then dirty pages are flushed (commit) or dropped from the cache
    /// (abort, so the next fetch rereads the pre-transaction disk image);
    /// finally every remaining lock is released. The whole path runs to
    /// completion even when an individual flush fails.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) {
        for pid in self.locks.pages_locked_by(tid) {
            if !self.locks.is_write_locked(pid) {
                self.locks.unlock_page(tid, pid);
            }
        }

        if commit {
            let dirty = self.dirty_pages_of(tid);
            for (pid, page) in dirty {
                if let Err(err) = self.flush_page_ref(&page) {
                    warn!(%tid, page = %pid, %err, "flush failed during commit");
                }
            }
        } else {
            let stale: Vec<PageId> = {
                let cache = self.cache.read().unwrap();
                cache
                    .iter()
                    .filter(|(_, page)| page.read().unwrap().is_dirty() == Some(tid))
                    .map(|(pid, _)| *pid)
                    .collect()
            };
            let mut cache = self.cache.write().unwrap();
            for pid in stale {
                cache.pop(&pid);
            }
        }

        self.locks.unlock_all_pages(tid);
    }

    /// Write one cached page to disk and clear its dirty mark
    pub fn flush_page(&self, pid: PageId) -> StorageResult<()> {
        let page = {
            let cache = self.cache.read().unwrap();
            cache
                .peek(&pid)
                .cloned()
                .ok_or(StorageError::PageNotCached(pid))?
        };
        self.flush_page_ref(&page)
    }

    /// Flush every dirty page in the cache. Breaks NO-STEAL for pages of
    /// live transactions; intended for orderly shutdown only.
    pub fn flush_all_pages(&self) -> StorageResult<()> {
        let pages: Vec<PageRef> = {
            let cache = self.cache.read().unwrap();
            cache.iter().map(|(_, page)| Arc::clone(page)).collect()
        };
        for page in pages {
            self.flush_page_ref(&page)?;
        }
        Ok(())
    }

    /// Drop a page from the cache without writing it
    pub fn discard_page(&self, pid: PageId) {
        self.cache.write().unwrap().pop(&pid);
    }

    pub fn cached_pages(&self) -> usize {
        self.cache.read().unwrap().len()
    }

    pub fn is_cached(&self, pid: PageId) -> bool {
        self.cache.read().unwrap().peek(&pid).is_some()
    }

    fn dirty_pages_of(&self, tid: TransactionId) -> Vec<(PageId, PageRef)> {
        let cache = self.cache.read().unwrap();
        cache
            .iter()
            .filter(|(_, page)| page.read().unwrap().is_dirty() == Some(tid))
            .map(|(pid, page)| (*pid, Arc::clone(page)))
            .collect()
    }

    fn flush_page_ref(&self, page: &PageRef) -> StorageResult<()> {
        let mut guard = page.write().unwrap();
        let Some(dirtier) = guard.is_dirty() else {
            return Ok(());
        };
        let file = self.catalog.table_file(guard.id().table_id)?;
        file.write_page(&guard)?;
        guard.mark_dirty(false, dirtier);
        guard.set_before_image();
        Ok(())
    }

    /// Pick a victim and drop it, scanning cached pages oldest-first.
    /// A page qualifies when it is clean and either nobody holds it
    /// exclusively or the evicting transaction itself does. With every
    /// page dirty or write-pinned there is nothing safe to drop: NO-STEAL
    /// turns that into a hard error instead of writing uncommitted data.
    fn evict_locked(
        &self,
        tid: TransactionId,
        cache: &mut LruCache<PageId, PageRef>,
    ) -> StorageResult<()> {
        let mut victim = None;
        for (pid, page) in cache.iter().rev() {
            if page.read().unwrap().is_dirty().is_some() {
                continue;
            }
            if !self.locks.is_write_locked(*pid) || self.locks.holds_lock(tid, *pid) {
                victim = Some(*pid);
                break;
            }
        }
        let pid = victim.ok_or(StorageError::NoCleanPageToEvict)?;
        cache.pop(&pid);
        Ok(())
    }
}
