use std::collections::hash_map::DefaultHasher;
use std::fs::{File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::buffer_pool::{BufferPool, PageRef};
use super::error::{StorageError, StorageResult};
use super::heap_page::HeapPage;
use super::{PageId, Permissions, PAGE_SIZE};
use crate::tuple::{Tuple, TupleDesc};
use crate::txn::TransactionId;

/// A table's backing store: a single file of consecutively numbered
/// fixed-size pages, in no particular tuple order.
///
/// All tuple-level access goes through the buffer pool so that locking
/// and the dirty-page lifecycle are honored; the file itself only knows
/// how to read and write whole pages at their offsets.
pub struct HeapFile {
    path: PathBuf,
    file: Mutex<File>,
    desc: TupleDesc,
    id: i32,
}

impl HeapFile {
    /// Open (creating if absent) the heap file at `path`. The table id is
    /// a deterministic hash of the absolute path, stable across restarts.
    pub fn open<P: AsRef<Path>>(path: P, desc: TupleDesc) -> std::io::Result<Arc<Self>> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path.as_ref())?;
        let path = path.as_ref().canonicalize()?;

        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        let id = hasher.finish() as i32;

        Ok(Arc::new(Self {
            path,
            file: Mutex::new(file),
            desc,
            id,
        }))
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }

    /// Number of whole pages in the file (trailing partial bytes ignored)
    pub fn num_pages(&self) -> StorageResult<i32> {
        let file = self.file.lock().unwrap();
        let len = file.metadata()?.len();
        Ok((len / PAGE_SIZE as u64) as i32)
    }

    /// Read one page from disk. Reading past the end of the file is a
    /// `ShortRead` error, not a zero-filled page.
    pub fn read_page(&self, pid: PageId) -> StorageResult<HeapPage> {
        let mut file = self.file.lock().unwrap();
        let offset = pid.page_no as u64 * PAGE_SIZE as u64;
        if offset + PAGE_SIZE as u64 > file.metadata()?.len() {
            return Err(StorageError::ShortRead(pid));
        }
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; PAGE_SIZE];
        file.read_exact(&mut buf)
            .map_err(|_| StorageError::ShortRead(pid))?;
        drop(file);
        HeapPage::new_from_bytes(pid, self.desc.clone(), &buf)
    }

    /// Write one page at its offset, extending the file if needed
    pub fn write_page(&self, page: &HeapPage) -> StorageResult<()> {
        let data = page.page_data();
        let mut file = self.file.lock().unwrap();
        let offset = page.id().page_no as u64 * PAGE_SIZE as u64;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&data)?;
        Ok(())
    }

    /// Insert a tuple into the first page with a free slot, appending a
    /// fresh page when every existing page is full. Returns the pages
    /// dirtied by the operation.
    ///
    /// Each candidate page is probed under a shared lock first; when the
    /// page turns out to be full and the transaction did not already hold
    /// it, that shared lock is released immediately so a long append scan
    /// does not pin every page of the table.
    pub fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> StorageResult<Vec<PageRef>> {
        if tuple.tuple_desc() != &self.desc {
            return Err(StorageError::SchemaMismatch);
        }

        let num_pages = self.num_pages()?;
        for page_no in 0..num_pages {
            let pid = PageId::new(self.id, page_no);
            let already_held = pool.holds_lock(tid, pid);

            let page = pool.get_page(tid, pid, Permissions::ReadOnly)?;
            let has_room = page.read().unwrap().num_unused_slots() > 0;
            if !has_room {
                if !already_held {
                    pool.release_page(tid, pid);
                }
                continue;
            }

            // upgrade to a write lock and re-check: another writer may
            // have taken the last slot while we only held the page shared
            let page = pool.get_page(tid, pid, Permissions::ReadWrite)?;
            let mut guard = page.write().unwrap();
            if guard.num_unused_slots() == 0 {
                continue;
            }
            guard.insert_tuple(tuple)?;
            drop(guard);
            return Ok(vec![page]);
        }

        // every page is full: extend the file with an empty page, then
        // insert through the pool so the new page is locked and cached
        let pid = PageId::new(self.id, num_pages);
        self.write_page(&HeapPage::empty(pid, self.desc.clone()))?;
        debug!(table = self.id, page = pid.page_no, "appended heap page");

        let page = pool.get_page(tid, pid, Permissions::ReadWrite)?;
        page.write().unwrap().insert_tuple(tuple)?;
        Ok(vec![page])
    }

    /// Delete the tuple its record id points at. The page is fetched with
    /// write permission through the pool.
    pub fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> StorageResult<Vec<PageRef>> {
        let rid = tuple.record_id().ok_or(StorageError::MissingRecordId)?;
        let page = pool.get_page(tid, rid.page_id, Permissions::ReadWrite)?;
        page.write().unwrap().delete_tuple(tuple)?;
        Ok(vec![page])
    }

    /// Pull-based iterator over every tuple in the file, page by page in
    /// ascending order. Pages are acquired read-only through the pool.
    pub fn iter(self: &Arc<Self>, pool: Arc<BufferPool>, tid: TransactionId) -> HeapFileIterator {
        HeapFileIterator {
            file: Arc::clone(self),
            pool,
            tid,
            next_page: 0,
            buffered: Vec::new(),
            cursor: 0,
            open: false,
        }
    }
}

/// Iterator state for a heap file scan. Tuples of the current page are
/// buffered so the page's read guard is never held across `next` calls.
pub struct HeapFileIterator {
    file: Arc<HeapFile>,
    pool: Arc<BufferPool>,
    tid: TransactionId,
    next_page: i32,
    buffered: Vec<Tuple>,
    cursor: usize,
    open: bool,
}

impl HeapFileIterator {
    pub fn open(&mut self) {
        self.open = true;
        self.next_page = 0;
        self.buffered.clear();
        self.cursor = 0;
    }

    /// Next tuple, or `None` when the file is exhausted or the iterator
    /// is closed
    pub fn next(&mut self) -> StorageResult<Option<Tuple>> {
        if !self.open {
            return Ok(None);
        }
        loop {
            if self.cursor < self.buffered.len() {
                let tuple = self.buffered[self.cursor].clone();
                self.cursor += 1;
                return Ok(Some(tuple));
            }
            if self.next_page >= self.file.num_pages()? {
                return Ok(None);
            }
            let pid = PageId::new(self.file.id(), self.next_page);
            self.next_page += 1;
            let page = self.pool.get_page(self.tid, pid, Permissions::ReadOnly)?;
            let guard = page.read().unwrap();
            self.buffered = guard.iter().cloned().collect();
            self.cursor = 0;
        }
    }

    pub fn rewind(&mut self) {
        self.next_page = 0;
        self.buffered.clear();
        self.cursor = 0;
    }

    pub fn close(&mut self) {
        self.open = false;
        self.buffered.clear();
        self.cursor = 0;
    }
}
