use std::io;
use thiserror::Error;

use super::PageId;
use crate::catalog::CatalogError;
use crate::tuple::{RecordId, TupleError};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Tuple error: {0}")]
    Tuple(#[from] TupleError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Corrupt page {pid}: expected {expected} bytes, got {actual}", pid = .0, expected = .1, actual = .2)]
    CorruptPage(PageId, usize, usize),

    #[error("Read past end of file for page {0}")]
    ShortRead(PageId),

    #[error("Page {0} is full")]
    PageFull(PageId),

    #[error("Slot {0} is already empty")]
    SlotEmpty(RecordId),

    #[error("Record {rid} does not belong to page {page}")]
    NotOnThisPage { rid: RecordId, page: PageId },

    #[error("Tuple has no record id")]
    MissingRecordId,

    #[error("Tuple schema does not match page schema")]
    SchemaMismatch,

    #[error("Page {0} is not in the buffer pool")]
    PageNotCached(PageId),

    #[error("All cached pages are dirty or pinned by writers, cannot evict")]
    NoCleanPageToEvict,

    #[error("Transaction aborted: lock wait timed out on page {0}")]
    TransactionAborted(PageId),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// True when the error is the lock-timeout abort signal, which callers
    /// must translate into a transaction rollback rather than retry.
    pub fn is_aborted(&self) -> bool {
        matches!(self, StorageError::TransactionAborted(_))
    }
}
