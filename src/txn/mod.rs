mod lock;

pub use lock::LockManager;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::storage::{BufferPool, StorageResult};

static NEXT_TID: AtomicU64 = AtomicU64::new(0);

/// Monotonically increasing transaction identifier, unique per process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(u64);

impl TransactionId {
    pub fn new() -> Self {
        Self(NEXT_TID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

/// Handle for one unit of work. Locks accumulate while the transaction
/// runs and are only released by `commit` or `abort` (strict 2PL).
pub struct Transaction {
    tid: TransactionId,
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            tid: TransactionId::new(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.tid
    }

    /// Flush this transaction's dirty pages and release its locks
    pub fn commit(&self, pool: &BufferPool) -> StorageResult<()> {
        pool.transaction_complete(self.tid, true);
        Ok(())
    }

    /// Discard this transaction's dirty pages and release its locks
    pub fn abort(&self, pool: &BufferPool) -> StorageResult<()> {
        pool.transaction_complete(self.tid, false);
        Ok(())
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}
