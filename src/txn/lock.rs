use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::warn;

use super::TransactionId;
use crate::storage::{PageId, Permissions};

/// Base lock-wait timeout in milliseconds
const TIMEOUT_BASE_MS: u64 = 100;

/// Upper bound on the random jitter added to each wait, in milliseconds.
/// Symmetric waiters must not time out in lockstep, or both sides of a
/// deadlock abort.
const TIMEOUT_JITTER_MS: u64 = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    Free,
    Shared,
    Exclusive,
}

struct LockState {
    mode: LockMode,
    holders: HashSet<TransactionId>,
}

/// One page's lock slot: mutex-guarded state plus a condition variable
/// waiters park on until a release broadcasts.
struct PageLock {
    state: Mutex<LockState>,
    cond: Condvar,
}

impl PageLock {
    fn new() -> Self {
        Self {
            state: Mutex::new(LockState {
                mode: LockMode::Free,
                holders: HashSet::new(),
            }),
            cond: Condvar::new(),
        }
    }

    /// Try to take the shared lock, waiting up to `timeout`. Re-entrant:
    /// a transaction already holding this page in either mode succeeds
    /// immediately.
    fn acquire_shared(&self, tid: TransactionId, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap();
        loop {
            match state.mode {
                LockMode::Free => {
                    state.mode = LockMode::Shared;
                    state.holders.insert(tid);
                    return true;
                }
                LockMode::Shared => {
                    state.holders.insert(tid);
                    return true;
                }
                LockMode::Exclusive => {
                    if state.holders.contains(&tid) {
                        return true;
                    }
                }
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (next, _) = self.cond.wait_timeout(state, deadline - now).unwrap();
            state = next;
        }
    }

    /// Try to take the exclusive lock, waiting up to `timeout`. A sole
    /// shared holder upgrades in place.
    fn acquire_exclusive(&self, tid: TransactionId, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap();
        loop {
            match state.mode {
                LockMode::Free => {
                    state.mode = LockMode::Exclusive;
                    state.holders.insert(tid);
                    return true;
                }
                LockMode::Exclusive => {
                    if state.holders.contains(&tid) {
                        return true;
                    }
                }
                LockMode::Shared => {
                    if state.holders.len() == 1 && state.holders.contains(&tid) {
                        state.mode = LockMode::Exclusive;
                        return true;
                    }
                }
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (next, _) = self.cond.wait_timeout(state, deadline - now).unwrap();
            state = next;
        }
    }

    /// Remove `tid` from the holder set, returning whether it actually
    /// held the lock. The last holder out frees the slot and wakes all
    /// waiters.
    fn release(&self, tid: TransactionId) -> bool {
        let mut state = self.state.lock().unwrap();
        let held = state.holders.remove(&tid);
        if state.holders.is_empty() {
            state.mode = LockMode::Free;
        }
        drop(state);
        self.cond.notify_all();
        held
    }

    fn is_exclusive(&self) -> bool {
        self.state.lock().unwrap().mode == LockMode::Exclusive
    }

    fn holders(&self) -> Vec<TransactionId> {
        self.state.lock().unwrap().holders.iter().copied().collect()
    }
}

/// Strict two-phase page-level lock manager.
///
/// Deadlock handling is timeout-based: a waiter that exceeds its (jittered)
/// timeout gets `false` back, which the buffer pool turns into a
/// transaction abort. No waits-for graph is maintained.
pub struct LockManager {
    table: Mutex<HashMap<PageId, Arc<PageLock>>>,
    txn_pages: Mutex<HashMap<TransactionId, HashSet<PageId>>>,
    timeout_base: Duration,
    timeout_jitter: Duration,
}

impl LockManager {
    pub fn new() -> Self {
        Self::with_timeout(
            Duration::from_millis(TIMEOUT_BASE_MS),
            Duration::from_millis(TIMEOUT_JITTER_MS),
        )
    }

    /// Construct with an explicit wait window (`base` plus up to `jitter`
    /// of per-acquisition randomization)
    pub fn with_timeout(base: Duration, jitter: Duration) -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
            txn_pages: Mutex::new(HashMap::new()),
            timeout_base: base,
            timeout_jitter: jitter,
        }
    }

    fn page_lock(&self, pid: PageId) -> Arc<PageLock> {
        let mut table = self.table.lock().unwrap();
        table
            .entry(pid)
            .or_insert_with(|| Arc::new(PageLock::new()))
            .clone()
    }

    fn wait_window(&self) -> Duration {
        let jitter_ms = self.timeout_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.timeout_base;
        }
        self.timeout_base + Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
    }

    /// Acquire a lock on `pid` for `tid` in the mode implied by `perm`.
    /// Returns false when the wait timed out; the caller must abort.
    pub fn lock_page(&self, tid: TransactionId, pid: PageId, perm: Permissions) -> bool {
        let lock = self.page_lock(pid);
        let window = self.wait_window();
        let granted = match perm {
            Permissions::ReadOnly => lock.acquire_shared(tid, window),
            Permissions::ReadWrite => lock.acquire_exclusive(tid, window),
        };
        if granted {
            self.txn_pages
                .lock()
                .unwrap()
                .entry(tid)
                .or_default()
                .insert(pid);
        } else {
            warn!(%tid, page = %pid, "lock wait timed out");
        }
        granted
    }

    /// Release `tid`'s lock on `pid`. Releasing a lock the transaction
    /// does not hold is logged and otherwise ignored.
    pub fn unlock_page(&self, tid: TransactionId, pid: PageId) {
        let lock = {
            let table = self.table.lock().unwrap();
            table.get(&pid).cloned()
        };
        let held = match lock {
            Some(lock) => lock.release(tid),
            None => false,
        };
        if !held {
            warn!(%tid, page = %pid, "released a lock that was not held");
        }
        if let Some(pages) = self.txn_pages.lock().unwrap().get_mut(&tid) {
            pages.remove(&pid);
        }
    }

    /// Does `tid` hold a lock (either mode) on `pid`?
    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.txn_pages
            .lock()
            .unwrap()
            .get(&tid)
            .is_some_and(|pages| pages.contains(&pid))
    }

    /// Is `pid` currently locked in exclusive mode?
    pub fn is_write_locked(&self, pid: PageId) -> bool {
        let table = self.table.lock().unwrap();
        table.get(&pid).is_some_and(|lock| lock.is_exclusive())
    }

    /// Pages `tid` currently holds locks on
    pub fn pages_locked_by(&self, tid: TransactionId) -> Vec<PageId> {
        self.txn_pages
            .lock()
            .unwrap()
            .get(&tid)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Current holders of `pid`'s lock
    pub fn holders(&self, pid: PageId) -> Vec<TransactionId> {
        let table = self.table.lock().unwrap();
        table
            .get(&pid)
            .map(|lock| lock.holders())
            .unwrap_or_default()
    }

    /// Release every lock held by `tid`
    pub fn unlock_all_pages(&self, tid: TransactionId) {
        let pages = {
            let mut txn_pages = self.txn_pages.lock().unwrap();
            txn_pages.remove(&tid).unwrap_or_default()
        };
        let table = self.table.lock().unwrap();
        for pid in pages {
            if let Some(lock) = table.get(&pid) {
                lock.release(tid);
            }
        }
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}
