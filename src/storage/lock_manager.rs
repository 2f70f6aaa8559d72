use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex};
use std::time::Duration;
use tracing::{trace, warn};
use crate::storage::transaction::TransactionId;
use crate::types::{DbError, DbResult, PageId, Permission};

/// Lock modes on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl From<Permission> for LockMode {
    fn from(permission: Permission) -> Self {
        match permission {
            Permission::ReadOnly => LockMode::Shared,
            Permission::ReadWrite => LockMode::Exclusive,
        }
    }
}

/// Lock held on one page; an unlocked page has no entry
#[derive(Debug, Clone, PartialEq, Eq)]
enum LockState {
    Shared(HashSet<TransactionId>),
    Exclusive(TransactionId),
}

#[derive(Default)]
struct LockTable {
    locks: HashMap<PageId, LockState>,
    held: HashMap<TransactionId, HashSet<PageId>>, // pages locked per transaction
    wait_for: HashMap<TransactionId, HashSet<TransactionId>>, // waiter -> holders blocking it
}

impl LockTable {

    /// Transactions preventing `txn` from taking `mode` on `page_id`, empty if grantable
    fn blockers(&self, txn: TransactionId, page_id: PageId, mode: LockMode) -> HashSet<TransactionId> {
        match (self.locks.get(&page_id), mode) {
            (None, _) => HashSet::new(),
            (Some(LockState::Shared(_)), LockMode::Shared) => HashSet::new(),
            (Some(LockState::Shared(holders)), LockMode::Exclusive) => {
                holders.iter().copied().filter(|h| *h != txn).collect()
            }
            (Some(LockState::Exclusive(holder)), _) if *holder == txn => HashSet::new(),
            (Some(LockState::Exclusive(holder)), _) => HashSet::from([*holder]),
        }
    }

    fn grant(&mut self, txn: TransactionId, page_id: PageId, mode: LockMode) {
        match mode {
            LockMode::Shared => {
                let state = self.locks.entry(page_id)
                    .or_insert_with(|| LockState::Shared(HashSet::new()));
                // an exclusive holder already covers reads
                if let LockState::Shared(holders) = state {
                    holders.insert(txn);
                }
            }
            LockMode::Exclusive => {
                self.locks.insert(page_id, LockState::Exclusive(txn));
            }
        }
        self.held.entry(txn).or_default().insert(page_id);
    }

    fn release(&mut self, txn: TransactionId, page_id: PageId) {
        let now_unlocked = match self.locks.get_mut(&page_id) {
            Some(LockState::Shared(holders)) => {
                holders.remove(&txn);
                holders.is_empty()
            }
            Some(LockState::Exclusive(holder)) => *holder == txn,
            None => false,
        };
        if now_unlocked {
            self.locks.remove(&page_id);
        }
        if let Some(pages) = self.held.get_mut(&txn) {
            pages.remove(&page_id);
            if pages.is_empty() {
                self.held.remove(&txn);
            }
        }
    }

    /// Check whether the wait-for graph has a cycle passing through `start`
    fn has_cycle(&self, start: TransactionId) -> bool {
        let mut visited = HashSet::new();
        let mut stack: Vec<TransactionId> = self.wait_for.get(&start)
            .map(|holders| holders.iter().copied().collect())
            .unwrap_or_default();

        while let Some(txn) = stack.pop() {
            if txn == start {
                return true;
            }
            if !visited.insert(txn) {
                continue;
            }
            if let Some(holders) = self.wait_for.get(&txn) {
                stack.extend(holders.iter().copied());
            }
        }
        false
    }
}

/// Per-page shared/exclusive locks with wait-for graph deadlock detection.
///
/// A request that conflicts with other holders waits on a condition variable,
/// re-checking at least every poll interval. Before every wait the requester's
/// wait-for edges are refreshed; if they close a cycle the request fails with
/// `DbError::TransactionAborted` instead of waiting.
pub struct LockManager {
    table: Mutex<LockTable>,
    cond_var: Condvar,
    poll_interval: Duration,
}

impl LockManager {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            cond_var: Condvar::new(),
            poll_interval,
        }
    }

    /// Acquire a lock on `page_id`, blocking while an incompatible holder exists.
    /// Shared locks held solely by `txn` are upgraded in place.
    pub fn acquire(&self, txn: TransactionId, page_id: PageId, mode: LockMode) -> DbResult<()> {
        let mut table = self.table.lock()?;
        loop {
            let blockers = table.blockers(txn, page_id, mode);
            if blockers.is_empty() {
                table.wait_for.remove(&txn);
                table.grant(txn, page_id, mode);
                trace!(%txn, page = %page_id, ?mode, "lock granted");
                return Ok(());
            }

            table.wait_for.insert(txn, blockers);
            if table.has_cycle(txn) {
                table.wait_for.remove(&txn);
                warn!(%txn, page = %page_id, ?mode, "deadlock detected, aborting requester");
                return Err(DbError::TransactionAborted(
                    txn.id(),
                    format!("deadlock while waiting for {:?} lock on page {}", mode, page_id),
                ));
            }

            trace!(%txn, page = %page_id, ?mode, "waiting for lock");
            let (guard, _) = self.cond_var.wait_timeout(table, self.poll_interval)?;
            table = guard;
        }
    }

    /// Release the lock `txn` holds on one page
    pub fn release(&self, txn: TransactionId, page_id: PageId) -> DbResult<()> {
        let mut table = self.table.lock()?;
        table.release(txn, page_id);
        self.cond_var.notify_all();
        Ok(())
    }

    /// Release every lock held by `txn` and forget its pending waits
    pub fn release_all(&self, txn: TransactionId) -> DbResult<()> {
        let mut table = self.table.lock()?;
        let pages = table.held.remove(&txn).unwrap_or_default();
        for page_id in pages {
            table.release(txn, page_id);
        }
        table.wait_for.remove(&txn);
        trace!(%txn, "released all locks");
        self.cond_var.notify_all();
        Ok(())
    }

    /// Whether `txn` holds at least `mode` on `page_id`; an exclusive lock implies shared
    pub fn holds_lock(&self, txn: TransactionId, page_id: PageId, mode: LockMode) -> DbResult<bool> {
        let table = self.table.lock()?;
        let holds = match (table.locks.get(&page_id), mode) {
            (Some(LockState::Exclusive(holder)), _) => *holder == txn,
            (Some(LockState::Shared(holders)), LockMode::Shared) => holders.contains(&txn),
            _ => false,
        };
        Ok(holds)
    }

    /// Pages currently locked by `txn`
    pub fn pages_locked_by(&self, txn: TransactionId) -> DbResult<Vec<PageId>> {
        let table = self.table.lock()?;
        Ok(table.held.get(&txn).map(|p| p.iter().copied().collect()).unwrap_or_default())
    }
}

/*
Unit tests
*/
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{mpsc, Arc, Barrier};
    use std::thread;

    fn lock_manager() -> Arc<LockManager> {
        Arc::new(LockManager::new(Duration::from_millis(5)))
    }

    fn page(no: u32) -> PageId {
        PageId::new(1, no)
    }

    #[test]
    fn test_shared_locks_are_compatible() {
        let lm = lock_manager();
        let (t1, t2) = (TransactionId::next(), TransactionId::next());
        lm.acquire(t1, page(0), LockMode::Shared).unwrap();
        lm.acquire(t2, page(0), LockMode::Shared).unwrap();

        assert!(lm.holds_lock(t1, page(0), LockMode::Shared).unwrap());
        assert!(lm.holds_lock(t2, page(0), LockMode::Shared).unwrap());
        assert!(!lm.holds_lock(t1, page(0), LockMode::Exclusive).unwrap());
    }

    #[test]
    fn test_reacquire_is_idempotent() {
        let lm = lock_manager();
        let t1 = TransactionId::next();
        lm.acquire(t1, page(0), LockMode::Exclusive).unwrap();
        lm.acquire(t1, page(0), LockMode::Exclusive).unwrap();
        lm.acquire(t1, page(0), LockMode::Shared).unwrap();
        assert!(lm.holds_lock(t1, page(0), LockMode::Exclusive).unwrap());
        assert_eq!(lm.pages_locked_by(t1).unwrap(), vec![page(0)]);
    }

    #[test]
    fn test_upgrade_sole_shared_holder() {
        let lm = lock_manager();
        let t1 = TransactionId::next();
        lm.acquire(t1, page(0), LockMode::Shared).unwrap();
        lm.acquire(t1, page(0), LockMode::Exclusive).unwrap();
        assert!(lm.holds_lock(t1, page(0), LockMode::Exclusive).unwrap());
    }

    #[test]
    fn test_exclusive_waits_for_shared_holders() {
        let lm = lock_manager();
        let (t1, t2, t3) = (TransactionId::next(), TransactionId::next(), TransactionId::next());
        lm.acquire(t1, page(0), LockMode::Shared).unwrap();
        lm.acquire(t2, page(0), LockMode::Shared).unwrap();

        let (tx, rx) = mpsc::channel();
        let lm_clone = Arc::clone(&lm);
        let handle = thread::spawn(move || {
            let result = lm_clone.acquire(t3, page(0), LockMode::Exclusive);
            tx.send(result.is_ok()).unwrap();
        });

        // still blocked while both shared locks are held
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        lm.release(t1, page(0)).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        lm.release_all(t2).unwrap();

        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
        handle.join().unwrap();
        assert!(lm.holds_lock(t3, page(0), LockMode::Exclusive).unwrap());
    }

    #[test]
    fn test_shared_waits_for_exclusive() {
        let lm = lock_manager();
        let (t1, t2) = (TransactionId::next(), TransactionId::next());
        lm.acquire(t1, page(0), LockMode::Exclusive).unwrap();

        let (tx, rx) = mpsc::channel();
        let lm_clone = Arc::clone(&lm);
        let handle = thread::spawn(move || {
            tx.send(lm_clone.acquire(t2, page(0), LockMode::Shared).is_ok()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        lm.release_all(t1).unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
        handle.join().unwrap();
    }

    #[test]
    fn test_crossed_exclusive_locks_abort_exactly_one() {
        let lm = lock_manager();
        let barrier = Arc::new(Barrier::new(2));
        let (t1, t2) = (TransactionId::next(), TransactionId::next());

        let spawn = |txn: TransactionId, first: PageId, second: PageId| {
            let lm = Arc::clone(&lm);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                lm.acquire(txn, first, LockMode::Exclusive).unwrap();
                barrier.wait();
                let result = lm.acquire(txn, second, LockMode::Exclusive);
                lm.release_all(txn).unwrap();
                result
            })
        };

        let h1 = spawn(t1, page(0), page(1));
        let h2 = spawn(t2, page(1), page(0));
        let results = [h1.join().unwrap(), h2.join().unwrap()];

        let aborted = results.iter()
            .filter(|r| matches!(r, Err(DbError::TransactionAborted(_, _))))
            .count();
        assert_eq!(aborted, 1);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    }

    #[test]
    fn test_competing_upgrades_deadlock() {
        let lm = lock_manager();
        let (t1, t2) = (TransactionId::next(), TransactionId::next());
        lm.acquire(t1, page(0), LockMode::Shared).unwrap();
        lm.acquire(t2, page(0), LockMode::Shared).unwrap();

        let (tx, rx) = mpsc::channel();
        let lm_clone = Arc::clone(&lm);
        let handle = thread::spawn(move || {
            tx.send(lm_clone.acquire(t1, page(0), LockMode::Exclusive).is_ok()).unwrap();
        });

        // wait until t1 is registered as waiting on t2
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        let result = lm.acquire(t2, page(0), LockMode::Exclusive);
        assert!(matches!(result, Err(DbError::TransactionAborted(_, _))));

        lm.release_all(t2).unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
        handle.join().unwrap();
    }

    #[test]
    fn test_release_all_unlocks_pages() {
        let lm = lock_manager();
        let t1 = TransactionId::next();
        lm.acquire(t1, page(0), LockMode::Shared).unwrap();
        lm.acquire(t1, page(1), LockMode::Exclusive).unwrap();
        lm.release_all(t1).unwrap();

        assert!(!lm.holds_lock(t1, page(0), LockMode::Shared).unwrap());
        assert!(!lm.holds_lock(t1, page(1), LockMode::Shared).unwrap());
        assert!(lm.pages_locked_by(t1).unwrap().is_empty());

        let t2 = TransactionId::next();
        lm.acquire(t2, page(1), LockMode::Exclusive).unwrap();
    }
}
