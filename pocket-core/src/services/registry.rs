//! Per-user ledger handles
//!
//! Ledgers are opened lazily on first access and memoized, one handle per
//! user. Opening one user's ledger never holds up another user. Handles idle longer than a timeout can be closed to release their
//! file locks; the next access reopens them transparently.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::adapters::duckdb::DuckDbLedger;
use crate::domain::result::Result;
use crate::domain::UserId;
use crate::ports::LedgerStore;

/// Opens the ledger for a user that has no live handle
pub type LedgerOpener = Box<dyn Fn(UserId) -> Result<Arc<dyn LedgerStore>> + Send + Sync>;

struct OpenLedger {
    store: Arc<dyn LedgerStore>,
    last_used: Instant,
}

/// One user's entry in the registry. Its lock is held while that user's
/// ledger opens, so a file is opened once without blocking other users.
#[derive(Default)]
struct LedgerSlot {
    ledger: Mutex<Option<OpenLedger>>,
}

pub struct LedgerRegistry {
    opener: LedgerOpener,
    slots: Mutex<HashMap<UserId, Arc<LedgerSlot>>>,
}

impl LedgerRegistry {
    /// Registry backed by `<ledgers_dir>/<user_id>.duckdb` files
    pub fn new(ledgers_dir: &Path) -> Self {
        let dir = ledgers_dir.to_path_buf();
        Self::with_opener(Box::new(move |user| {
            let store: Arc<dyn LedgerStore> =
                Arc::new(DuckDbLedger::open(&ledger_path(&dir, user), user)?);
            Ok(store)
        }))
    }

    /// Registry with a custom opener (in-memory or faulty stores in tests)
    pub fn with_opener(opener: LedgerOpener) -> Self {
        Self {
            opener,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Handle for `user`, opening the ledger on first access
    pub fn ledger(&self, user: UserId) -> Result<Arc<dyn LedgerStore>> {
        let slot = {
            let mut slots = self.slots.lock().unwrap();
            Arc::clone(slots.entry(user).or_default())
        };

        let mut ledger = slot.ledger.lock().unwrap();
        if let Some(open) = ledger.as_mut() {
            open.last_used = Instant::now();
            return Ok(Arc::clone(&open.store));
        }

        // A failed open leaves the slot empty; the next call retries
        let store = (self.opener)(user)?;
        *ledger = Some(OpenLedger {
            store: Arc::clone(&store),
            last_used: Instant::now(),
        });
        Ok(store)
    }

    /// Close handles unused for at least `max_idle`. Handles still borrowed
    /// by an in-flight operation are kept.
    pub fn close_idle(&self, max_idle: Duration) -> usize {
        let mut slots = self.slots.lock().unwrap();
        let mut closed = 0;
        slots.retain(|_, slot| {
            // Someone between the map and the slot lock: leave it alone
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            let ledger = slot.ledger.lock().unwrap();
            let keep = ledger.as_ref().is_some_and(|open| {
                open.last_used.elapsed() < max_idle || Arc::strong_count(&open.store) > 1
            });
            if !keep && ledger.is_some() {
                closed += 1;
            }
            keep
        });
        closed
    }

    /// Drop every handle; later calls reopen on demand
    pub fn shutdown(&self) -> usize {
        let slots = std::mem::take(&mut *self.slots.lock().unwrap());
        count_open(slots.values())
    }

    pub fn open_handles(&self) -> usize {
        let slots: Vec<Arc<LedgerSlot>> = self.slots.lock().unwrap().values().cloned().collect();
        count_open(slots.iter())
    }
}

fn count_open<'a>(slots: impl Iterator<Item = &'a Arc<LedgerSlot>>) -> usize {
    slots
        .filter(|slot| slot.ledger.lock().unwrap().is_some())
        .count()
}

/// Location of a user's ledger file
pub fn ledger_path(ledgers_dir: &Path, user: UserId) -> PathBuf {
    ledgers_dir.join(format!("{}.duckdb", user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn counting_registry() -> (LedgerRegistry, Arc<AtomicUsize>) {
        let opened = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&opened);
        let registry = LedgerRegistry::with_opener(Box::new(move |user| {
            counter.fetch_add(1, Ordering::SeqCst);
            let store: Arc<dyn LedgerStore> = Arc::new(DuckDbLedger::open_in_memory(user)?);
            Ok(store)
        }));
        (registry, opened)
    }

    #[test]
    fn test_ledger_is_memoized_per_user() {
        let (registry, opened) = counting_registry();

        let a1 = registry.ledger(UserId(1)).unwrap();
        let a2 = registry.ledger(UserId(1)).unwrap();
        let b = registry.ledger(UserId(2)).unwrap();

        assert!(Arc::ptr_eq(&a1, &a2));
        assert_eq!(b.user(), UserId(2));
        assert_eq!(opened.load(Ordering::SeqCst), 2);
        assert_eq!(registry.open_handles(), 2);
    }

    #[test]
    fn test_close_idle_skips_borrowed_handles() {
        let (registry, opened) = counting_registry();

        let held = registry.ledger(UserId(1)).unwrap();
        registry.ledger(UserId(2)).unwrap();

        assert_eq!(registry.close_idle(Duration::ZERO), 1);
        assert_eq!(registry.open_handles(), 1);

        drop(held);
        assert_eq!(registry.close_idle(Duration::ZERO), 1);
        assert_eq!(registry.open_handles(), 0);

        registry.ledger(UserId(2)).unwrap();
        assert_eq!(opened.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_close_idle_keeps_recent_handles() {
        let (registry, _) = counting_registry();
        registry.ledger(UserId(1)).unwrap();
        assert_eq!(registry.close_idle(Duration::from_secs(3600)), 0);
        assert_eq!(registry.open_handles(), 1);
    }

    #[test]
    fn test_file_ledgers_survive_shutdown() {
        let dir = tempdir().unwrap();
        let registry = LedgerRegistry::new(dir.path());

        let ledger = registry.ledger(UserId(42)).unwrap();
        ledger
            .append(
                crate::domain::TransactionKind::Income,
                &crate::domain::SealedAmount::new("n", "c", "t"),
                "salary",
            )
            .unwrap();
        drop(ledger);

        assert_eq!(registry.shutdown(), 1);
        assert!(ledger_path(dir.path(), UserId(42)).exists());
        assert_eq!(registry.ledger(UserId(42)).unwrap().count().unwrap(), 1);
    }

    #[test]
    fn test_open_failure_is_not_memoized() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let registry = LedgerRegistry::with_opener(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(crate::domain::result::Error::database("disk full"))
        }));

        assert!(registry.ledger(UserId(1)).is_err());
        assert!(registry.ledger(UserId(1)).is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(registry.open_handles(), 0);
    }

    fn slow_registry(delay: Duration) -> (Arc<LedgerRegistry>, Arc<AtomicUsize>) {
        let opened = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&opened);
        let registry = LedgerRegistry::with_opener(Box::new(move |user| {
            counter.fetch_add(1, Ordering::SeqCst);
            if user == UserId(1) {
                std::thread::sleep(delay);
            }
            let store: Arc<dyn LedgerStore> = Arc::new(DuckDbLedger::open_in_memory(user)?);
            Ok(store)
        }));
        (Arc::new(registry), opened)
    }

    #[test]
    fn test_slow_open_does_not_block_other_users() {
        let (registry, _) = slow_registry(Duration::from_millis(1500));
        registry.ledger(UserId(2)).unwrap();

        let opening = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || registry.ledger(UserId(1)).map(|_| ()))
        };
        std::thread::sleep(Duration::from_millis(100));

        let started = Instant::now();
        registry.ledger(UserId(2)).unwrap();
        registry.ledger(UserId(3)).unwrap();
        assert!(
            started.elapsed() < Duration::from_millis(500),
            "other users waited {:?}",
            started.elapsed()
        );

        opening.join().unwrap().unwrap();
        assert_eq!(registry.open_handles(), 3);
    }

    #[test]
    fn test_concurrent_first_access_opens_once() {
        let (registry, opened) = slow_registry(Duration::from_millis(200));

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.ledger(UserId(1)).unwrap())
            })
            .collect();
        let handles: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();

        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
    }
}
