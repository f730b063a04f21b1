//! Bounded memoization of decrypted amounts and balances
//!
//! Both caches use FIFO eviction: when a cache is full, inserting a new key
//! evicts the entry that was inserted first. Overwriting an existing key keeps
//! its original position. A capacity of zero disables the cache.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Mutex;

use rust_decimal::Decimal;

use crate::domain::{BalanceSnapshot, SealedAmount, UserId};

pub const DEFAULT_CAPACITY: usize = 1000;

/// Fixed-capacity map evicting the oldest-inserted entry
#[derive(Debug)]
pub struct FifoCache<K, V> {
    capacity: usize,
    entries: HashMap<K, V>,
    order: VecDeque<K>,
}

impl<K: Eq + Hash + Clone, V: Clone> FifoCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            order: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert a value, returning the evicted key if the cache was full
    pub fn insert(&mut self, key: K, value: V) -> Option<K> {
        if self.capacity == 0 {
            return None;
        }
        if let Some(existing) = self.entries.get_mut(&key) {
            *existing = value;
            return None;
        }

        let mut evicted = None;
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                evicted = Some(oldest);
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, value);
        evicted
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let value = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        Some(value)
    }

    /// Drop every entry whose key matches `predicate`
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&K) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|k, _| !predicate(k));
        let entries = &self.entries;
        self.order.retain(|k| entries.contains_key(k));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

/// Cache key for a decrypted amount
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecryptionKey {
    pub user: UserId,
    pub sealed: SealedAmount,
}

/// Plaintext amounts keyed by (user, nonce, ciphertext, tag)
///
/// Entries never go stale: a ciphertext always decrypts to the same amount.
#[derive(Debug)]
pub struct DecryptionCache {
    inner: Mutex<FifoCache<DecryptionKey, Decimal>>,
}

impl DecryptionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(FifoCache::new(capacity)),
        }
    }

    pub fn get(&self, user: UserId, sealed: &SealedAmount) -> Option<Decimal> {
        let key = DecryptionKey {
            user,
            sealed: sealed.clone(),
        };
        self.inner.lock().unwrap().get(&key)
    }

    pub fn insert(&self, user: UserId, sealed: SealedAmount, amount: Decimal) {
        self.inner
            .lock()
            .unwrap()
            .insert(DecryptionKey { user, sealed }, amount);
    }

    /// Free the entries of a user whose ledger was cleared
    pub fn purge_user(&self, user: UserId) -> usize {
        self.inner.lock().unwrap().remove_where(|k| k.user == user)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Balance snapshots per user, invalidated on every append or clear
#[derive(Debug)]
pub struct BalanceCache {
    inner: Mutex<FifoCache<UserId, BalanceSnapshot>>,
}

impl BalanceCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(FifoCache::new(capacity)),
        }
    }

    pub fn get(&self, user: UserId) -> Option<BalanceSnapshot> {
        self.inner.lock().unwrap().get(&user)
    }

    pub fn insert(&self, user: UserId, snapshot: BalanceSnapshot) {
        self.inner.lock().unwrap().insert(user, snapshot);
    }

    pub fn invalidate(&self, user: UserId) {
        self.inner.lock().unwrap().remove(&user);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The two caches, owned together and shared by the ledger service
#[derive(Debug)]
pub struct Caches {
    pub decryption: DecryptionCache,
    pub balance: BalanceCache,
}

impl Caches {
    pub fn new(capacity: usize) -> Self {
        Self {
            decryption: DecryptionCache::new(capacity),
            balance: BalanceCache::new(capacity),
        }
    }

    /// Caches that never hold anything; results must be identical either way
    pub fn disabled() -> Self {
        Self::new(0)
    }

    /// Forget everything derived from a user's ledger
    pub fn invalidate_user(&self, user: UserId) {
        self.balance.invalidate(user);
        self.decryption.purge_user(user);
    }
}

impl Default for Caches {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_evicts_oldest_inserted() {
        let mut cache = FifoCache::new(3);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);

        // Reading "a" does not refresh it: this is FIFO, not LRU
        assert_eq!(cache.get(&"a"), Some(1));

        assert_eq!(cache.insert("d", 4), Some("a"));
        assert!(!cache.contains(&"a"));
        assert_eq!(cache.insert("e", 5), Some("b"));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&"c"), Some(3));
        assert_eq!(cache.get(&"e"), Some(5));
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut cache = FifoCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.insert("a", 10), None);
        assert_eq!(cache.get(&"a"), Some(10));

        // "a" is still the oldest insertion
        assert_eq!(cache.insert("c", 3), Some("a"));
    }

    #[test]
    fn test_removed_key_does_not_block_eviction_order() {
        let mut cache = FifoCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.remove(&"a");
        cache.insert("c", 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.insert("d", 4), Some("b"));
    }

    #[test]
    fn test_zero_capacity_disables_cache() {
        let mut cache = FifoCache::new(0);
        assert_eq!(cache.insert("a", 1), None);
        assert!(cache.is_empty());
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn test_remove_where() {
        let mut cache = FifoCache::new(10);
        for i in 0..6 {
            cache.insert(i, i * 10);
        }
        assert_eq!(cache.remove_where(|k| k % 2 == 0), 3);
        assert_eq!(cache.len(), 3);
        assert!(cache.contains(&1));
        assert!(!cache.contains(&2));
    }

    #[test]
    fn test_invalidate_user_only_touches_that_user() {
        let caches = Caches::new(10);
        let sealed = SealedAmount::new("n", "c", "t");
        caches.decryption.insert(UserId(1), sealed.clone(), Decimal::ONE);
        caches.decryption.insert(UserId(2), sealed.clone(), Decimal::new(2, 0));
        caches.balance.insert(UserId(1), BalanceSnapshot::zero());
        caches.balance.insert(UserId(2), BalanceSnapshot::zero());

        caches.invalidate_user(UserId(1));

        assert!(caches.balance.get(UserId(1)).is_none());
        assert!(caches.balance.get(UserId(2)).is_some());
        assert!(caches.decryption.get(UserId(1), &sealed).is_none());
        assert_eq!(caches.decryption.get(UserId(2), &sealed), Some(Decimal::new(2, 0)));
    }
}
