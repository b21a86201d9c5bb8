//! Direct-mapped memo table.
//!
//! Each key hashes to exactly one slot of a prime-sized array. A miss is
//! recomputed by the caller and overwrites whatever occupied the slot; there
//! is no chaining, so lookups and inserts are a single array access.
//!
//! Slots are `Option`s so that stale entries can be dropped one by one after
//! a garbage collection instead of wiping the whole table.

use rayon::prelude::*;

use crate::utils::{prime_gte, MyHash};

/// Hit/miss counters of one cache.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
    /// Inserts that evicted a different key.
    pub overwrites: u64,
}

impl std::ops::AddAssign for CacheCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.hits += rhs.hits;
        self.misses += rhs.misses;
        self.overwrites += rhs.overwrites;
    }
}

/// A direct-mapped cache with a prime number of slots.
pub struct DirectMappedCache<K, V> {
    entries: Vec<Option<(K, V)>>,
    counters: CacheCounters,
}

impl<K, V> DirectMappedCache<K, V> {
    /// Creates a new cache with at least `size` slots.
    pub fn new(size: usize) -> Self {
        let size = prime_gte(size.max(3));
        Self {
            entries: (0..size).map(|_| None).collect(),
            counters: CacheCounters::default(),
        }
    }

    /// Returns the number of slots in the cache.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Returns the number of occupied slots.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|e| e.is_none())
    }

    pub fn counters(&self) -> CacheCounters {
        self.counters
    }
}

impl<K, V> DirectMappedCache<K, V>
where
    K: Send,
    V: Send,
{
    /// Drops every entry.
    pub fn reset(&mut self) {
        self.entries.par_iter_mut().for_each(|e| *e = None);
    }

    /// Drops every entry for which `keep` returns `false`.
    pub fn retain<F>(&mut self, keep: F)
    where
        F: Fn(&K, &V) -> bool + Sync,
    {
        self.entries.par_iter_mut().for_each(|e| {
            if let Some((k, v)) = e {
                if !keep(k, v) {
                    *e = None;
                }
            }
        });
    }
}

impl<K: MyHash, V> DirectMappedCache<K, V> {
    #[inline]
    fn index(&self, key: &K) -> usize {
        (key.hash() % self.entries.len() as u64) as usize
    }
}

impl<K, V> DirectMappedCache<K, V>
where
    K: MyHash + Eq,
{
    /// Looks up a key in the cache.
    #[inline]
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let idx = self.index(key);
        match &self.entries[idx] {
            Some((k, v)) if k == key => {
                self.counters.hits += 1;
                Some(v)
            }
            _ => {
                self.counters.misses += 1;
                None
            }
        }
    }

    /// Inserts a key-value pair, overwriting any existing entry at the same slot.
    #[inline]
    pub fn insert(&mut self, key: K, value: V) {
        let idx = self.index(&key);
        if matches!(&self.entries[idx], Some((k, _)) if k != &key) {
            self.counters.overwrites += 1;
        }
        self.entries[idx] = Some((key, value));
    }
}

impl<K, V> DirectMappedCache<K, V>
where
    K: MyHash + Send + Sync,
    V: Send + Sync,
{
    /// Reallocates to at least `size` slots and rehomes surviving entries.
    ///
    /// When two entries collide in the new table the later one wins.
    pub fn resize(&mut self, size: usize) {
        let size = prime_gte(size.max(3));
        if size == self.entries.len() {
            return;
        }
        let old = std::mem::take(&mut self.entries);
        let homes: Vec<usize> = old
            .par_iter()
            .map(|e| match e {
                Some((k, _)) => (k.hash() % size as u64) as usize,
                None => usize::MAX,
            })
            .collect();

        self.entries = (0..size).map(|_| None).collect();
        for (entry, home) in old.into_iter().zip(homes) {
            if entry.is_some() {
                self.entries[home] = entry;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get() {
        let mut cache = DirectMappedCache::<(u64, u64), i32>::new(16);

        cache.insert((1, 2), 42);
        cache.insert((3, 4), 99);

        assert_eq!(cache.get(&(1, 2)), Some(&42));
        assert_eq!(cache.get(&(3, 4)), Some(&99));
        assert_eq!(cache.get(&(5, 6)), None);
        assert_eq!(cache.capacity(), 17);
    }

    #[test]
    fn test_overwrite_counts_evictions() {
        let mut cache = DirectMappedCache::<(u64, u64), i32>::new(3);
        for i in 0..12 {
            cache.insert((i, 0), i as i32);
        }
        assert!(cache.len() <= 3);
        assert!(cache.counters().overwrites >= 9);
    }

    #[test]
    fn test_reset_and_retain() {
        let mut cache = DirectMappedCache::<(u64, u64), i32>::new(101);
        for i in 0..10 {
            cache.insert((i, i), i as i32);
        }
        let before = cache.len();
        cache.retain(|_, v| v % 2 == 0);
        assert_eq!(cache.get(&(3, 3)), None);
        assert!(cache.len() < before);

        cache.reset();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_resize_rehomes() {
        let mut cache = DirectMappedCache::<(u64, u64), i32>::new(7);
        cache.insert((1, 2), 42);
        cache.resize(1000);
        assert_eq!(cache.capacity(), 1009);
        assert_eq!(cache.get(&(1, 2)), Some(&42));
    }

    #[test]
    fn test_statistics() {
        let mut cache = DirectMappedCache::<(u64, u64), i32>::new(16);

        cache.get(&(1, 2)); // Miss
        assert_eq!(cache.counters().misses, 1);
        assert_eq!(cache.counters().hits, 0);

        cache.insert((1, 2), 42);
        cache.get(&(1, 2)); // Hit
        assert_eq!(cache.counters().hits, 1);
    }
}
