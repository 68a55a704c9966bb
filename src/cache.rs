use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// A cached value plus its access metadata.
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub data: V,
    pub size_bytes: usize,
    pub access_count: u64,
    pub last_accessed_ms: u64,
    pub created_at_ms: u64,
    pub expires_at_ms: Option<u64>,
    /// Insertion sequence; breaks `last_accessed_ms` ties during eviction so
    /// the sort snapshot is stable.
    seq: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms.is_some_and(|at| now_ms > at)
    }
}

/// A size-bounded, key-addressed store with LRU eviction and optional expiry.
///
/// Every successful read bumps the entry's access metadata. After every
/// insert an enforcement pass keeps total bytes under the configured maximum
/// by evicting the least-recently-accessed 20 % of entries (by count, at
/// least one) until the bound holds again. The governor additionally calls
/// [`CacheStore::evict_fraction`] with 30 % under memory pressure.
#[derive(Debug)]
pub struct CacheStore<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    max_bytes: usize,
    total_bytes: usize,
    next_seq: u64,
    hits: u64,
    misses: u64,
}

impl<K: Hash + Eq + Clone, V> CacheStore<K, V> {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_bytes,
            total_bytes: 0,
            next_seq: 0,
            hits: 0,
            misses: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Updates the byte bound and re-enforces it immediately.
    pub fn set_max_bytes(&mut self, max_bytes: usize) {
        self.max_bytes = max_bytes;
        self.enforce_bound();
    }

    /// Hits over total lookups so far; `0.0` before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }

    /// Inserts (or replaces) an entry, then enforces the byte bound.
    pub fn set(&mut self, key: K, data: V, size_bytes: usize, now_ms: u64, ttl_ms: Option<u64>) {
        if let Some(old) = self.entries.remove(&key) {
            self.total_bytes -= old.size_bytes;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.total_bytes += size_bytes;
        self.entries.insert(
            key,
            CacheEntry {
                data,
                size_bytes,
                access_count: 0,
                last_accessed_ms: now_ms,
                created_at_ms: now_ms,
                expires_at_ms: ttl_ms.map(|ttl| now_ms.saturating_add(ttl)),
                seq,
            },
        );
        self.enforce_bound();
    }

    /// Reads an entry, refreshing its access metadata.
    ///
    /// An expired entry is deleted and reported as a miss.
    pub fn get<Q>(&mut self, key: &Q, now_ms: u64) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let expired = match self.entries.get(key) {
            None => {
                self.misses += 1;
                return None;
            }
            Some(entry) => entry.is_expired(now_ms),
        };
        if expired {
            self.remove(key);
            self.misses += 1;
            return None;
        }
        self.hits += 1;
        let entry = self.entries.get_mut(key)?;
        entry.access_count += 1;
        entry.last_accessed_ms = now_ms;
        Some(&entry.data)
    }

    /// Reads entry metadata without counting a hit or refreshing access.
    pub fn peek<Q>(&self, key: &Q) -> Option<&CacheEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entry = self.entries.remove(key)?;
        self.total_bytes -= entry.size_bytes;
        Some(entry.data)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_bytes = 0;
    }

    /// Removes every expired entry. Returns how many were purged.
    pub fn purge_expired(&mut self, now_ms: u64) -> usize {
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now_ms))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    /// Evicts the least-recently-accessed `fraction` of entries (by count,
    /// at least one when non-empty). Returns how many were evicted.
    ///
    /// Ties on `last_accessed_ms` are broken by insertion order, so an entry
    /// accessed more recently than its peers in the sort snapshot is never
    /// the one removed.
    pub fn evict_fraction(&mut self, fraction: f64) -> usize {
        if self.entries.is_empty() {
            return 0;
        }
        let count = ((self.entries.len() as f64 * fraction).floor() as usize).max(1);

        let mut snapshot: Vec<(K, u64, u64)> = self
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), e.last_accessed_ms, e.seq))
            .collect();
        snapshot.sort_by_key(|&(_, accessed, seq)| (accessed, seq));

        let mut evicted = 0;
        for (key, _, _) in snapshot.into_iter().take(count) {
            self.remove(&key);
            evicted += 1;
        }
        cdebug!(evicted, remaining = self.entries.len(), "cache eviction");
        evicted
    }

    fn enforce_bound(&mut self) {
        while self.total_bytes > self.max_bytes && !self.entries.is_empty() {
            self.evict_fraction(0.2);
        }
    }
}
