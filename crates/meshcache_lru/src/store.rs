// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The byte-budgeted LRU store.

use std::{collections::HashMap, fmt::Debug};

use crate::{
    ByteLen,
    list::{NodeIndex, RecencyList},
};

/// Callback invoked with every entry the store evicts.
pub type EvictionCallback<V> = Box<dyn FnMut(&str, &V) + Send>;

/// Point-in-time accounting of a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Bytes currently charged against the budget.
    pub bytes: u64,
    /// Number of live entries.
    pub items: usize,
    /// Number of entries removed by `remove_oldest`, including capacity-triggered evictions.
    pub evictions: u64,
}

/// A least-recently-used store bounded by a byte budget.
///
/// Every entry is charged `key.len() + value.byte_len()` bytes. After each [`add`](Self::add)
/// the store evicts least recently used entries until the total charge fits within
/// the capacity. A capacity of `0` disables the bound.
///
/// The store has no internal synchronization. Wrap it in a lock to share it between tasks.
///
/// # Examples
///
/// ```
/// use meshcache_lru::LruStore;
///
/// let mut store = LruStore::new(20);
/// store.add("key1", "value1".to_string());
/// store.add("key2", "value2".to_string());
/// store.add("k3", "v3".to_string());
///
/// // 10 + 10 + 4 bytes exceed the budget, so the oldest entry goes.
/// assert!(store.get("key1").is_none());
/// assert_eq!(store.len(), 2);
/// ```
pub struct LruStore<V> {
    capacity_bytes: u64,
    used_bytes: u64,
    evictions: u64,
    list: RecencyList<V>,
    index: HashMap<String, NodeIndex>,
    on_evict: Option<EvictionCallback<V>>,
}

impl<V: Debug> Debug for LruStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruStore")
            .field("capacity_bytes", &self.capacity_bytes)
            .field("used_bytes", &self.used_bytes)
            .field("len", &self.list.len())
            .field("on_evict", &self.on_evict.is_some())
            .finish_non_exhaustive()
    }
}

impl<V: ByteLen> LruStore<V> {
    /// Creates a store holding at most `capacity_bytes` bytes, or unbounded if `0`.
    #[must_use]
    pub fn new(capacity_bytes: u64) -> Self {
        Self {
            capacity_bytes,
            used_bytes: 0,
            evictions: 0,
            list: RecencyList::new(),
            index: HashMap::new(),
            on_evict: None,
        }
    }

    /// Creates a store that reports every eviction to `on_evict`.
    ///
    /// The callback runs synchronously before the evicting call returns. It receives the store
    /// only through the values passed to it and therefore cannot re-enter the store.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::{Arc, Mutex};
    /// use meshcache_lru::LruStore;
    ///
    /// let evicted = Arc::new(Mutex::new(Vec::new()));
    /// let sink = Arc::clone(&evicted);
    /// let mut store = LruStore::with_eviction(10, move |key: &str, _: &Vec<u8>| {
    ///     sink.lock().unwrap().push(key.to_string());
    /// });
    ///
    /// store.add("a", vec![0; 5]);
    /// store.add("b", vec![0; 5]);
    /// assert_eq!(*evicted.lock().unwrap(), ["a"]);
    /// ```
    #[must_use]
    pub fn with_eviction(capacity_bytes: u64, on_evict: impl FnMut(&str, &V) + Send + 'static) -> Self {
        Self {
            on_evict: Some(Box::new(on_evict)),
            ..Self::new(capacity_bytes)
        }
    }

    /// Inserts or replaces the value for `key` and marks it most recently used.
    ///
    /// Evicts least recently used entries while the byte budget is exceeded. An entry larger
    /// than the whole budget is evicted right after insertion.
    pub fn add(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();

        if let Some(&idx) = self.index.get(&key) {
            self.list.move_to_front(idx);
            if let Some(node) = self.list.node_mut(idx) {
                let old_len = len_u64(node.value.byte_len());
                let new_len = len_u64(value.byte_len());
                node.value = value;
                self.used_bytes = self.used_bytes - old_len + new_len;
            }
        } else {
            let charge = entry_charge(&key, &value);
            let idx = self.list.push_front(key.clone(), value);
            self.index.insert(key, idx);
            self.used_bytes += charge;
        }

        while self.capacity_bytes != 0 && self.used_bytes > self.capacity_bytes {
            if self.remove_oldest().is_none() {
                break;
            }
        }
    }

    /// Returns the value for `key` and marks it most recently used.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.list.move_to_front(idx);
        self.list.node(idx).map(|node| &node.value)
    }

    /// Returns the value for `key` without touching its recency.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.list.node(idx).map(|node| &node.value)
    }

    /// Returns `true` if `key` is present, without touching its recency.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Evicts the least recently used entry and returns it.
    ///
    /// The eviction callback, if any, is invoked before this returns. Returns `None` on an
    /// empty store.
    pub fn remove_oldest(&mut self) -> Option<(String, V)> {
        let (key, value) = self.list.pop_back()?;
        self.index.remove(&key);
        self.used_bytes -= entry_charge(&key, &value);
        self.evictions += 1;

        if let Some(on_evict) = self.on_evict.as_mut() {
            on_evict(&key, &value);
        }

        Some((key, value))
    }

    /// Removes `key` from the store.
    ///
    /// Explicit removal is not an eviction; the eviction callback is not invoked.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let idx = self.index.remove(key)?;
        let (key, value) = self.list.remove(idx)?;
        self.used_bytes -= entry_charge(&key, &value);
        Some(value)
    }

    /// Drops every entry without invoking the eviction callback.
    pub fn clear(&mut self) {
        self.list.clear();
        self.index.clear();
        self.used_bytes = 0;
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Returns `true` if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.len() == 0
    }

    /// Bytes currently charged against the budget.
    #[must_use]
    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    /// The configured byte budget, `0` meaning unbounded.
    #[must_use]
    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    /// Returns the current accounting of this store.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            bytes: self.used_bytes,
            items: self.list.len(),
            evictions: self.evictions,
        }
    }

    /// Iterates keys from most to least recently used.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.list.iter().map(|node| node.key.as_str())
    }
}

fn entry_charge<V: ByteLen>(key: &str, value: &V) -> u64 {
    len_u64(key.len()) + len_u64(value.byte_len())
}

fn len_u64(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}
