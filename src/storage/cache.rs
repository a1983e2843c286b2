/*
 * Copyright 2019-2020 Wren Powell
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::collections::HashSet;
use std::sync::Mutex;

use indexmap::IndexMap;
use log::{debug, trace};

use crate::error::Error;
use crate::storage::memory::MemoryProvider;
use crate::storage::StorageProvider;
use crate::Result;

/// The mutable bookkeeping state of a `CacheLayer`, guarded by a single
/// mutex so that eviction (which touches `lru_sizes`, `dirty_keys`, and
/// `cache_used` together) stays atomic with respect to concurrent callers.
#[derive(Default)]
struct CacheState {
    /// Insertion-ordered key -> cached byte length. Iteration order is LRU
    /// order, oldest first.
    lru_sizes: IndexMap<String, u64>,
    /// Keys whose cached value has not yet been written to `next_storage`.
    dirty_keys: HashSet<String>,
    /// `lru_sizes.values().sum()`, maintained incrementally.
    cache_used: u64,
}

impl CacheState {
    fn touch(&mut self, key: &str) {
        if let Some(size) = self.lru_sizes.shift_remove(key) {
            self.lru_sizes.insert(key.to_string(), size);
        }
    }

    fn remove(&mut self, key: &str) -> Option<u64> {
        self.dirty_keys.remove(key);
        let size = self.lru_sizes.shift_remove(key);
        if let Some(size) = size {
            self.cache_used -= size;
        }
        size
    }

    fn insert(&mut self, key: &str, size: u64, dirty: bool) {
        self.lru_sizes.insert(key.to_string(), size);
        self.cache_used += size;
        if dirty {
            self.dirty_keys.insert(key.to_string());
        }
    }

    fn oldest(&self) -> Option<String> {
        self.lru_sizes.keys().next().cloned()
    }
}

/// A write-back, least-recently-used cache composing a bounded
/// `cache_storage` in front of an authoritative `next_storage`.
///
/// A `CacheLayer` is itself a `StorageProvider`, so a `CacheChain` is built
/// by nesting: the `next_storage` of one layer is either the base provider
/// or another `CacheLayer`. See [`build_cache_chain`] for a convenience
/// constructor.
///
/// Invariants:
/// - `cache_used <= max_cache_size` after every public operation returns,
///   except that a single value larger than `max_cache_size` is still
///   admitted rather than bypassing the cache for it, so a write never
///   fails just because one value doesn't fit the budget.
/// - `dirty_keys` is always a subset of `lru_sizes`'s keys.
pub struct CacheLayer {
    cache_storage: Box<dyn StorageProvider>,
    next_storage: Box<dyn StorageProvider>,
    max_cache_size: u64,
    state: Mutex<CacheState>,
}

impl CacheLayer {
    /// Create a new `CacheLayer` fronting `next_storage` with `cache_storage`
    /// as its bounded cache, budgeted to `max_cache_size` bytes.
    pub fn new(
        cache_storage: Box<dyn StorageProvider>,
        next_storage: Box<dyn StorageProvider>,
        max_cache_size: u64,
    ) -> Self {
        Self {
            cache_storage,
            next_storage,
            max_cache_size,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// The number of bytes currently held in `cache_storage`.
    pub fn cache_used(&self) -> u64 {
        self.state.lock().unwrap().cache_used
    }

    /// The keys whose cached value has not yet been written to
    /// `next_storage`.
    pub fn dirty_keys(&self) -> Vec<String> {
        self.state.lock().unwrap().dirty_keys.iter().cloned().collect()
    }

    /// Evict least-recently-used entries until admitting `need` more bytes
    /// would not exceed `max_cache_size`, or the cache is empty.
    fn ensure_capacity(&self, need: u64, state: &mut CacheState) -> Result<()> {
        while state.cache_used + need > self.max_cache_size && !state.lru_sizes.is_empty() {
            let key = state.oldest().expect("lru_sizes is non-empty");

            if state.dirty_keys.contains(&key) {
                let value = self.cache_storage.get(&key)?;
                self.next_storage.set(&key, value)?;
                debug!("cache eviction wrote back dirty key '{}'", key);
            }

            state.remove(&key);
            self.cache_storage.delete(&key).or_else(|error| match error {
                Error::KeyNotFound(_) => Ok(()),
                other => Err(other),
            })?;
            trace!("evicted '{}' from cache", key);
        }
        Ok(())
    }

    /// Write every dirty key back to `next_storage`, then propagate the
    /// flush downward. `cache_storage` is not purged; entries become clean.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let dirty: Vec<String> = state.dirty_keys.iter().cloned().collect();
        for key in &dirty {
            let value = self.cache_storage.get(key)?;
            self.next_storage.set(key, value)?;
        }
        state.dirty_keys.clear();
        drop(state);
        debug!("flushed {} dirty keys", dirty.len());
        self.next_storage.flush()
    }

    /// Flush, then drop every cached entry and reset LRU bookkeeping.
    /// `next_storage` is untouched.
    pub fn clear_cache(&self) -> Result<()> {
        self.flush()?;
        let mut state = self.state.lock().unwrap();
        let keys: Vec<String> = state.lru_sizes.keys().cloned().collect();
        for key in &keys {
            self.cache_storage.delete(key).or_else(|error| match error {
                Error::KeyNotFound(_) => Ok(()),
                other => Err(other),
            })?;
        }
        state.lru_sizes.clear();
        state.cache_used = 0;
        Ok(())
    }
}

impl StorageProvider for CacheLayer {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let mut state = self.state.lock().unwrap();

        if state.lru_sizes.contains_key(key) {
            state.touch(key);
            trace!("cache hit for '{}'", key);
            return self.cache_storage.get(key);
        }

        drop(state);
        let value = self.next_storage.get(key)?;
        trace!("cache miss for '{}', fetched from next_storage", key);

        let mut state = self.state.lock().unwrap();
        self.ensure_capacity(value.len() as u64, &mut state)?;
        self.cache_storage.set(key, value.clone())?;
        state.insert(key, value.len() as u64, false);

        Ok(value)
    }

    fn get_many(&self, keys: &[String]) -> Result<Vec<Vec<u8>>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.remove(key);
        self.ensure_capacity(value.len() as u64, &mut state)?;
        self.cache_storage.set(key, value.clone())?;
        state.insert(key, value.len() as u64, true);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let was_cached = state.remove(key).is_some();
        drop(state);

        self.cache_storage.delete(key).or_else(|error| match error {
            Error::KeyNotFound(_) => Ok(()),
            other => Err(other),
        })?;

        match self.next_storage.delete(key) {
            Ok(()) => Ok(()),
            Err(Error::KeyNotFound(_)) if was_cached => Ok(()),
            Err(error) => Err(error),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys: HashSet<String> = self.next_storage.keys()?.into_iter().collect();
        let state = self.state.lock().unwrap();
        keys.extend(state.lru_sizes.keys().cloned());
        Ok(keys.into_iter().collect())
    }

    fn flush(&self) -> Result<()> {
        CacheLayer::flush(self)
    }

    fn clear_cache(&self) -> Result<()> {
        CacheLayer::clear_cache(self)?;
        self.next_storage.clear_cache()
    }

    fn clear(&self) -> Result<()> {
        CacheLayer::clear_cache(self)?;
        self.next_storage.clear()
    }
}

/// Stack `layer_budgets.len()` `CacheLayer`s, each backed by a fresh
/// in-memory `cache_storage`, on top of `base`. The first budget is the
/// outermost (fastest, smallest) layer.
pub fn build_cache_chain(
    base: Box<dyn StorageProvider>,
    layer_budgets: &[u64],
) -> Box<dyn StorageProvider> {
    let mut storage = base;
    for &budget in layer_budgets.iter().rev() {
        storage = Box::new(CacheLayer::new(
            Box::new(MemoryProvider::new()),
            storage,
            budget,
        ));
    }
    storage
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(max_cache_size: u64) -> CacheLayer {
        CacheLayer::new(
            Box::new(MemoryProvider::new()),
            Box::new(MemoryProvider::new()),
            max_cache_size,
        )
    }

    #[test]
    fn set_then_get_round_trips_without_flush() {
        let cache = layer(1024);
        cache.set("a", b"hello".to_vec()).unwrap();
        assert_eq!(cache.get("a").unwrap(), b"hello");
    }

    #[test]
    fn flush_persists_to_next_storage() {
        let cache = layer(1024);
        cache.set("a", b"hello".to_vec()).unwrap();
        cache.flush().unwrap();
        assert_eq!(cache.next_storage.get("a").unwrap(), b"hello");
        assert!(cache.dirty_keys().is_empty());
    }

    #[test]
    fn flush_is_idempotent() {
        let cache = layer(1024);
        cache.set("a", b"hello".to_vec()).unwrap();
        cache.flush().unwrap();
        cache.flush().unwrap();
        assert_eq!(cache.next_storage.get("a").unwrap(), b"hello");
    }

    #[test]
    fn clear_cache_is_idempotent() {
        let cache = layer(1024);
        cache.set("a", b"hello".to_vec()).unwrap();
        cache.clear_cache().unwrap();
        cache.clear_cache().unwrap();
        assert_eq!(cache.next_storage.get("a").unwrap(), b"hello");
        assert_eq!(cache.cache_used(), 0);
    }

    // Three 16 MB chunks set in sequence over a 32 MB cache, checking
    // dirty/eviction bookkeeping at each step.
    #[test]
    fn eviction_accounting_matches_scenario() {
        const CHUNK: usize = 16 * 1024 * 1024;
        let cache = layer(32 * 1024 * 1024);
        let f1 = vec![1u8; CHUNK];
        let f2 = vec![2u8; CHUNK];
        let f3 = vec![3u8; CHUNK];

        cache.set("F1", f1.clone()).unwrap();
        cache.set("F2", f2.clone()).unwrap();
        assert_eq!(cache.cache_used(), 32 * 1024 * 1024);
        let mut dirty = cache.dirty_keys();
        dirty.sort();
        assert_eq!(dirty, vec!["F1".to_string(), "F2".to_string()]);

        // F1 is evicted (oldest) and written back since it was dirty.
        cache.set("F3", f3.clone()).unwrap();
        let mut dirty = cache.dirty_keys();
        dirty.sort();
        assert_eq!(dirty, vec!["F2".to_string(), "F3".to_string()]);
        assert_eq!(cache.next_storage.get("F1").unwrap(), f1);
        assert!(cache.next_storage.get("F2").is_err());

        // Reading F1 evicts F2 (oldest), writing it back.
        assert_eq!(cache.get("F1").unwrap(), f1);
        let dirty = cache.dirty_keys();
        assert_eq!(dirty, vec!["F3".to_string()]);
        assert_eq!(cache.next_storage.get("F2").unwrap(), f2);

        cache.flush().unwrap();
        assert!(cache.dirty_keys().is_empty());
        assert_eq!(cache.next_storage.get("F3").unwrap(), f3);
    }

    #[test]
    fn oversized_single_value_is_still_admitted() {
        let cache = layer(16);
        cache.set("huge", vec![0u8; 1024]).unwrap();
        assert_eq!(cache.get("huge").unwrap().len(), 1024);
    }

    #[test]
    fn delete_removes_from_cache_and_next_storage() {
        let cache = layer(1024);
        cache.set("a", b"hello".to_vec()).unwrap();
        cache.flush().unwrap();
        cache.delete("a").unwrap();
        assert!(cache.get("a").is_err());
    }

    #[test]
    fn delete_of_unflushed_key_does_not_propagate_not_found() {
        let cache = layer(1024);
        cache.set("a", b"hello".to_vec()).unwrap();
        cache.delete("a").unwrap();
    }

    #[test]
    fn chained_cache_layers_propagate_flush() {
        let base = Box::new(MemoryProvider::new());
        let storage = build_cache_chain(base, &[64, 256]);
        storage.set("a", b"hello".to_vec()).unwrap();
        storage.flush().unwrap();
        assert_eq!(storage.get("a").unwrap(), b"hello");
    }

    #[test]
    fn clear_cache_through_storage_provider_propagates_down_the_chain() {
        let base = Box::new(MemoryProvider::new());
        let storage = build_cache_chain(base, &[64, 256]);
        storage.set("a", b"hello".to_vec()).unwrap();
        storage.clear_cache().unwrap();
        // Both layers flushed their dirty keys and dropped their cached
        // entries; the value is still reachable from the base provider.
        assert_eq!(storage.get("a").unwrap(), b"hello");
    }
}
