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

use crate::error::Error;
use crate::Result;

/// An opaque key-value byte store.
///
/// A `StorageProvider` is the sole boundary between the engine and any
/// backend: a local directory, an in-memory map, or (by implementing this
/// trait outside this crate) an object store. Keys are forward-slash
/// delimited path strings; values are immutable byte sequences.
///
/// `CacheLayer` is itself a `StorageProvider`, so providers compose: a chain
/// of caches can sit in front of a slow, authoritative backend.
pub trait StorageProvider: Send + Sync {
    /// Return the full value stored at `key`.
    ///
    /// # Errors
    /// - `Error::KeyNotFound` if no value is stored at `key`.
    /// - `Error::PathIsDirectory` if `key` resolves to a non-leaf container.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Return the values stored at each of `keys`, in the same order.
    ///
    /// The default implementation calls `get` once per key. Implementations
    /// backed by slow storage should override this to fetch in parallel.
    fn get_many(&self, keys: &[String]) -> Result<Vec<Vec<u8>>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    /// Return `length` bytes starting at `offset` within the value stored
    /// at `key`.
    ///
    /// # Errors
    /// - `Error::KeyNotFound` if no value is stored at `key`.
    /// - `Error::OutOfRange` if `offset + length` exceeds the stored length.
    fn get_bytes(&self, key: &str, offset: u64, length: u64) -> Result<Vec<u8>> {
        let value = self.get(key)?;
        let end = offset
            .checked_add(length)
            .filter(|&end| end <= value.len() as u64)
            .ok_or(Error::OutOfRange {
                offset,
                length,
                actual_len: value.len() as u64,
            })?;
        Ok(value[offset as usize..end as usize].to_vec())
    }

    /// Overwrite the value stored at `key`, creating parent containers as
    /// needed.
    ///
    /// # Errors
    /// - `Error::LeafAtContainerPath` if a parent of `key` is itself a leaf
    ///   value.
    fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Write `value` into the value stored at `key`, starting at `offset`.
    ///
    /// When `overwrite` is `false` and no value is currently stored at
    /// `key`, the value is zero-padded up to `offset` before `value` is
    /// written; this lets a partial write extend a sparse key. When
    /// `overwrite` is `true`, this behaves like `set` applied to the
    /// spliced byte range.
    fn set_bytes(&self, key: &str, value: &[u8], offset: u64, overwrite: bool) -> Result<()> {
        let mut current = if overwrite {
            Vec::new()
        } else {
            match self.get(key) {
                Ok(bytes) => bytes,
                Err(Error::KeyNotFound(_)) => vec![0u8; offset as usize],
                Err(error) => return Err(error),
            }
        };

        let end = offset as usize + value.len();
        if current.len() < end {
            current.resize(end, 0u8);
        }
        current[offset as usize..end].copy_from_slice(value);
        self.set(key, current)
    }

    /// Remove the value stored at `key`.
    ///
    /// # Errors
    /// - `Error::KeyNotFound` if no value is stored at `key`.
    fn delete(&self, key: &str) -> Result<()>;

    /// Return every key currently stored by this provider.
    ///
    /// The order is unspecified but stable within a single call.
    fn keys(&self) -> Result<Vec<String>>;

    /// Return the number of keys stored by this provider.
    fn len(&self) -> Result<usize> {
        Ok(self.keys()?.len())
    }

    /// Return whether this provider stores no keys.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Persist any buffered writes to durable storage.
    ///
    /// This is a no-op for providers that are not caches.
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Flush, then drop any cached entries this provider holds.
    ///
    /// This is a no-op for providers that are not caches. A `CacheLayer`
    /// overrides this to flush and empty its own `cache_storage`, then
    /// propagate the call to `next_storage`.
    fn clear_cache(&self) -> Result<()> {
        self.flush()
    }

    /// Delete every key stored by this provider.
    ///
    /// This is destructive and irreversible.
    fn clear(&self) -> Result<()> {
        for key in self.keys()? {
            self.delete(&key)?;
        }
        Ok(())
    }
}
