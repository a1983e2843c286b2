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

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::Error;
use crate::storage::StorageProvider;
use crate::Result;

/// An in-memory `StorageProvider` backed by a `BTreeMap`.
///
/// This is the provider used for tests, and is the natural choice for a
/// `CacheLayer`'s bounded `cache_storage`.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    values: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryProvider {
    /// Create a new, empty `MemoryProvider`.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageProvider for MemoryProvider {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.values
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.values.write().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.values
            .write()
            .unwrap()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.values.read().unwrap().keys().cloned().collect())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.values.read().unwrap().len())
    }
}
