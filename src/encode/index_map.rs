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

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::Result;

/// The byte region of a single sample: which chunk(s) it occupies and at
/// what offsets, plus its shape (needed to reinterpret the flat byte
/// buffer on read).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMapEntry {
    pub start_chunk: usize,
    pub end_chunk: usize,
    pub start_byte: u64,
    pub end_byte: u64,
    pub shape: Vec<usize>,
}

impl IndexMapEntry {
    pub fn is_single_chunk(&self) -> bool {
        self.start_chunk == self.end_chunk
    }
}

/// Per-tensor structure mapping sample ordinal to its byte region.
///
/// Stored as `/<tensor>/index_map`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexMap {
    entries: Vec<IndexMapEntry>,
}

impl IndexMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: IndexMapEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// # Errors
    /// `Error::OutOfRange` if `sample_index` names no recorded sample.
    pub fn get(&self, sample_index: usize) -> Result<&IndexMapEntry> {
        self.entries
            .get(sample_index)
            .ok_or_else(|| Error::OutOfRange {
                offset: sample_index as u64,
                length: 1,
                actual_len: self.entries.len() as u64,
            })
    }

    pub fn to_bincode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|error| Error::Serialize(error.to_string()))
    }

    pub fn from_bincode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|error| Error::Deserialize(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(shape: Vec<usize>) -> IndexMapEntry {
        IndexMapEntry {
            start_chunk: 0,
            end_chunk: 0,
            start_byte: 0,
            end_byte: 4,
            shape,
        }
    }

    #[test]
    fn get_out_of_range_fails() {
        let map = IndexMap::new();
        assert!(matches!(map.get(0), Err(Error::OutOfRange { .. })));
    }

    #[test]
    fn push_then_get_round_trips() {
        let mut map = IndexMap::new();
        map.push(entry(vec![2, 2]));
        assert_eq!(map.get(0).unwrap().shape, vec![2, 2]);
    }

    #[test]
    fn bincode_round_trips() {
        let mut map = IndexMap::new();
        map.push(entry(vec![2, 2]));
        let bytes = map.to_bincode().unwrap();
        assert_eq!(IndexMap::from_bincode(&bytes).unwrap(), map);
    }
}
