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
use uuid::Uuid;

use crate::error::Error;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct ChunkEntry {
    chunk_id: u64,
    /// Index of the last sample (partially or fully) contained in this
    /// chunk, or `-1` if this chunk holds no complete-or-started sample yet.
    last_index: i64,
}

/// A run-length structure mapping sample ordinals to the chunk(s) that
/// contain them.
///
/// Stored as `/<tensor>/chunk_names`. `encoded` and `connectivity` are
/// parallel arrays: `connectivity[i]` is `true` when chunk `i`'s last
/// sample continues into chunk `i + 1`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkNameEncoder {
    encoded: Vec<ChunkEntry>,
    connectivity: Vec<bool>,
}

fn generate_chunk_id() -> u64 {
    (Uuid::new_v4().as_u128() >> 64) as u64
}

/// Render a chunk id as lowercase hex with no prefix, matching the on-disk
/// `chunks/<chunk_id_hex>` layout.
pub fn chunk_id_to_name(id: u64) -> String {
    format!("{:x}", id)
}

impl ChunkNameEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_chunks(&self) -> usize {
        self.encoded.len()
    }

    /// Total number of samples recorded so far (0 if empty).
    pub fn num_samples(&self) -> usize {
        self.encoded
            .last()
            .map(|entry| (entry.last_index + 1) as usize)
            .unwrap_or(0)
    }

    /// Whether the most recently appended chunk's last sample continues
    /// into a following chunk (i.e. it is not yet terminated).
    pub fn last_chunk_open(&self) -> bool {
        self.connectivity.last().copied().unwrap_or(false)
    }

    pub fn last_chunk_id(&self) -> Option<u64> {
        self.encoded.last().map(|entry| entry.chunk_id)
    }

    /// Start a new chunk, generating a fresh id. `num_new_samples` is the
    /// count of samples fully or newly contributed by this chunk (0 for an
    /// interior chunk of a sample that spans more than it).
    pub fn append_chunk(&mut self, num_new_samples: usize, connected_to_next: bool) -> u64 {
        let chunk_id = generate_chunk_id();
        let prev_last = self.encoded.last().map(|e| e.last_index).unwrap_or(-1);
        let last_index = prev_last + num_new_samples as i64;
        self.encoded.push(ChunkEntry {
            chunk_id,
            last_index,
        });
        self.connectivity.push(connected_to_next);
        chunk_id
    }

    /// Extend the current final chunk in place with `num_new_samples` more
    /// samples, without starting a new chunk.
    ///
    /// # Panics
    /// Panics if there is no chunk yet, or the final chunk's connectivity
    /// bit is already set (it was already marked as continuing into a
    /// chunk that doesn't exist yet).
    pub fn extend_chunk(&mut self, num_new_samples: usize, connected_to_next: bool) {
        let last_connectivity = self
            .connectivity
            .last_mut()
            .expect("extend_chunk requires an existing chunk");
        assert!(
            !*last_connectivity,
            "cannot extend a chunk already marked as connected to a following chunk"
        );
        *last_connectivity = connected_to_next;
        let last_entry = self.encoded.last_mut().expect("encoded is non-empty");
        last_entry.last_index += num_new_samples as i64;
    }

    /// Resolve `sample_index` to the ordered chunk ids that together hold
    /// its bytes.
    ///
    /// # Errors
    /// `Error::OutOfRange` if `sample_index` names no recorded sample.
    pub fn get_chunk_names(&self, sample_index: usize) -> Result<Vec<String>> {
        let target = sample_index as i64;
        // The first chunk whose last_index reaches `target` is the chunk
        // where this sample's bytes end; chunks before it belong to the
        // same sample only if they're connected and haven't completed any
        // sample yet (last_index == target - 1).
        let last = self
            .encoded
            .partition_point(|entry| entry.last_index < target);

        if last >= self.encoded.len() {
            return Err(Error::OutOfRange {
                offset: sample_index as u64,
                length: 1,
                actual_len: self.num_samples() as u64,
            });
        }

        let mut first = last;
        while first > 0 && self.connectivity[first - 1] && self.encoded[first - 1].last_index == target - 1 {
            first -= 1;
        }

        Ok(self.encoded[first..=last]
            .iter()
            .map(|entry| chunk_id_to_name(entry.chunk_id))
            .collect())
    }

    pub fn to_bincode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|error| Error::Serialize(error.to_string()))
    }

    pub fn from_bincode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|error| Error::Deserialize(error.to_string()))
    }
}
