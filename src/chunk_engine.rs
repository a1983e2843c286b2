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

use crate::encode::{chunk_id_to_name, ChunkNameEncoder, IndexMap, IndexMapEntry};
use crate::error::Error;
use crate::storage::StorageProvider;
use crate::Result;

/// Packs a stream of variable-length samples belonging to one tensor into
/// fixed-capacity chunks, and resolves sample ordinals back to byte
/// regions across one or more chunks.
///
/// A `ChunkEngine` owns the `IndexMap` and `ChunkNameEncoder` for a single
/// tensor; chunk bytes themselves live under `<tensor_prefix>/chunks/` in
/// whatever `StorageProvider` is passed to `write_bytes`/`read_sample`.
pub struct ChunkEngine {
    tensor_prefix: String,
    chunk_size: u64,
    index_map: IndexMap,
    encoder: ChunkNameEncoder,
}

impl ChunkEngine {
    /// A fresh engine for a tensor with no samples yet.
    pub fn new(tensor_prefix: impl Into<String>, chunk_size: u64) -> Self {
        Self {
            tensor_prefix: tensor_prefix.into(),
            chunk_size,
            index_map: IndexMap::new(),
            encoder: ChunkNameEncoder::new(),
        }
    }

    fn index_map_key(&self) -> String {
        format!("{}/index_map", self.tensor_prefix)
    }

    fn chunk_names_key(&self) -> String {
        format!("{}/chunk_names", self.tensor_prefix)
    }

    fn chunk_key(&self, chunk_id: u64) -> String {
        format!("{}/chunks/{}", self.tensor_prefix, chunk_id_to_name(chunk_id))
    }

    fn chunk_key_for_name(&self, name: &str) -> String {
        format!("{}/chunks/{}", self.tensor_prefix, name)
    }

    /// Load a `ChunkEngine` for a tensor that already has persisted state.
    /// Tensors with no samples yet have no `index_map`/`chunk_names` keys;
    /// that case is treated identically to `new`.
    pub fn load(storage: &dyn StorageProvider, tensor_prefix: impl Into<String>, chunk_size: u64) -> Result<Self> {
        let tensor_prefix = tensor_prefix.into();
        let index_map = match storage.get(&format!("{}/index_map", tensor_prefix)) {
            Ok(bytes) => IndexMap::from_bincode(&bytes)?,
            Err(Error::KeyNotFound(_)) => IndexMap::new(),
            Err(error) => return Err(error),
        };
        let encoder = match storage.get(&format!("{}/chunk_names", tensor_prefix)) {
            Ok(bytes) => ChunkNameEncoder::from_bincode(&bytes)?,
            Err(Error::KeyNotFound(_)) => ChunkNameEncoder::new(),
            Err(error) => return Err(error),
        };
        Ok(Self {
            tensor_prefix,
            chunk_size,
            index_map,
            encoder,
        })
    }

    /// Persist the `IndexMap` and `ChunkNameEncoder` to `storage`. Chunk
    /// bytes themselves are already durable as of each `write_bytes` call;
    /// this commits the bookkeeping that makes them reachable.
    pub fn persist(&self, storage: &dyn StorageProvider) -> Result<()> {
        storage.set(&self.index_map_key(), self.index_map.to_bincode()?)?;
        storage.set(&self.chunk_names_key(), self.encoder.to_bincode()?)?;
        Ok(())
    }

    pub fn index_map(&self) -> &IndexMap {
        &self.index_map
    }

    pub fn num_samples(&self) -> usize {
        self.index_map.len()
    }

    fn last_chunk_used_bytes(&self) -> u64 {
        if self.index_map.is_empty() || self.encoder.num_chunks() == 0 {
            return 0;
        }
        let last = self.index_map.get(self.index_map.len() - 1).expect("non-empty");
        if last.end_chunk == self.encoder.num_chunks() - 1 {
            last.end_byte
        } else {
            0
        }
    }

    /// Append one sample's flattened bytes, recording its `shape` in the
    /// `IndexMap` and updating the `ChunkNameEncoder`.
    pub fn write_bytes(&mut self, storage: &dyn StorageProvider, buf: &[u8], shape: Vec<usize>) -> Result<()> {
        let has_last = self.encoder.num_chunks() > 0;
        let last_used = self.last_chunk_used_bytes();
        let remaining = if has_last {
            self.chunk_size.saturating_sub(last_used)
        } else {
            0
        };

        if has_last && buf.len() as u64 <= remaining {
            let chunk_id = self.encoder.last_chunk_id().expect("has_last");
            let key = self.chunk_key(chunk_id);
            let mut existing = storage.get(&key)?;
            existing.extend_from_slice(buf);
            storage.set(&key, existing)?;

            let start_chunk = self.encoder.num_chunks() - 1;
            let end_byte = last_used + buf.len() as u64;
            self.index_map.push(IndexMapEntry {
                start_chunk,
                end_chunk: start_chunk,
                start_byte: last_used,
                end_byte,
                shape,
            });
            self.encoder.extend_chunk(1, false);
            return Ok(());
        }

        let (start_chunk, start_byte, offset) = if has_last && remaining > 0 {
            let chunk_id = self.encoder.last_chunk_id().expect("has_last");
            let key = self.chunk_key(chunk_id);
            let mut existing = storage.get(&key)?;
            existing.extend_from_slice(&buf[..remaining as usize]);
            storage.set(&key, existing)?;
            self.encoder.extend_chunk(0, true);
            (self.encoder.num_chunks() - 1, last_used, remaining as usize)
        } else {
            (self.encoder.num_chunks(), 0, 0)
        };

        let remainder = &buf[offset..];
        let chunk_size = self.chunk_size as usize;
        let num_new_chunks = (remainder.len() + chunk_size - 1) / chunk_size.max(1);
        let num_new_chunks = num_new_chunks.max(1);

        let mut end_chunk = start_chunk;
        let mut end_byte = 0u64;
        for i in 0..num_new_chunks {
            let chunk_start = i * chunk_size;
            let chunk_end = ((i + 1) * chunk_size).min(remainder.len());
            let chunk_bytes = remainder[chunk_start..chunk_end].to_vec();
            let is_terminal = i == num_new_chunks - 1;
            let num_new_samples = if is_terminal { 1 } else { 0 };
            let chunk_id = self.encoder.append_chunk(num_new_samples, !is_terminal);
            storage.set(&self.chunk_key(chunk_id), chunk_bytes.clone())?;
            end_chunk = self.encoder.num_chunks() - 1;
            end_byte = chunk_bytes.len() as u64;
        }

        self.index_map.push(IndexMapEntry {
            start_chunk,
            end_chunk,
            start_byte,
            end_byte,
            shape,
        });
        Ok(())
    }

    /// Read back the flattened bytes and recorded shape of one sample.
    pub fn read_sample(&self, storage: &dyn StorageProvider, sample_index: usize) -> Result<(Vec<u8>, Vec<usize>)> {
        let entry = self.index_map.get(sample_index)?;
        let chunk_names = self.encoder.get_chunk_names(sample_index)?;

        let buf = if chunk_names.len() == 1 {
            let key = self.chunk_key_for_name(&chunk_names[0]);
            storage.get_bytes(&key, entry.start_byte, entry.end_byte - entry.start_byte)?
        } else {
            let mut buf = Vec::new();
            let last = chunk_names.len() - 1;
            for (i, name) in chunk_names.iter().enumerate() {
                let key = self.chunk_key_for_name(name);
                if i == 0 {
                    let full = storage.get(&key)?;
                    buf.extend_from_slice(&full[entry.start_byte as usize..]);
                } else if i == last {
                    let full = storage.get(&key)?;
                    buf.extend_from_slice(&full[..entry.end_byte as usize]);
                } else {
                    buf.extend(storage.get(&key)?);
                }
            }
            buf
        };

        Ok((buf, entry.shape.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryProvider;

    #[test]
    fn single_chunk_round_trip() {
        let storage = MemoryProvider::new();
        let mut engine = ChunkEngine::new("t", 1024);
        engine.write_bytes(&storage, &[1, 2, 3, 4], vec![4]).unwrap();
        engine.write_bytes(&storage, &[5, 6], vec![2]).unwrap();

        let (buf, shape) = engine.read_sample(&storage, 0).unwrap();
        assert_eq!(buf, vec![1, 2, 3, 4]);
        assert_eq!(shape, vec![4]);

        let (buf, shape) = engine.read_sample(&storage, 1).unwrap();
        assert_eq!(buf, vec![5, 6]);
        assert_eq!(shape, vec![2]);
    }

    #[test]
    fn sample_spanning_multiple_chunks() {
        let storage = MemoryProvider::new();
        let mut engine = ChunkEngine::new("t", 4);
        let sample: Vec<u8> = (0..10).collect();
        engine.write_bytes(&storage, &sample, vec![10]).unwrap();

        let (buf, shape) = engine.read_sample(&storage, 0).unwrap();
        assert_eq!(buf, sample);
        assert_eq!(shape, vec![10]);
        assert_eq!(engine.index_map().get(0).unwrap().start_chunk, 0);
        assert_eq!(engine.index_map().get(0).unwrap().end_chunk, 2);
    }

    #[test]
    fn second_sample_starts_new_chunk_after_full_one() {
        let storage = MemoryProvider::new();
        let mut engine = ChunkEngine::new("t", 4);
        engine.write_bytes(&storage, &[1, 2, 3, 4], vec![4]).unwrap();
        engine.write_bytes(&storage, &[5, 6], vec![2]).unwrap();
        let (buf, _) = engine.read_sample(&storage, 1).unwrap();
        assert_eq!(buf, vec![5, 6]);
    }

    #[test]
    fn persist_and_load_round_trip() {
        let storage = MemoryProvider::new();
        let mut engine = ChunkEngine::new("t", 1024);
        engine.write_bytes(&storage, &[1, 2, 3], vec![3]).unwrap();
        engine.persist(&storage).unwrap();

        let reloaded = ChunkEngine::load(&storage, "t", 1024).unwrap();
        let (buf, shape) = reloaded.read_sample(&storage, 0).unwrap();
        assert_eq!(buf, vec![1, 2, 3]);
        assert_eq!(shape, vec![3]);
    }

    #[test]
    fn load_on_fresh_tensor_is_empty() {
        let storage = MemoryProvider::new();
        let engine = ChunkEngine::load(&storage, "t", 1024).unwrap();
        assert_eq!(engine.num_samples(), 0);
    }
}
