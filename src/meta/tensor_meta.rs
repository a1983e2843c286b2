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

/// The persisted schema and bookkeeping state of a single tensor.
///
/// Stored as `/<tensor>/tensor_meta.json` (see `dataset_meta.rs` for the
/// sibling catalog file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorMeta {
    pub dtype: String,
    pub length: usize,
    pub min_shape: Vec<usize>,
    pub max_shape: Vec<usize>,
    pub chunk_size: u64,
    pub class_names: Option<Vec<String>>,
    pub compression: Option<String>,
}

impl TensorMeta {
    /// A freshly `create_tensor`'d meta: zero samples, no shape recorded
    /// yet.
    pub fn new(
        dtype: impl Into<String>,
        chunk_size: u64,
        class_names: Option<Vec<String>>,
        compression: Option<String>,
    ) -> Self {
        Self {
            dtype: dtype.into(),
            length: 0,
            min_shape: Vec::new(),
            max_shape: Vec::new(),
            chunk_size,
            class_names,
            compression,
        }
    }

    /// Whether samples of this tensor vary in per-dimension extent.
    pub fn is_dynamic(&self) -> bool {
        self.min_shape != self.max_shape
    }

    /// Validate that `dtype`/`shape` are compatible with this tensor's
    /// declared schema, without mutating it.
    ///
    /// # Errors
    /// - `Error::TensorMetaMismatch` if `dtype` disagrees with `self.dtype`,
    ///   or if `shape`'s rank disagrees with the tensor's established rank.
    pub fn check_compatible(&self, dtype: &str, shape: &[usize]) -> Result<()> {
        if dtype != self.dtype {
            return Err(Error::TensorMetaMismatch {
                field: "dtype",
                expected: self.dtype.clone(),
                got: dtype.to_string(),
            });
        }

        if self.length > 0 && shape.len() != self.min_shape.len() {
            return Err(Error::TensorMetaMismatch {
                field: "min_shape",
                expected: format!("rank {}", self.min_shape.len()),
                got: format!("rank {}", shape.len()),
            });
        }

        Ok(())
    }

    /// Record the addition of one sample of the given `shape`, widening
    /// `min_shape`/`max_shape` and incrementing `length`.
    ///
    /// The first sample ever recorded fixes the tensor's rank; `shape` is
    /// assumed already validated by `check_compatible`.
    pub fn record_sample(&mut self, shape: &[usize]) {
        if self.length == 0 {
            self.min_shape = shape.to_vec();
            self.max_shape = shape.to_vec();
        } else {
            for (axis, &extent) in shape.iter().enumerate() {
                if extent < self.min_shape[axis] {
                    self.min_shape[axis] = extent;
                }
                if extent > self.max_shape[axis] {
                    self.max_shape[axis] = extent;
                }
            }
        }
        self.length += 1;
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|error| Error::Serialize(error.to_string()))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|error| Error::Deserialize(error.to_string()))
    }
}
