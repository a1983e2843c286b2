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

use std::sync::Arc;

use log::trace;

use crate::chunk_engine::ChunkEngine;
use crate::dataset::Mode;
use crate::dtype;
use crate::error::Error;
use crate::index::{resolve_axis_indices, slice_flat, Index, Selector};
use crate::meta::TensorMeta;
use crate::storage::StorageProvider;
use crate::Result;

/// An opaque, row-major byte slab with a declared `dtype` and `shape`.
///
/// This is the boundary this crate draws with the numeric-array runtime a
/// caller brings: this crate reads and writes flat bytes it reinterprets
/// only by element width, never by numeric type.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    pub dtype: String,
    pub shape: Vec<usize>,
    pub bytes: Vec<u8>,
}

impl Array {
    pub fn new(dtype: impl Into<String>, shape: Vec<usize>, bytes: Vec<u8>) -> Self {
        Self {
            dtype: dtype.into(),
            shape,
            bytes,
        }
    }
}

/// The result of [`Tensor::numpy`].
#[derive(Debug, Clone, PartialEq)]
pub enum NumpyResult {
    /// The sample selector resolved to a single integer index: the one
    /// sample, with no leading batch axis.
    Single(Array),
    /// Every selected sample shared a shape: stacked into one array with a
    /// leading axis of length `k`.
    Stacked(Array),
    /// Samples had varying shapes and `aslist` was requested.
    List(Vec<Array>),
}

/// The element-wise min/max shape bounds of a tensor's samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub lower: Vec<usize>,
    pub upper: Vec<usize>,
}

impl Shape {
    pub fn is_dynamic(&self) -> bool {
        self.lower != self.upper
    }
}

/// A named, typed array stored under a [`crate::dataset::Dataset`].
///
/// A `Tensor` borrows its owning dataset's storage chain via a reference
/// count rather than a lifetime: a sliced view and its parent can each
/// hold their own `Tensor` without one outliving the other's borrow.
pub struct Tensor {
    storage: Arc<dyn StorageProvider>,
    key: String,
    meta: TensorMeta,
    engine: ChunkEngine,
    index: Index,
    mode: Mode,
}

impl Tensor {
    pub(crate) fn tensor_meta_key(key: &str) -> String {
        format!("{}/tensor_meta.json", key)
    }

    /// Create a brand-new tensor's persisted state and return a façade over
    /// it. Callers are expected to have already checked for name collision
    /// at the dataset level.
    pub(crate) fn create(storage: Arc<dyn StorageProvider>, key: String, meta: TensorMeta, mode: Mode) -> Result<Self> {
        storage.set(&Self::tensor_meta_key(&key), meta.to_json()?)?;
        let engine = ChunkEngine::new(key.clone(), meta.chunk_size);
        Ok(Self {
            storage,
            key,
            meta,
            engine,
            index: Index::new(),
            mode,
        })
    }

    /// Load a façade over a tensor that already exists in `storage`.
    pub(crate) fn load(storage: Arc<dyn StorageProvider>, key: String, mode: Mode) -> Result<Self> {
        let meta = TensorMeta::from_json(&storage.get(&Self::tensor_meta_key(&key))?)?;
        let engine = ChunkEngine::load(&*storage, key.clone(), meta.chunk_size)?;
        Ok(Self {
            storage,
            key,
            meta,
            engine,
            index: Index::new(),
            mode,
        })
    }

    /// A view over the same tensor sharing storage, refined by `index`.
    pub(crate) fn with_index(&self, index: Index) -> Result<Self> {
        Self::load_with_index(Arc::clone(&self.storage), self.key.clone(), self.mode, index)
    }

    /// Load a façade over a tensor that already exists in `storage`, with
    /// its ambient index set to `index` directly (no separate reload).
    pub(crate) fn load_with_index(storage: Arc<dyn StorageProvider>, key: String, mode: Mode, index: Index) -> Result<Self> {
        let mut tensor = Self::load(storage, key, mode)?;
        tensor.index = index;
        Ok(tensor)
    }

    pub fn name(&self) -> &str {
        &self.key
    }

    pub fn meta(&self) -> &TensorMeta {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.meta.length
    }

    pub fn is_empty(&self) -> bool {
        self.meta.length == 0
    }

    pub fn shape(&self) -> Shape {
        Shape {
            lower: self.meta.min_shape.clone(),
            upper: self.meta.max_shape.clone(),
        }
    }

    /// Index this tensor with `sub`, composing it into the ambient index
    /// carried by this façade.
    pub fn index_by(&self, sub: Vec<Selector>) -> Result<Self> {
        self.with_index(self.index.compose(sub))
    }

    /// Append a single sample: `array.shape` is the sample's own shape,
    /// with a batch axis of 1 implicitly prepended.
    pub fn append(&mut self, array: Array) -> Result<()> {
        let mut shape = vec![1];
        shape.extend_from_slice(&array.shape);
        self.extend(Array {
            dtype: array.dtype,
            shape,
            bytes: array.bytes,
        })
    }

    /// Extend this tensor by the batch of samples in `array`, whose first
    /// axis is the batch axis.
    pub fn extend(&mut self, array: Array) -> Result<()> {
        if self.mode == Mode::Read {
            return Err(Error::ReadOnly);
        }
        if array.shape.is_empty() {
            return Err(Error::TensorMetaMismatch {
                field: "min_shape",
                expected: "at least a batch axis".to_string(),
                got: "rank 0".to_string(),
            });
        }

        let batch_size = array.shape[0];
        let sample_shape = array.shape[1..].to_vec();
        let itemsize = dtype::itemsize(&array.dtype)?;
        let sample_elems: usize = sample_shape.iter().product();
        let sample_bytes = sample_elems * itemsize;
        let expected_len = batch_size * sample_bytes;

        if array.bytes.len() != expected_len {
            return Err(Error::TensorMetaMismatch {
                field: "shape",
                expected: format!("{} bytes for shape {:?}", expected_len, array.shape),
                got: format!("{} bytes", array.bytes.len()),
            });
        }

        for i in 0..batch_size {
            self.meta.check_compatible(&array.dtype, &sample_shape)?;
            let start = i * sample_bytes;
            let buf = &array.bytes[start..start + sample_bytes];
            self.engine.write_bytes(&*self.storage, buf, sample_shape.clone())?;
            self.meta.record_sample(&sample_shape);
        }

        self.engine.persist(&*self.storage)?;
        self.storage.set(&Self::tensor_meta_key(&self.key), self.meta.to_json()?)?;
        trace!("tensor '{}' extended by {} samples", self.key, batch_size);
        Ok(())
    }

    /// Materialize the samples selected by this tensor's ambient index.
    pub fn numpy(&self, aslist: bool) -> Result<NumpyResult> {
        let sample_selector = self.index.sample_selector();
        let ordinals = resolve_axis_indices(&sample_selector, self.meta.length)?;
        let itemsize = dtype::itemsize(&self.meta.dtype)?;
        let inner = self.index.inner_selectors();

        let mut samples = Vec::with_capacity(ordinals.len());
        for ordinal in &ordinals {
            let (buf, shape) = self.engine.read_sample(&*self.storage, *ordinal)?;
            let (buf, shape) = if inner.is_empty() {
                (buf, shape)
            } else {
                slice_flat(&buf, &shape, itemsize, inner)?
            };
            samples.push(Array {
                dtype: self.meta.dtype.clone(),
                shape,
                bytes: buf,
            });
        }

        if matches!(sample_selector, Selector::Integer(_)) {
            return Ok(NumpyResult::Single(
                samples.into_iter().next().expect("resolved exactly one ordinal"),
            ));
        }

        let all_same_shape = samples.windows(2).all(|pair| pair[0].shape == pair[1].shape);

        if all_same_shape {
            let mut stacked_shape = vec![samples.len()];
            if let Some(first) = samples.first() {
                stacked_shape.extend_from_slice(&first.shape);
            }
            let bytes: Vec<u8> = samples.iter().flat_map(|sample| sample.bytes.clone()).collect();
            Ok(NumpyResult::Stacked(Array {
                dtype: self.meta.dtype.clone(),
                shape: stacked_shape,
                bytes,
            }))
        } else if aslist {
            Ok(NumpyResult::List(samples))
        } else {
            Err(Error::DynamicTensorNumpyError)
        }
    }
}
