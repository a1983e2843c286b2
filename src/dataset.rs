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

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use log::debug;

use crate::error::Error;
use crate::htype::Htype;
use crate::index::{Index, Selector};
use crate::meta::DatasetMeta;
use crate::storage::{build_cache_chain, LocalProvider, MemoryProvider, StorageProvider};
use crate::tensor::Tensor;
use crate::Result;

const DATASET_META_KEY: &str = "dataset_meta.json";

/// The default in-memory cache budget for a dataset opened on local disk,
/// mirroring the source library's 2 GB default.
pub const DEFAULT_MEMORY_CACHE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// The open mode of a [`Dataset`] or [`Tensor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Read-only: all mutating operations fail with `Error::ReadOnly`.
    Read,
    /// Write: an existing dataset's tensors may be overwritten.
    Write,
    /// Append: the default mode; tensors may be created and extended.
    Append,
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(mode: &str) -> Result<Self> {
        match mode {
            "r" => Ok(Mode::Read),
            "w" => Ok(Mode::Write),
            "a" => Ok(Mode::Append),
            other => Err(Error::InvalidKeyType(other.to_string())),
        }
    }
}

/// Overrides for a [`Htype`]'s defaults, passed to `Dataset::create_tensor`.
#[derive(Debug, Clone, Default)]
pub struct TensorOptions {
    pub dtype: Option<String>,
    pub chunk_size: Option<u64>,
    pub class_names: Option<Vec<String>>,
    pub compression: Option<String>,
}

impl TensorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dtype(mut self, dtype: impl Into<String>) -> Self {
        self.dtype = Some(dtype.into());
        self
    }

    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn class_names(mut self, class_names: Vec<String>) -> Self {
        self.class_names = Some(class_names);
        self
    }

    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }
}

/// Construction options for opening or creating a [`Dataset`].
#[derive(Debug, Clone)]
pub struct DatasetOptions {
    pub mode: Mode,
    pub memory_cache_size: u64,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Append,
            memory_cache_size: DEFAULT_MEMORY_CACHE_SIZE,
        }
    }
}

impl DatasetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn memory_cache_size(mut self, size: u64) -> Self {
        self.memory_cache_size = size;
        self
    }
}

/// A named collection of tensors sharing one storage chain.
///
/// `Dataset` owns the `CacheChain` rooted at a base `StorageProvider`; a
/// sliced view (produced by [`Dataset::view`]) shares that same chain via
/// a reference count and differs only in its ambient `Index`.
pub struct Dataset {
    storage: Arc<dyn StorageProvider>,
    meta: DatasetMeta,
    tensors: HashMap<String, Tensor>,
    mode: Mode,
    index: Index,
}

impl Dataset {
    /// Open (or create) a dataset rooted at a local filesystem path,
    /// fronted by an in-memory `CacheLayer` budgeted to
    /// `options.memory_cache_size` bytes.
    pub fn open_local(path: impl AsRef<Path>, options: DatasetOptions) -> Result<Self> {
        let base: Box<dyn StorageProvider> = Box::new(LocalProvider::new(path.as_ref())?);
        let storage = build_cache_chain(base, &[options.memory_cache_size]);
        Self::open(Arc::from(storage), options.mode)
    }

    /// Open (or create) a dataset backed purely by memory; useful for
    /// tests and scratch datasets that don't need to persist.
    pub fn open_memory(options: DatasetOptions) -> Result<Self> {
        let storage: Arc<dyn StorageProvider> = Arc::new(MemoryProvider::new());
        Self::open(storage, options.mode)
    }

    fn open(storage: Arc<dyn StorageProvider>, mode: Mode) -> Result<Self> {
        let meta = match storage.get(DATASET_META_KEY) {
            Ok(bytes) => DatasetMeta::from_json(&bytes)?,
            Err(Error::KeyNotFound(_)) => DatasetMeta::new(),
            Err(error) => return Err(error),
        };

        let mut tensors = HashMap::with_capacity(meta.tensors.len());
        for name in &meta.tensors {
            let tensor = Tensor::load(Arc::clone(&storage), name.clone(), mode)?;
            tensors.insert(name.clone(), tensor);
        }

        Ok(Self {
            storage,
            meta,
            tensors,
            mode,
            index: Index::new(),
        })
    }

    /// The length of the shortest tensor in this dataset (0 if it has
    /// none), matching the source library's `__len__`.
    pub fn len(&self) -> usize {
        self.tensors.values().map(Tensor::len).min().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tensor_names(&self) -> Vec<&str> {
        self.meta.tensors.iter().map(String::as_str).collect()
    }

    /// Look up a tensor by name, with this dataset's ambient index applied.
    ///
    /// Returns a detached, read-oriented view: it reflects whatever has
    /// already been persisted to storage, but writing through it does not
    /// update the handle cached by this `Dataset`. Use [`Dataset::tensor_mut`]
    /// to get a handle whose mutations are visible to `Dataset::len` without
    /// an intervening reload.
    pub fn tensor(&self, name: &str) -> Result<Tensor> {
        if !self.meta.contains(name) {
            return Err(Error::TensorDoesNotExist(name.to_string()));
        }
        Tensor::load_with_index(Arc::clone(&self.storage), name.to_string(), self.mode, self.index.clone())
    }

    /// Look up a tensor by name for mutation (`append`/`extend`). The
    /// returned handle is the one cached by this `Dataset`, so its state
    /// stays in sync with `Dataset::len`.
    pub fn tensor_mut(&mut self, name: &str) -> Result<&mut Tensor> {
        self.tensors
            .get_mut(name)
            .ok_or_else(|| Error::TensorDoesNotExist(name.to_string()))
    }

    /// Construct a new dataset view sharing this dataset's storage chain,
    /// with `sub` composed into the ambient index. Performs no I/O.
    ///
    /// The returned view is read-oriented: `Dataset::tensor` works on it
    /// (reloading from the shared storage), but it carries no
    /// `tensor_mut` cache of its own.
    pub fn view(&self, sub: Vec<Selector>) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            meta: self.meta.clone(),
            tensors: HashMap::new(),
            mode: self.mode,
            index: self.index.compose(sub),
        }
    }

    /// Create a new tensor named `name`, archetyped by `htype`, with
    /// `opts` overriding that archetype's defaults.
    pub fn create_tensor(&mut self, name: &str, htype: Htype, opts: TensorOptions) -> Result<&mut Tensor> {
        if self.mode == Mode::Read {
            return Err(Error::ReadOnly);
        }
        if self.meta.contains(name) {
            return Err(Error::TensorAlreadyExists(name.to_string()));
        }

        let dtype = opts.dtype.unwrap_or_else(|| htype.default_dtype().to_string());
        let chunk_size = opts.chunk_size.unwrap_or_else(|| htype.default_chunk_size());
        let class_names = opts.class_names;
        let compression = opts.compression.or_else(|| htype.default_compression());

        let meta = crate::meta::TensorMeta::new(dtype, chunk_size, class_names, compression);
        let tensor = Tensor::create(Arc::clone(&self.storage), name.to_string(), meta, self.mode)?;

        self.meta.tensors.push(name.to_string());
        self.storage.set(DATASET_META_KEY, self.meta.to_json()?)?;
        self.tensors.insert(name.to_string(), tensor);
        debug!("created tensor '{}'", name);

        Ok(self.tensors.get_mut(name).expect("just inserted"))
    }

    /// Flush every layer of the cache chain down to the base storage
    /// provider.
    pub fn flush(&self) -> Result<()> {
        self.storage.flush()
    }

    /// Flush, then clear every cache layer's contents without touching the
    /// base storage provider.
    pub fn clear_cache(&self) -> Result<()> {
        self.storage.clear_cache()
    }

    /// Irreversibly delete every key under this dataset's storage chain,
    /// down to the base provider.
    pub fn delete(&self) -> Result<()> {
        self.storage.clear()
    }
}

impl Drop for Dataset {
    fn drop(&mut self) {
        if let Err(error) = self.flush() {
            log::error!("failed to flush dataset on drop: {}", error);
        }
    }
}
