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

//! A chunked, cached storage engine for large labeled tensor datasets.
//!
//! This crate persists many multi-dimensional numeric arrays ("tensors")
//! to an object-addressed byte store, providing efficient append,
//! random-sample read, and structured multi-axis slicing over datasets
//! that may exceed available RAM.
//!
//! The stack, bottom to top:
//! - [`storage`]: the [`storage::StorageProvider`] trait and its
//!   implementations, including the write-back [`storage::CacheLayer`].
//! - [`chunk_engine`]: packs samples into fixed-capacity chunks and
//!   resolves sample ordinals back to byte regions.
//! - [`index`]: the lazy, multi-axis [`index::Index`] algebra.
//! - [`dataset`] / [`tensor`]: the [`dataset::Dataset`] / [`tensor::Tensor`]
//!   façade that ties the above together with schema validation.

pub mod chunk_engine;
pub mod dataset;
mod dtype;
pub mod encode;
pub mod error;
pub mod htype;
pub mod index;
pub mod meta;
pub mod storage;
pub mod tensor;

pub use dataset::{Dataset, DatasetOptions, Mode, TensorOptions};
pub use error::{Error, Result};
pub use htype::Htype;
pub use index::{Index, Selector};
pub use tensor::{Array, NumpyResult, Shape, Tensor};
