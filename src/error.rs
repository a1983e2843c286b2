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

use thiserror::Error;

/// The error type for this crate.
///
/// Every variant carries the offending key, field, or value so that callers
/// can report a precise diagnostic without re-deriving context.
#[derive(Debug, Error)]
pub enum Error {
    /// No value is stored at the given key.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The given key resolves to a directory (or other non-leaf container)
    /// rather than a value.
    #[error("path is a directory: {0}")]
    PathIsDirectory(String),

    /// Writing to the given key would require creating a container at a
    /// path that is already occupied by a leaf value.
    #[error("a value already exists at a parent of this path: {0}")]
    LeafAtContainerPath(String),

    /// A byte-range operation would read or write past the end of the
    /// stored value.
    #[error("byte range {offset}..{} is out of range for a value of length {actual_len}", offset + length)]
    OutOfRange {
        offset: u64,
        length: u64,
        actual_len: u64,
    },

    /// `create_tensor` was called with a name that already exists in the
    /// dataset.
    #[error("a tensor named '{0}' already exists in this dataset")]
    TensorAlreadyExists(String),

    /// A tensor was looked up by a name that isn't in the dataset.
    #[error("no tensor named '{0}' exists in this dataset")]
    TensorDoesNotExist(String),

    /// An appended or extended sample is incompatible with the tensor's
    /// declared meta.
    #[error("tensor meta mismatch on field '{field}': expected {expected}, got {got}")]
    TensorMetaMismatch {
        field: &'static str,
        expected: String,
        got: String,
    },

    /// `Tensor::numpy` was called on a tensor whose samples don't share a
    /// common shape, and `aslist` was not requested.
    #[error(
        "tensor has samples of varying shape and cannot be stacked into a single array; \
         call numpy(true) to get a list instead"
    )]
    DynamicTensorNumpyError,

    /// `Dataset::get` received a selector that isn't a supported index
    /// expression.
    #[error("'{0}' is not a valid index expression")]
    InvalidKeyType(String),

    /// The dataset is open in a mode that forbids the attempted mutation.
    #[error("dataset is open in read-only mode")]
    ReadOnly,

    /// An I/O error occurred in a storage provider.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A value could not be serialized.
    #[error("failed to serialize value: {0}")]
    Serialize(String),

    /// A value could not be deserialized.
    #[error("failed to deserialize value: {0}")]
    Deserialize(String),
}

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
