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

/// The byte width of one element of `dtype`.
///
/// This crate treats sample payloads as opaque byte slabs; it only needs
/// `itemsize` to compute byte offsets for chunking and index slicing, not
/// to interpret the bytes numerically.
pub fn itemsize(dtype: &str) -> Result<usize> {
    match dtype {
        "bool" | "uint8" | "int8" => Ok(1),
        "uint16" | "int16" | "float16" => Ok(2),
        "uint32" | "int32" | "float32" => Ok(4),
        "uint64" | "int64" | "float64" => Ok(8),
        other => Err(Error::TensorMetaMismatch {
            field: "dtype",
            expected: "a recognized dtype name".to_string(),
            got: other.to_string(),
        }),
    }
}
