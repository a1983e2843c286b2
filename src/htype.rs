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

use std::str::FromStr;

use crate::error::Error;
use crate::Result;

/// A named archetype that supplies default `dtype`/`chunk_size`/
/// `compression` for `Dataset::create_tensor`, overridable via
/// [`crate::dataset::TensorOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Htype {
    Generic,
    Image,
    ClassLabel,
    Text,
    Json,
}

const MB: u64 = 1024 * 1024;

impl Htype {
    pub fn default_dtype(&self) -> &'static str {
        match self {
            Htype::Generic => "float64",
            Htype::Image => "uint8",
            Htype::ClassLabel => "uint32",
            Htype::Text => "uint8",
            Htype::Json => "uint8",
        }
    }

    pub fn default_chunk_size(&self) -> u64 {
        match self {
            Htype::Generic => 16 * MB,
            Htype::Image => 16 * MB,
            Htype::ClassLabel => MB,
            Htype::Text => MB,
            Htype::Json => MB,
        }
    }

    pub fn default_compression(&self) -> Option<String> {
        None
    }
}

impl FromStr for Htype {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "generic" => Ok(Htype::Generic),
            "image" => Ok(Htype::Image),
            "class_label" => Ok(Htype::ClassLabel),
            "text" => Ok(Htype::Text),
            "json" => Ok(Htype::Json),
            other => Err(Error::InvalidKeyType(other.to_string())),
        }
    }
}
