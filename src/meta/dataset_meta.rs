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

/// The persisted catalog of tensor names in a dataset.
///
/// Stored as `/dataset_meta.json` at the dataset root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetMeta {
    pub tensors: Vec<String>,
}

impl DatasetMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.iter().any(|t| t == name)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|error| Error::Serialize(error.to_string()))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|error| Error::Deserialize(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trips() {
        let meta = DatasetMeta {
            tensors: vec!["image".to_string(), "label".to_string()],
        };
        let bytes = meta.to_json().unwrap();
        assert_eq!(DatasetMeta::from_json(&bytes).unwrap(), meta);
    }

    #[test]
    fn contains_checks_membership() {
        let meta = DatasetMeta {
            tensors: vec!["image".to_string()],
        };
        assert!(meta.contains("image"));
        assert!(!meta.contains("label"));
    }
}
