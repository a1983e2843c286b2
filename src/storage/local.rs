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

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::error::Error;
use crate::storage::StorageProvider;
use crate::Result;

/// A `StorageProvider` backed by the local filesystem.
///
/// Keys are forward-slash delimited paths relative to `root`. Writing to a
/// key creates any missing parent directories.
#[derive(Debug)]
pub struct LocalProvider {
    root: PathBuf,
}

impl LocalProvider {
    /// Open (or create) a `LocalProvider` rooted at `root`.
    ///
    /// # Errors
    /// - `Error::PathIsDirectory` if `root` exists and is a file.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if root.is_file() {
            return Err(Error::PathIsDirectory(root.display().to_string()));
        }
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn full_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Resolve `key` to a file path, failing if it names a directory.
    fn file_path(&self, key: &str) -> Result<PathBuf> {
        let path = self.full_path(key);
        if path.is_dir() {
            return Err(Error::PathIsDirectory(key.to_string()));
        }
        Ok(path)
    }

    fn read_file(path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|error| match error.kind() {
            io::ErrorKind::NotFound => Error::KeyNotFound(path.display().to_string()),
            _ => Error::Io(error),
        })
    }
}

impl StorageProvider for LocalProvider {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.file_path(key)?;
        Self::read_file(&path)
    }

    fn get_many(&self, keys: &[String]) -> Result<Vec<Vec<u8>>> {
        // Bounded worker pool for bulk reads; rayon's global pool caps
        // concurrency to the number of available cores.
        keys.par_iter().map(|key| self.get(key)).collect()
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let path = self.full_path(key);
        if let Some(parent) = path.parent() {
            if parent.is_file() {
                return Err(Error::LeafAtContainerPath(parent.display().to_string()));
            }
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, value)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.file_path(key)?;
        fs::remove_file(&path).map_err(|error| match error.kind() {
            io::ErrorKind::NotFound => Error::KeyNotFound(key.to_string()),
            _ => Error::Io(error),
        })
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = entry.map_err(|error| Error::Io(error.into()))?;
            if entry.file_type().is_file() {
                let relative = entry
                    .path()
                    .strip_prefix(&self.root)
                    .expect("walked entry is under root")
                    .to_string_lossy()
                    .replace(std::path::MAIN_SEPARATOR, "/");
                keys.push(relative);
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn set_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let provider = LocalProvider::new(dir.path()).unwrap();
        provider.set("a/b.bin", b"hello".to_vec()).unwrap();
        assert_eq!(provider.get("a/b.bin").unwrap(), b"hello");
    }

    #[test]
    fn get_on_directory_fails() {
        let dir = tempdir().unwrap();
        let provider = LocalProvider::new(dir.path()).unwrap();
        provider.set("a/b.bin", b"hello".to_vec()).unwrap();
        assert!(matches!(provider.get("a"), Err(Error::PathIsDirectory(_))));
    }

    #[test]
    fn get_many_preserves_order() {
        let dir = tempdir().unwrap();
        let provider = LocalProvider::new(dir.path()).unwrap();
        provider.set("a", vec![1]).unwrap();
        provider.set("b", vec![2]).unwrap();
        provider.set("c", vec![3]).unwrap();
        let keys = vec!["c".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(provider.get_many(&keys).unwrap(), vec![vec![3], vec![1], vec![2]]);
    }

    #[test]
    fn delete_missing_key_fails() {
        let dir = tempdir().unwrap();
        let provider = LocalProvider::new(dir.path()).unwrap();
        assert!(matches!(provider.delete("missing"), Err(Error::KeyNotFound(_))));
    }

    #[test]
    fn keys_lists_nested_files() {
        let dir = tempdir().unwrap();
        let provider = LocalProvider::new(dir.path()).unwrap();
        provider.set("x/y/z.bin", vec![]).unwrap();
        let keys = provider.keys().unwrap();
        assert_eq!(keys, vec!["x/y/z.bin".to_string()]);
    }
}
