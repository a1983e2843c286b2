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

//! Pluggable byte storage: the `StorageProvider` trait and its
//! implementations.

mod cache;
mod local;
mod memory;
mod provider;

pub use cache::{build_cache_chain, CacheLayer};
pub use local::LocalProvider;
pub use memory::MemoryProvider;
pub use provider::StorageProvider;
