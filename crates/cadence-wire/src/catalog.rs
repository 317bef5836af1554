// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The shared ordered type catalog.
//!
//! Polymorphic binds put a `u16` index into this catalog on the wire
//! instead of a type name. Every participant must build the catalog in the
//! same order at startup, or discriminators stop meaning the same thing.

use crate::desc::{TypeDesc, TypeTag};
use std::collections::HashMap;

/// Ordered mapping between [`TypeTag`]s and dense `u16` wire indices.
#[derive(Debug, Default)]
pub struct TypeCatalog {
    entries: Vec<&'static TypeDesc>,
    index: HashMap<TypeTag, u16>,
}

impl TypeCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a type, returning its wire index.
    ///
    /// Registering the same tag twice is a setup mistake; the existing
    /// index is returned and a warning logged rather than shifting every
    /// subsequent index.
    pub fn register(&mut self, desc: &'static TypeDesc) -> u16 {
        if let Some(&existing) = self.index.get(&desc.tag) {
            log::warn!(
                "TypeCatalog: '{}' ({}) already cataloged at index {existing}",
                desc.name,
                desc.tag
            );
            return existing;
        }
        let index = u16::try_from(self.entries.len()).expect("type catalog exceeds u16 indices");
        self.entries.push(desc);
        self.index.insert(desc.tag, index);
        index
    }

    /// The wire index of a tag, if cataloged.
    #[must_use]
    pub fn index_of(&self, tag: TypeTag) -> Option<u16> {
        self.index.get(&tag).copied()
    }

    /// The descriptor at a wire index, if in range.
    #[must_use]
    pub fn desc_at(&self, index: u16) -> Option<&'static TypeDesc> {
        self.entries.get(usize::from(index)).copied()
    }

    /// Number of cataloged types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cataloged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
