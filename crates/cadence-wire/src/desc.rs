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

//! Static type descriptors for registry resolution.
//!
//! There is no runtime subtype test in Rust, so every syncable type carries
//! a [`TypeDesc`]: its tag, its concrete ancestry chain (nearest first),
//! and the interface tags it implements. Assignability is a lookup in
//! those lists. Descriptors are `'static` and built once; the registry
//! never inspects values beyond their descriptor and their `Any` identity.

use std::any::Any;
use std::fmt;

/// Stable identity of a registered type, identical on every participant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeTag(pub u32);

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tag#{}", self.0)
    }
}

/// Static description of a syncable type's place in the type graph.
#[derive(Debug, PartialEq)]
pub struct TypeDesc {
    /// Human-readable name, used in diagnostics only.
    pub name: &'static str,
    /// The type's stable tag.
    pub tag: TypeTag,
    /// Concrete ancestry, nearest ancestor first. Empty for root types.
    pub ancestors: &'static [TypeTag],
    /// Tags of the interfaces this type implements.
    pub interfaces: &'static [TypeTag],
}

impl TypeDesc {
    /// A descriptor with no declared ancestry or interfaces.
    #[must_use]
    pub const fn leaf(name: &'static str, tag: TypeTag) -> Self {
        Self {
            name,
            tag,
            ancestors: &[],
            interfaces: &[],
        }
    }

    /// A fully specified descriptor.
    #[must_use]
    pub const fn new(
        name: &'static str,
        tag: TypeTag,
        ancestors: &'static [TypeTag],
        interfaces: &'static [TypeTag],
    ) -> Self {
        Self {
            name,
            tag,
            ancestors,
            interfaces,
        }
    }

    /// Whether a value of this type is assignable to a slot of type `tag`:
    /// the tags match, or `tag` is an ancestor or implemented interface.
    #[must_use]
    pub fn is_assignable_to(&self, tag: TypeTag) -> bool {
        self.tag == tag || self.ancestors.contains(&tag) || self.interfaces.contains(&tag)
    }
}

/// A value the sync worker can bind polymorphically.
///
/// The `as_any` pair is how codecs reach the concrete type behind a
/// `dyn SyncValue`, mirroring the downcast convention used across the
/// engine's trait objects.
pub trait SyncValue: Any + Send {
    /// This value's static type descriptor.
    fn desc(&self) -> &'static TypeDesc;

    /// Allows downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Allows mutable downcasting to the concrete type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANIMAL: TypeDesc = TypeDesc::leaf("Animal", TypeTag(1));
    const DOG: TypeDesc = TypeDesc::new("Dog", TypeTag(2), &[TypeTag(1)], &[TypeTag(100)]);

    #[test]
    fn assignability_covers_self_ancestors_and_interfaces() {
        assert!(DOG.is_assignable_to(TypeTag(2)));
        assert!(DOG.is_assignable_to(ANIMAL.tag));
        assert!(DOG.is_assignable_to(TypeTag(100)));
        assert!(!DOG.is_assignable_to(TypeTag(3)));
        assert!(!ANIMAL.is_assignable_to(DOG.tag));
    }
}
