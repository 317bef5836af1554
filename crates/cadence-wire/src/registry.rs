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

//! The serialization registry: resolves, for any registered type, an
//! ordered chain of codecs capable of encoding and decoding it.
//!
//! Entries form a forest. Explicit entries match by exact tag only and are
//! checked first. Implicit entries live in two separate trees (one for
//! concrete-ancestry assignability, one for interface assignability)
//! supporting nearest-match resolution: lookup descends to the most
//! specific node the subject is assignable to, and chain execution falls
//! back along the parent chain when a node's own codecs all decline.
//!
//! The registry is mutated only at registration time (startup) and is
//! read-only thereafter.

use crate::desc::{SyncValue, TypeDesc, TypeTag};
use crate::error::SerializationMismatch;
use crate::worker::SyncWorker;
use std::collections::HashMap;
use std::sync::Arc;

/// Whether a codec accepted a value or declined it.
///
/// Declining is ordinary control flow, not an error: the worker rewinds
/// the cursor and tries the next codec in the chain.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CodecOutcome {
    /// The codec fully bound the value.
    Handled,
    /// The codec does not apply; try the next one.
    NotHandled,
}

/// A symmetric pair of directional procedures binding a typed value
/// to or from the byte cursor, packaged as one direction-agnostic call.
///
/// The worker's direction decides whether binds issued inside `sync`
/// write or read. A codec must issue the identical bind sequence in both
/// directions.
pub trait Codec: Send + Sync {
    /// Binds `value` through `worker`, or declines.
    fn sync(
        &self,
        worker: &mut SyncWorker<'_>,
        value: &mut dyn SyncValue,
    ) -> Result<CodecOutcome, SerializationMismatch>;
}

impl std::fmt::Debug for dyn Codec + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Codec")
    }
}

/// Constructs a default instance for a polymorphic read to fill in.
pub type ConstructFn = fn() -> Box<dyn SyncValue>;

/// Where a registration lands in the resolution order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RegistrationKind {
    /// Exact-tag match only; checked before either implicit tree.
    Explicit,
    /// Nearest-match over the concrete ancestry tree.
    ImplicitConcrete,
    /// Nearest-match over the interface tree; checked last.
    ImplicitInterface,
}

/// One type node in the forest.
struct Node {
    subject: &'static TypeDesc,
    chain: Vec<Arc<dyn Codec>>,
    construct: Option<ConstructFn>,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Which implicit tree an operation targets.
#[derive(Copy, Clone)]
enum Tree {
    Concrete,
    Interface,
}

/// The codec resolution registry.
#[derive(Default)]
pub struct SyncRegistry {
    nodes: Vec<Node>,
    explicit: HashMap<TypeTag, usize>,
    concrete_roots: Vec<usize>,
    concrete_index: HashMap<TypeTag, usize>,
    interface_roots: Vec<usize>,
    interface_index: HashMap<TypeTag, usize>,
}

impl SyncRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a codec for `desc`.
    ///
    /// Re-registering the same tag with the same kind appends to that
    /// node's chain rather than replacing it; chains execute in
    /// registration order.
    pub fn register(
        &mut self,
        desc: &'static TypeDesc,
        codec: Arc<dyn Codec>,
        kind: RegistrationKind,
    ) {
        log::trace!("SyncRegistry: registering '{}' as {kind:?}", desc.name);
        match kind {
            RegistrationKind::Explicit => {
                if let Some(&i) = self.explicit.get(&desc.tag) {
                    self.nodes[i].chain.push(codec);
                } else {
                    let i = self.new_node(desc, codec);
                    self.explicit.insert(desc.tag, i);
                }
            }
            RegistrationKind::ImplicitConcrete => self.insert_implicit(desc, codec, Tree::Concrete),
            RegistrationKind::ImplicitInterface => {
                self.insert_implicit(desc, codec, Tree::Interface);
            }
        }
    }

    /// Registers the constructor a polymorphic read uses to produce an
    /// instance of `desc` before running its codec chain.
    pub fn register_constructor(&mut self, desc: &'static TypeDesc, construct: ConstructFn) {
        let node = self
            .explicit
            .get(&desc.tag)
            .or_else(|| self.concrete_index.get(&desc.tag))
            .or_else(|| self.interface_index.get(&desc.tag))
            .copied();
        match node {
            Some(i) => self.nodes[i].construct = Some(construct),
            None => log::warn!(
                "SyncRegistry: constructor for unregistered type '{}' ignored",
                desc.name
            ),
        }
    }

    /// Resolves the ordered codec chain for `desc`.
    ///
    /// Explicit exact-tag entries win; otherwise the concrete tree, then
    /// the interface tree, each resolved to the most specific matching
    /// node with ancestor chains appended as fallback. No match at all is
    /// a hard resolution error.
    pub fn resolve(
        &self,
        desc: &TypeDesc,
    ) -> Result<Vec<Arc<dyn Codec>>, SerializationMismatch> {
        if let Some(&i) = self.explicit.get(&desc.tag) {
            return Ok(self.nodes[i].chain.clone());
        }
        if let Some(i) = self.lookup_tree(&self.concrete_roots, desc) {
            return Ok(self.chain_with_fallback(i));
        }
        if let Some(i) = self.lookup_tree(&self.interface_roots, desc) {
            return Ok(self.chain_with_fallback(i));
        }
        Err(SerializationMismatch::NoCodec {
            type_name: desc.name,
        })
    }

    /// Constructs a default instance of `desc` for a polymorphic read.
    #[must_use]
    pub fn construct(&self, desc: &TypeDesc) -> Option<Box<dyn SyncValue>> {
        let node = self
            .explicit
            .get(&desc.tag)
            .or_else(|| self.concrete_index.get(&desc.tag))
            .or_else(|| self.interface_index.get(&desc.tag))
            .copied()?;
        self.nodes[node].construct.map(|f| f())
    }

    /// Number of distinct registered type nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn new_node(&mut self, subject: &'static TypeDesc, codec: Arc<dyn Codec>) -> usize {
        self.nodes.push(Node {
            subject,
            chain: vec![codec],
            construct: None,
            parent: None,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    fn tree_mut(&mut self, tree: Tree) -> (&mut Vec<usize>, &mut HashMap<TypeTag, usize>) {
        match tree {
            Tree::Concrete => (&mut self.concrete_roots, &mut self.concrete_index),
            Tree::Interface => (&mut self.interface_roots, &mut self.interface_index),
        }
    }

    /// Inserts `desc` into an implicit tree, preserving the invariant that
    /// every tree edge follows assignability: the new node either attaches
    /// as a leaf under its most specific existing supertype, becomes the
    /// new parent of the existing proper subtypes at that level, or
    /// becomes a new root.
    fn insert_implicit(&mut self, desc: &'static TypeDesc, codec: Arc<dyn Codec>, tree: Tree) {
        let (roots, index) = self.tree_mut(tree);
        if let Some(&i) = index.get(&desc.tag) {
            self.nodes[i].chain.push(codec);
            return;
        }

        let roots_snapshot = roots.clone();
        let parent = self.find_deepest_supertype(&roots_snapshot, desc);
        let new_idx = self.new_node(desc, codec);

        let siblings: Vec<usize> = match parent {
            Some(p) => self.nodes[p].children.clone(),
            None => roots_snapshot,
        };
        let (captured, kept): (Vec<usize>, Vec<usize>) = siblings
            .into_iter()
            .partition(|&c| self.nodes[c].subject.is_assignable_to(desc.tag));

        for &c in &captured {
            log::trace!(
                "SyncRegistry: re-parenting '{}' under '{}'",
                self.nodes[c].subject.name,
                desc.name
            );
            self.nodes[c].parent = Some(new_idx);
        }
        self.nodes[new_idx].children = captured;
        self.nodes[new_idx].parent = parent;

        match parent {
            Some(p) => {
                let mut children = kept;
                children.push(new_idx);
                self.nodes[p].children = children;
            }
            None => {
                let (roots, _) = self.tree_mut(tree);
                let mut new_roots = kept;
                new_roots.push(new_idx);
                *roots = new_roots;
            }
        }
        let (_, index) = self.tree_mut(tree);
        index.insert(desc.tag, new_idx);
    }

    /// The deepest existing node that `desc` is assignable to, excluding an
    /// exact-tag match (callers handle that separately).
    fn find_deepest_supertype(&self, roots: &[usize], desc: &TypeDesc) -> Option<usize> {
        let mut current: Option<usize> = None;
        let mut frontier: &[usize] = roots;
        loop {
            let next = frontier.iter().copied().find(|&n| {
                let subject = self.nodes[n].subject;
                subject.tag != desc.tag && desc.is_assignable_to(subject.tag)
            });
            match next {
                Some(n) => {
                    current = Some(n);
                    frontier = &self.nodes[n].children;
                }
                None => return current,
            }
        }
    }

    /// The deepest node `desc` is assignable to, exact tags included.
    fn lookup_tree(&self, roots: &[usize], desc: &TypeDesc) -> Option<usize> {
        let mut current: Option<usize> = None;
        let mut frontier: &[usize] = roots;
        loop {
            let next = frontier
                .iter()
                .copied()
                .find(|&n| desc.is_assignable_to(self.nodes[n].subject.tag));
            match next {
                Some(n) => {
                    current = Some(n);
                    frontier = &self.nodes[n].children;
                }
                None => return current,
            }
        }
    }

    /// A node's own chain followed by its ancestors' chains, in order.
    fn chain_with_fallback(&self, node: usize) -> Vec<Arc<dyn Codec>> {
        let mut chain = Vec::new();
        let mut cursor = Some(node);
        while let Some(i) = cursor {
            chain.extend(self.nodes[i].chain.iter().cloned());
            cursor = self.nodes[i].parent;
        }
        chain
    }

    #[cfg(test)]
    fn parent_tag_of(&self, tag: TypeTag) -> Option<TypeTag> {
        let &i = self.concrete_index.get(&tag)?;
        self.nodes[i]
            .parent
            .map(|p| self.nodes[p].subject.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANIMAL_TAG: TypeTag = TypeTag(1);
    const DOG_TAG: TypeTag = TypeTag(2);
    const PUPPY_TAG: TypeTag = TypeTag(3);
    const PET_IFACE: TypeTag = TypeTag(100);

    const ANIMAL: TypeDesc = TypeDesc::leaf("Animal", ANIMAL_TAG);
    const DOG: TypeDesc = TypeDesc::new("Dog", DOG_TAG, &[ANIMAL_TAG], &[PET_IFACE]);
    const PUPPY: TypeDesc =
        TypeDesc::new("Puppy", PUPPY_TAG, &[DOG_TAG, ANIMAL_TAG], &[PET_IFACE]);
    const PET: TypeDesc = TypeDesc::leaf("Pet", PET_IFACE);

    /// No-op codec; tests compare chain entries by Arc identity.
    struct MarkerCodec;

    impl Codec for MarkerCodec {
        fn sync(
            &self,
            _worker: &mut SyncWorker<'_>,
            _value: &mut dyn SyncValue,
        ) -> Result<CodecOutcome, SerializationMismatch> {
            Ok(CodecOutcome::Handled)
        }
    }

    fn marker() -> Arc<dyn Codec> {
        Arc::new(MarkerCodec)
    }

    fn chain_matches(chain: &[Arc<dyn Codec>], expected: &[&Arc<dyn Codec>]) -> bool {
        chain.len() == expected.len()
            && chain
                .iter()
                .zip(expected)
                .all(|(got, want)| Arc::ptr_eq(got, want))
    }

    #[test]
    fn explicit_beats_later_implicit_ancestor() {
        let mut registry = SyncRegistry::new();
        let dog_explicit = marker();
        let animal_implicit = marker();
        registry.register(&DOG, dog_explicit.clone(), RegistrationKind::Explicit);
        registry.register(
            &ANIMAL,
            animal_implicit,
            RegistrationKind::ImplicitConcrete,
        );

        let chain = registry.resolve(&DOG).unwrap();
        assert!(chain_matches(&chain, &[&dog_explicit]));
    }

    #[test]
    fn late_ancestor_registration_reparents_without_discarding_chains() {
        let mut registry = SyncRegistry::new();
        let dog = marker();
        let animal = marker();
        registry.register(&DOG, dog.clone(), RegistrationKind::ImplicitConcrete);
        assert_eq!(registry.parent_tag_of(DOG_TAG), None);

        registry.register(&ANIMAL, animal.clone(), RegistrationKind::ImplicitConcrete);
        assert_eq!(registry.parent_tag_of(DOG_TAG), Some(ANIMAL_TAG));

        // Dog keeps its own chain, with Animal's appended as fallback.
        let chain = registry.resolve(&DOG).unwrap();
        assert!(chain_matches(&chain, &[&dog, &animal]));
    }

    #[test]
    fn resolution_descends_to_the_most_specific_node() {
        let mut registry = SyncRegistry::new();
        let animal = marker();
        let dog = marker();
        registry.register(&ANIMAL, animal.clone(), RegistrationKind::ImplicitConcrete);
        registry.register(&DOG, dog.clone(), RegistrationKind::ImplicitConcrete);

        // Puppy has no node of its own; Dog is the nearest match.
        let chain = registry.resolve(&PUPPY).unwrap();
        assert!(chain_matches(&chain, &[&dog, &animal]));
    }

    #[test]
    fn reregistration_appends_to_the_chain() {
        let mut registry = SyncRegistry::new();
        let first = marker();
        let second = marker();
        registry.register(&DOG, first.clone(), RegistrationKind::ImplicitConcrete);
        registry.register(&DOG, second.clone(), RegistrationKind::ImplicitConcrete);

        let chain = registry.resolve(&DOG).unwrap();
        assert!(chain_matches(&chain, &[&first, &second]));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn interface_tree_is_the_last_resort() {
        let mut registry = SyncRegistry::new();
        let pet = marker();
        registry.register(&PET, pet.clone(), RegistrationKind::ImplicitInterface);

        let chain = registry.resolve(&DOG).unwrap();
        assert!(chain_matches(&chain, &[&pet]));

        // A concrete match takes precedence over the interface tree.
        let animal = marker();
        registry.register(&ANIMAL, animal.clone(), RegistrationKind::ImplicitConcrete);
        let chain = registry.resolve(&DOG).unwrap();
        assert!(chain_matches(&chain, &[&animal]));
    }

    #[test]
    fn no_match_is_a_hard_error() {
        let registry = SyncRegistry::new();
        let err = registry.resolve(&DOG).unwrap_err();
        assert!(matches!(err, SerializationMismatch::NoCodec { .. }));
    }

    #[test]
    fn splice_captures_existing_subtypes() {
        let mut registry = SyncRegistry::new();
        let puppy = marker();
        let animal = marker();
        let dog = marker();
        registry.register(&PUPPY, puppy.clone(), RegistrationKind::ImplicitConcrete);
        registry.register(&ANIMAL, animal.clone(), RegistrationKind::ImplicitConcrete);
        // Dog splices in between Animal and Puppy.
        registry.register(&DOG, dog.clone(), RegistrationKind::ImplicitConcrete);

        assert_eq!(registry.parent_tag_of(PUPPY_TAG), Some(DOG_TAG));
        assert_eq!(registry.parent_tag_of(DOG_TAG), Some(ANIMAL_TAG));

        let chain = registry.resolve(&PUPPY).unwrap();
        assert!(chain_matches(&chain, &[&puppy, &dog, &animal]));
    }
}
