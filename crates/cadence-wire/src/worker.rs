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

//! The sync worker: a directional traversal context used by codecs to
//! recursively bind nested values through the registry.
//!
//! Every bind takes `&mut` to the value: a writing worker serializes the
//! current contents, a reading worker overwrites them. One code path per
//! type serves both directions, which is what keeps the bind sequences
//! symmetric.

use crate::catalog::TypeCatalog;
use crate::cursor::{ByteCursor, NONE_DISCRIMINATOR};
use crate::desc::SyncValue;
use crate::error::{SerializationMismatch, WireError};
use crate::registry::{CodecOutcome, SyncRegistry};

/// Which way bytes flow through the worker.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    /// Binds append encodings to the cursor.
    Write,
    /// Binds consume bytes and overwrite the bound values.
    Read,
}

/// A directional pass over one message.
pub struct SyncWorker<'a> {
    direction: Direction,
    cursor: &'a mut ByteCursor,
    registry: &'a SyncRegistry,
    catalog: &'a TypeCatalog,
}

impl<'a> SyncWorker<'a> {
    /// Creates a writing worker appending to `cursor`.
    pub fn writer(
        cursor: &'a mut ByteCursor,
        registry: &'a SyncRegistry,
        catalog: &'a TypeCatalog,
    ) -> Self {
        Self {
            direction: Direction::Write,
            cursor,
            registry,
            catalog,
        }
    }

    /// Creates a reading worker consuming from `cursor`.
    pub fn reader(
        cursor: &'a mut ByteCursor,
        registry: &'a SyncRegistry,
        catalog: &'a TypeCatalog,
    ) -> Self {
        Self {
            direction: Direction::Read,
            cursor,
            registry,
            catalog,
        }
    }

    /// The worker's direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns `true` when binds consume rather than produce bytes.
    #[must_use]
    pub fn is_reading(&self) -> bool {
        self.direction == Direction::Read
    }

    /// Rewinds the cursor to a previously captured entry point. Writing
    /// discards the bytes a declining codec produced; reading repositions.
    fn rewind(&mut self, entry: usize) {
        match self.direction {
            Direction::Write => self.cursor.truncate(entry),
            Direction::Read => self.cursor.set_position(entry),
        }
    }

    /// Binds a `u8`.
    pub fn bind_u8(&mut self, v: &mut u8) -> Result<(), WireError> {
        match self.direction {
            Direction::Write => self.cursor.write_u8(*v),
            Direction::Read => *v = self.cursor.read_u8()?,
        }
        Ok(())
    }

    /// Binds a `u16`.
    pub fn bind_u16(&mut self, v: &mut u16) -> Result<(), WireError> {
        match self.direction {
            Direction::Write => self.cursor.write_u16(*v),
            Direction::Read => *v = self.cursor.read_u16()?,
        }
        Ok(())
    }

    /// Binds a `u32`.
    pub fn bind_u32(&mut self, v: &mut u32) -> Result<(), WireError> {
        match self.direction {
            Direction::Write => self.cursor.write_u32(*v),
            Direction::Read => *v = self.cursor.read_u32()?,
        }
        Ok(())
    }

    /// Binds a `u64`.
    pub fn bind_u64(&mut self, v: &mut u64) -> Result<(), WireError> {
        match self.direction {
            Direction::Write => self.cursor.write_u64(*v),
            Direction::Read => *v = self.cursor.read_u64()?,
        }
        Ok(())
    }

    /// Binds an `i32`.
    pub fn bind_i32(&mut self, v: &mut i32) -> Result<(), WireError> {
        match self.direction {
            Direction::Write => self.cursor.write_i32(*v),
            Direction::Read => *v = self.cursor.read_i32()?,
        }
        Ok(())
    }

    /// Binds an `i64`.
    pub fn bind_i64(&mut self, v: &mut i64) -> Result<(), WireError> {
        match self.direction {
            Direction::Write => self.cursor.write_i64(*v),
            Direction::Read => *v = self.cursor.read_i64()?,
        }
        Ok(())
    }

    /// Binds an `f32` by bit pattern.
    pub fn bind_f32(&mut self, v: &mut f32) -> Result<(), WireError> {
        match self.direction {
            Direction::Write => self.cursor.write_f32(*v),
            Direction::Read => *v = self.cursor.read_f32()?,
        }
        Ok(())
    }

    /// Binds an `f64` by bit pattern.
    pub fn bind_f64(&mut self, v: &mut f64) -> Result<(), WireError> {
        match self.direction {
            Direction::Write => self.cursor.write_f64(*v),
            Direction::Read => *v = self.cursor.read_f64()?,
        }
        Ok(())
    }

    /// Binds a `bool`.
    pub fn bind_bool(&mut self, v: &mut bool) -> Result<(), WireError> {
        match self.direction {
            Direction::Write => self.cursor.write_bool(*v),
            Direction::Read => *v = self.cursor.read_bool()?,
        }
        Ok(())
    }

    /// Binds a `u32` as a varint.
    pub fn bind_varint_u32(&mut self, v: &mut u32) -> Result<(), WireError> {
        match self.direction {
            Direction::Write => self.cursor.write_varint_u32(*v),
            Direction::Read => *v = self.cursor.read_varint_u32()?,
        }
        Ok(())
    }

    /// Binds a `u64` as a varint.
    pub fn bind_varint_u64(&mut self, v: &mut u64) -> Result<(), WireError> {
        match self.direction {
            Direction::Write => self.cursor.write_varint_u64(*v),
            Direction::Read => *v = self.cursor.read_varint_u64()?,
        }
        Ok(())
    }

    /// Binds a length-prefixed string.
    pub fn bind_string(&mut self, v: &mut String) -> Result<(), WireError> {
        match self.direction {
            Direction::Write => self.cursor.write_str(v),
            Direction::Read => *v = self.cursor.read_string()?,
        }
        Ok(())
    }

    /// Binds a length-prefixed raw byte run.
    pub fn bind_bytes(&mut self, v: &mut Vec<u8>) -> Result<(), WireError> {
        match self.direction {
            Direction::Write => self.cursor.write_bytes(v),
            Direction::Read => *v = self.cursor.read_bytes()?,
        }
        Ok(())
    }

    /// Binds a homogeneous collection: a varint length, then each element
    /// through `each`. Reading resizes the vector with defaults first.
    pub fn bind_vec_with<T, F>(
        &mut self,
        items: &mut Vec<T>,
        mut each: F,
    ) -> Result<(), SerializationMismatch>
    where
        T: Default,
        F: FnMut(&mut Self, &mut T) -> Result<(), SerializationMismatch>,
    {
        let mut len = items.len() as u64;
        self.bind_varint_u64(&mut len)?;
        if self.is_reading() {
            let len = usize::try_from(len).map_err(|_| WireError::VarintOverflow)?;
            items.clear();
            items.resize_with(len, T::default);
        }
        for item in items.iter_mut() {
            each(self, item)?;
        }
        Ok(())
    }

    /// Binds an optional wrapper: a presence flag, then the value.
    /// Reading materializes a default before descending into `inner`.
    pub fn bind_option_with<T, F>(
        &mut self,
        slot: &mut Option<T>,
        inner: F,
    ) -> Result<(), SerializationMismatch>
    where
        T: Default,
        F: FnOnce(&mut Self, &mut T) -> Result<(), SerializationMismatch>,
    {
        let mut present = slot.is_some();
        self.bind_bool(&mut present)?;
        if self.is_reading() {
            *slot = present.then(T::default);
        }
        match slot {
            Some(value) => inner(self, value),
            None => Ok(()),
        }
    }

    /// Binds a polymorphic reference: a `u16` discriminator into the
    /// shared type catalog, then the value's body through its resolved
    /// chain. `None` is encoded as the reserved discriminator.
    pub fn bind_object(
        &mut self,
        slot: &mut Option<Box<dyn SyncValue>>,
    ) -> Result<(), SerializationMismatch> {
        match self.direction {
            Direction::Write => match slot {
                None => {
                    self.cursor.write_u16(NONE_DISCRIMINATOR);
                    Ok(())
                }
                Some(value) => {
                    let desc = value.desc();
                    let index = self.catalog.index_of(desc.tag).ok_or(
                        SerializationMismatch::NotCataloged {
                            type_name: desc.name,
                        },
                    )?;
                    self.cursor.write_u16(index);
                    self.sync_value(&mut **value)
                }
            },
            Direction::Read => {
                let index = self.cursor.read_u16()?;
                if index == NONE_DISCRIMINATOR {
                    *slot = None;
                    return Ok(());
                }
                let desc = self
                    .catalog
                    .desc_at(index)
                    .ok_or(SerializationMismatch::UnknownDiscriminator { index })?;
                let mut value = self.registry.construct(desc).ok_or(
                    SerializationMismatch::NotConstructible {
                        type_name: desc.name,
                    },
                )?;
                self.sync_value(&mut *value)?;
                *slot = Some(value);
                Ok(())
            }
        }
    }

    /// Runs the resolved codec chain for `value`.
    ///
    /// The entry point is captured before each codec attempt; a codec that
    /// declines leaves no trace on the cursor and the next codec in the
    /// chain runs. A fully exhausted chain is a hard failure.
    pub fn sync_value(&mut self, value: &mut dyn SyncValue) -> Result<(), SerializationMismatch> {
        let chain = self.registry.resolve(value.desc())?;
        for codec in &chain {
            let entry = self.cursor.position();
            match codec.sync(self, value)? {
                CodecOutcome::Handled => return Ok(()),
                CodecOutcome::NotHandled => self.rewind(entry),
            }
        }
        Err(SerializationMismatch::Unhandled {
            type_name: value.desc().name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desc::{TypeDesc, TypeTag};
    use crate::registry::{Codec, RegistrationKind};
    use std::any::Any;
    use std::sync::Arc;

    const SCALAR_DESC: TypeDesc = TypeDesc::leaf("Scalar", TypeTag(1));
    const LABEL_DESC: TypeDesc = TypeDesc::leaf("Label", TypeTag(2));

    #[derive(Debug, Default, PartialEq)]
    struct Scalar {
        value: u32,
    }

    impl SyncValue for Scalar {
        fn desc(&self) -> &'static TypeDesc {
            &SCALAR_DESC
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Label {
        text: String,
    }

    impl SyncValue for Label {
        fn desc(&self) -> &'static TypeDesc {
            &LABEL_DESC
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct ScalarCodec;

    impl Codec for ScalarCodec {
        fn sync(
            &self,
            worker: &mut SyncWorker<'_>,
            value: &mut dyn SyncValue,
        ) -> Result<CodecOutcome, SerializationMismatch> {
            let Some(scalar) = value.as_any_mut().downcast_mut::<Scalar>() else {
                return Ok(CodecOutcome::NotHandled);
            };
            worker.bind_u32(&mut scalar.value)?;
            Ok(CodecOutcome::Handled)
        }
    }

    struct LabelCodec;

    impl Codec for LabelCodec {
        fn sync(
            &self,
            worker: &mut SyncWorker<'_>,
            value: &mut dyn SyncValue,
        ) -> Result<CodecOutcome, SerializationMismatch> {
            let Some(label) = value.as_any_mut().downcast_mut::<Label>() else {
                return Ok(CodecOutcome::NotHandled);
            };
            worker.bind_string(&mut label.text)?;
            Ok(CodecOutcome::Handled)
        }
    }

    /// Touches the cursor, then declines. Exercises the rewind path.
    struct MessyDecliner;

    impl Codec for MessyDecliner {
        fn sync(
            &self,
            worker: &mut SyncWorker<'_>,
            _value: &mut dyn SyncValue,
        ) -> Result<CodecOutcome, SerializationMismatch> {
            match worker.direction() {
                Direction::Write => {
                    let mut junk = 0xdeadu16;
                    worker.bind_u16(&mut junk)?;
                }
                Direction::Read => {
                    // Consuming nothing would also be legal; consume a byte
                    // to prove the rewind restores it.
                    if let Err(e) = worker.cursor.read_u8() {
                        return Err(e.into());
                    }
                }
            }
            Ok(CodecOutcome::NotHandled)
        }
    }

    fn setup() -> (SyncRegistry, TypeCatalog) {
        let mut registry = SyncRegistry::new();
        registry.register(&SCALAR_DESC, Arc::new(ScalarCodec), RegistrationKind::Explicit);
        registry.register(&LABEL_DESC, Arc::new(LabelCodec), RegistrationKind::Explicit);
        registry.register_constructor(&SCALAR_DESC, || Box::<Scalar>::default());
        registry.register_constructor(&LABEL_DESC, || Box::<Label>::default());

        let mut catalog = TypeCatalog::new();
        catalog.register(&SCALAR_DESC);
        catalog.register(&LABEL_DESC);
        (registry, catalog)
    }

    #[test]
    fn symmetric_round_trip() {
        let (registry, catalog) = setup();
        let mut cursor = ByteCursor::new();
        let mut original = Scalar { value: 77 };
        SyncWorker::writer(&mut cursor, &registry, &catalog)
            .sync_value(&mut original)
            .unwrap();

        let mut cursor = ByteCursor::from_bytes(cursor.into_bytes());
        let mut decoded = Scalar::default();
        SyncWorker::reader(&mut cursor, &registry, &catalog)
            .sync_value(&mut decoded)
            .unwrap();
        assert_eq!(decoded, original);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn declining_codec_leaves_no_trace_in_either_direction() {
        // A messy decliner ahead of the accepting codec in Scalar's chain.
        let mut registry = SyncRegistry::new();
        registry.register(&SCALAR_DESC, Arc::new(MessyDecliner), RegistrationKind::Explicit);
        registry.register(&SCALAR_DESC, Arc::new(ScalarCodec), RegistrationKind::Explicit);
        let catalog = TypeCatalog::new();

        let mut cursor = ByteCursor::new();
        let mut original = Scalar { value: 41 };
        SyncWorker::writer(&mut cursor, &registry, &catalog)
            .sync_value(&mut original)
            .unwrap();
        // Only the accepting codec's four bytes survive.
        assert_eq!(cursor.len(), 4);

        let mut cursor = ByteCursor::from_bytes(cursor.into_bytes());
        let mut decoded = Scalar::default();
        SyncWorker::reader(&mut cursor, &registry, &catalog)
            .sync_value(&mut decoded)
            .unwrap();
        assert_eq!(decoded.value, 41);
    }

    #[test]
    fn exhausted_chain_is_a_hard_failure() {
        let mut registry = SyncRegistry::new();
        registry.register(&SCALAR_DESC, Arc::new(MessyDecliner), RegistrationKind::Explicit);
        let catalog = TypeCatalog::new();

        let mut cursor = ByteCursor::new();
        let err = SyncWorker::writer(&mut cursor, &registry, &catalog)
            .sync_value(&mut Scalar { value: 1 })
            .unwrap_err();
        assert!(matches!(err, SerializationMismatch::Unhandled { .. }));
        // Nothing was committed to the buffer.
        assert!(cursor.is_empty());
    }

    #[test]
    fn polymorphic_round_trip_restores_the_concrete_type() {
        let (registry, catalog) = setup();
        let mut cursor = ByteCursor::new();
        let mut slot: Option<Box<dyn SyncValue>> = Some(Box::new(Label {
            text: "outpost".to_string(),
        }));
        SyncWorker::writer(&mut cursor, &registry, &catalog)
            .bind_object(&mut slot)
            .unwrap();

        let mut cursor = ByteCursor::from_bytes(cursor.into_bytes());
        let mut decoded: Option<Box<dyn SyncValue>> = None;
        SyncWorker::reader(&mut cursor, &registry, &catalog)
            .bind_object(&mut decoded)
            .unwrap();

        let label = decoded
            .unwrap()
            .as_any()
            .downcast_ref::<Label>()
            .map(|l| l.text.clone());
        assert_eq!(label.as_deref(), Some("outpost"));
    }

    #[test]
    fn none_reference_round_trips() {
        let (registry, catalog) = setup();
        let mut cursor = ByteCursor::new();
        let mut slot: Option<Box<dyn SyncValue>> = None;
        SyncWorker::writer(&mut cursor, &registry, &catalog)
            .bind_object(&mut slot)
            .unwrap();

        let mut cursor = ByteCursor::from_bytes(cursor.into_bytes());
        let mut decoded: Option<Box<dyn SyncValue>> =
            Some(Box::new(Scalar { value: 9 }));
        SyncWorker::reader(&mut cursor, &registry, &catalog)
            .bind_object(&mut decoded)
            .unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn unknown_discriminator_is_rejected() {
        let (registry, catalog) = setup();
        let mut cursor = ByteCursor::new();
        cursor.write_u16(40_000);
        let mut cursor = ByteCursor::from_bytes(cursor.into_bytes());
        let mut slot: Option<Box<dyn SyncValue>> = None;
        let err = SyncWorker::reader(&mut cursor, &registry, &catalog)
            .bind_object(&mut slot)
            .unwrap_err();
        assert_eq!(
            err,
            SerializationMismatch::UnknownDiscriminator { index: 40_000 }
        );
    }

    #[test]
    fn vec_and_option_composites_round_trip() {
        let (registry, catalog) = setup();
        let mut cursor = ByteCursor::new();
        let mut items = vec![1u32, 2, 3];
        let mut maybe: Option<u32> = Some(7);
        {
            let mut worker = SyncWorker::writer(&mut cursor, &registry, &catalog);
            worker
                .bind_vec_with(&mut items, |w, v| Ok(w.bind_u32(v)?))
                .unwrap();
            worker
                .bind_option_with(&mut maybe, |w, v| Ok(w.bind_u32(v)?))
                .unwrap();
        }

        let mut cursor = ByteCursor::from_bytes(cursor.into_bytes());
        let mut decoded_items: Vec<u32> = Vec::new();
        let mut decoded_maybe: Option<u32> = None;
        {
            let mut worker = SyncWorker::reader(&mut cursor, &registry, &catalog);
            worker
                .bind_vec_with(&mut decoded_items, |w, v| Ok(w.bind_u32(v)?))
                .unwrap();
            worker
                .bind_option_with(&mut decoded_maybe, |w, v| Ok(w.bind_u32(v)?))
                .unwrap();
        }
        assert_eq!(decoded_items, vec![1, 2, 3]);
        assert_eq!(decoded_maybe, Some(7));
    }
}
