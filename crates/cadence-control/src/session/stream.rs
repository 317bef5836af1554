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

//! The resumable join-in-progress session stream.
//!
//! Layout: `{count: i32, then per semi-persisted session: {type_index: u16,
//! session_id: i32, body_len: i32, body bytes}}`. Bodies are
//! length-prefixed so a reader that does not know a type index can skip
//! that session and keep the rest of the stream, instead of misreading
//! everything after it.

use crate::session::{Session, SessionId, SessionManager, SessionPersistence};
use cadence_wire::{
    ByteCursor, SerializationMismatch, SyncRegistry, SyncWorker, TypeCatalog, TypeDesc, TypeTag,
    WireError,
};
use std::collections::HashMap;

/// Constructs an empty session of a cataloged type for the stream reader
/// to fill in.
pub type SessionConstructFn = fn(SessionId) -> Box<dyn Session>;

struct SessionTypeEntry {
    desc: &'static TypeDesc,
    construct: SessionConstructFn,
}

/// The shared ordered session-type catalog.
///
/// Like the value-type catalog, every participant must build it in the
/// same order or type indices stop agreeing across the stream boundary.
#[derive(Default)]
pub struct SessionTypeCatalog {
    entries: Vec<SessionTypeEntry>,
    index: HashMap<TypeTag, u16>,
}

impl SessionTypeCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a session type, returning its stream index.
    pub fn register(&mut self, desc: &'static TypeDesc, construct: SessionConstructFn) -> u16 {
        if let Some(&existing) = self.index.get(&desc.tag) {
            log::warn!(
                "SessionTypeCatalog: '{}' already cataloged at index {existing}",
                desc.name
            );
            return existing;
        }
        let index =
            u16::try_from(self.entries.len()).expect("session type catalog exceeds u16 indices");
        self.entries.push(SessionTypeEntry { desc, construct });
        self.index.insert(desc.tag, index);
        index
    }

    /// The stream index of a session type, if cataloged.
    #[must_use]
    pub fn index_of(&self, tag: TypeTag) -> Option<u16> {
        self.index.get(&tag).copied()
    }

    /// Number of cataloged session types.
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

/// Writes every semi-persisted session to the join-in-progress stream.
pub fn write_join_stream(
    manager: &mut SessionManager,
    types: &SessionTypeCatalog,
    registry: &SyncRegistry,
    catalog: &TypeCatalog,
    cursor: &mut ByteCursor,
) -> Result<(), SerializationMismatch> {
    let count = manager
        .iter()
        .filter(|s| s.persistence() == SessionPersistence::SemiPersisted)
        .count();
    let count = i32::try_from(count)
        .map_err(|_| SerializationMismatch::Wire(WireError::ValueOutOfRange {
            what: "session count",
        }))?;
    cursor.write_i32(count);

    for session in manager.iter_mut() {
        if session.persistence() != SessionPersistence::SemiPersisted {
            continue;
        }
        let desc = session.desc();
        let type_index =
            types
                .index_of(desc.tag)
                .ok_or(SerializationMismatch::NotCataloged {
                    type_name: desc.name,
                })?;

        // Encode the body into its own buffer first so the length prefix
        // is known before anything lands in the stream.
        let mut body = ByteCursor::new();
        {
            let mut worker = SyncWorker::writer(&mut body, registry, catalog);
            session.sync_body(&mut worker)?;
        }
        let body = body.into_bytes();
        let body_len = i32::try_from(body.len()).map_err(|_| {
            SerializationMismatch::Wire(WireError::ValueOutOfRange {
                what: "session body length",
            })
        })?;

        cursor.write_u16(type_index);
        cursor.write_i32(session.id().0);
        cursor.write_i32(body_len);
        cursor.write_raw(&body);
    }
    Ok(())
}

/// Reads a join-in-progress stream back into live sessions.
///
/// A type index outside the catalog is not fatal: the session's
/// length-prefixed body is skipped with a warning and the remainder of
/// the stream decodes normally. Everything else fails hard.
pub fn read_join_stream(
    cursor: &mut ByteCursor,
    types: &SessionTypeCatalog,
    registry: &SyncRegistry,
    catalog: &TypeCatalog,
) -> Result<Vec<Box<dyn Session>>, SerializationMismatch> {
    let count = cursor.read_i32()?;
    if count < 0 {
        return Err(SerializationMismatch::Wire(WireError::ValueOutOfRange {
            what: "session count",
        }));
    }

    let mut sessions: Vec<Box<dyn Session>> = Vec::new();
    for _ in 0..count {
        let type_index = cursor.read_u16()?;
        let session_id = SessionId(cursor.read_i32()?);
        let body_len = cursor.read_i32()?;
        if body_len < 0 {
            return Err(SerializationMismatch::Wire(WireError::ValueOutOfRange {
                what: "session body length",
            }));
        }
        let body = cursor.read_raw(body_len as usize)?;

        let Some(entry) = types.entries.get(usize::from(type_index)) else {
            log::warn!(
                "Unknown session type index {type_index} for {session_id}; \
                 skipping {body_len} body bytes"
            );
            continue;
        };

        let mut session = (entry.construct)(session_id);
        let mut body_cursor = ByteCursor::from_bytes(body);
        {
            let mut worker = SyncWorker::reader(&mut body_cursor, registry, catalog);
            session.sync_body(&mut worker)?;
        }
        if body_cursor.remaining() > 0 {
            log::warn!(
                "Session {session_id} ('{}') left {} body byte(s) unread",
                entry.desc.name,
                body_cursor.remaining()
            );
        }
        sessions.push(session);
    }
    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionTickOutcome;
    use cadence_core::TimelineId;
    use std::any::Any;

    const ESCORT_DESC: TypeDesc = TypeDesc::leaf("EscortSession", TypeTag(901));
    const PARLEY_DESC: TypeDesc = TypeDesc::leaf("ParleySession", TypeTag(902));

    #[derive(Debug)]
    struct EscortSession {
        id: SessionId,
        progress: u32,
        destination: String,
    }

    impl EscortSession {
        fn boxed(id: SessionId) -> Box<dyn Session> {
            Box::new(Self {
                id,
                progress: 0,
                destination: String::new(),
            })
        }
    }

    impl Session for EscortSession {
        fn id(&self) -> SessionId {
            self.id
        }
        fn desc(&self) -> &'static TypeDesc {
            &ESCORT_DESC
        }
        fn persistence(&self) -> SessionPersistence {
            SessionPersistence::SemiPersisted
        }
        fn conflicts_with(&self, _candidate: &dyn Session) -> bool {
            false
        }
        fn tick(&mut self) -> SessionTickOutcome {
            SessionTickOutcome::Continue
        }
        fn sync_body(&mut self, worker: &mut SyncWorker<'_>) -> Result<(), SerializationMismatch> {
            worker.bind_u32(&mut self.progress)?;
            worker.bind_string(&mut self.destination)?;
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    /// Ephemeral; must not appear in the stream.
    struct ParleySession {
        id: SessionId,
    }

    impl Session for ParleySession {
        fn id(&self) -> SessionId {
            self.id
        }
        fn desc(&self) -> &'static TypeDesc {
            &PARLEY_DESC
        }
        fn conflicts_with(&self, _candidate: &dyn Session) -> bool {
            false
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
        fn owner(&self) -> Option<TimelineId> {
            Some(TimelineId::WORLD)
        }
    }

    fn wire_setup() -> (SyncRegistry, TypeCatalog) {
        (SyncRegistry::new(), TypeCatalog::new())
    }

    #[test]
    fn stream_round_trip_restores_semi_persisted_sessions_only() {
        let (registry, catalog) = wire_setup();
        let mut types = SessionTypeCatalog::new();
        types.register(&ESCORT_DESC, EscortSession::boxed);

        let mut manager = SessionManager::new();
        manager.try_add(Box::new(EscortSession {
            id: SessionId(11),
            progress: 42,
            destination: "northern pass".to_string(),
        }));
        manager.try_add(Box::new(ParleySession { id: SessionId(12) }));

        let mut cursor = ByteCursor::new();
        write_join_stream(&mut manager, &types, &registry, &catalog, &mut cursor).unwrap();

        let mut cursor = ByteCursor::from_bytes(cursor.into_bytes());
        let restored = read_join_stream(&mut cursor, &types, &registry, &catalog).unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(cursor.remaining(), 0);

        let escort = restored[0].as_any().downcast_ref::<EscortSession>().unwrap();
        assert_eq!(escort.id, SessionId(11));
        assert_eq!(escort.progress, 42);
        assert_eq!(escort.destination, "northern pass");
    }

    /// A semi-persisted session whose type the reader has never heard of.
    struct SemiParley {
        id: SessionId,
    }

    impl Session for SemiParley {
        fn id(&self) -> SessionId {
            self.id
        }
        fn desc(&self) -> &'static TypeDesc {
            &PARLEY_DESC
        }
        fn persistence(&self) -> SessionPersistence {
            SessionPersistence::SemiPersisted
        }
        fn conflicts_with(&self, _candidate: &dyn Session) -> bool {
            false
        }
        fn sync_body(&mut self, worker: &mut SyncWorker<'_>) -> Result<(), SerializationMismatch> {
            let mut filler = 0xfeedu16;
            worker.bind_u16(&mut filler)?;
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn unknown_type_index_is_skipped_not_fatal() {
        let (registry, catalog) = wire_setup();

        // The writer's catalog has one more session type than the
        // reader's, so the Parley record carries an index the reader
        // cannot resolve.
        let mut writer_types = SessionTypeCatalog::new();
        writer_types.register(&ESCORT_DESC, EscortSession::boxed);
        writer_types.register(&PARLEY_DESC, |id| Box::new(SemiParley { id }));

        let mut manager = SessionManager::new();
        manager.try_add(Box::new(SemiParley { id: SessionId(1) }));
        manager.try_add(Box::new(EscortSession {
            id: SessionId(2),
            progress: 7,
            destination: "gate".to_string(),
        }));

        let mut cursor = ByteCursor::new();
        write_join_stream(&mut manager, &writer_types, &registry, &catalog, &mut cursor).unwrap();

        let mut reader_types = SessionTypeCatalog::new();
        reader_types.register(&ESCORT_DESC, EscortSession::boxed);

        // The Parley record is skipped over its length prefix; the Escort
        // record after it still decodes from an aligned cursor.
        let mut cursor = ByteCursor::from_bytes(cursor.into_bytes());
        let restored = read_join_stream(&mut cursor, &reader_types, &registry, &catalog).unwrap();
        assert_eq!(restored.len(), 1);
        let escort = restored[0].as_any().downcast_ref::<EscortSession>().unwrap();
        assert_eq!(escort.id, SessionId(2));
        assert_eq!(escort.destination, "gate");
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn empty_stream_round_trips() {
        let (registry, catalog) = wire_setup();
        let types = SessionTypeCatalog::new();
        let mut manager = SessionManager::new();

        let mut cursor = ByteCursor::new();
        write_join_stream(&mut manager, &types, &registry, &catalog, &mut cursor).unwrap();

        let mut cursor = ByteCursor::from_bytes(cursor.into_bytes());
        let restored = read_join_stream(&mut cursor, &types, &registry, &catalog).unwrap();
        assert!(restored.is_empty());
    }
}
