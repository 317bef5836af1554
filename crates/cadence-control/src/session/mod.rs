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

//! Long-lived interactive processes layered over the tick loop.
//!
//! A session is created by an authoritative command and destroyed by
//! explicit removal or by failing its validity check during a sweep.
//! Conflicting sessions never coexist: [`SessionManager::try_add`] returns
//! the pre-existing instance instead of inserting a second one, which is
//! how concurrently initiated modal interactions reconcile without
//! breaking the single-writer invariant.

pub mod stream;

use cadence_core::TimelineId;
use cadence_wire::{SerializationMismatch, SyncWorker, TypeDesc};
use std::any::Any;
use std::fmt;

/// Identifier of a session, unique within a run and stable across the
/// join-in-progress stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SessionId(pub i32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// How a session participates in persistence.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionPersistence {
    /// In-memory only; revalidated every sweep and dropped silently when
    /// invalid.
    Ephemeral,
    /// Flows through the host's full object-graph save, external to this
    /// core.
    Persisted,
    /// Flows through the resumable join-in-progress stream only.
    SemiPersisted,
}

/// What a tick-driven session wants done with itself after a tick.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionTickOutcome {
    /// Keep going.
    Continue,
    /// Remove this session now, firing its lifecycle hook.
    RemoveSelf,
}

/// A long-lived, possibly pausing, possibly persisted interactive process.
pub trait Session: Send {
    /// This session's identifier.
    fn id(&self) -> SessionId;

    /// The session type's descriptor, for the shared session-type catalog.
    fn desc(&self) -> &'static TypeDesc;

    /// How this session persists.
    fn persistence(&self) -> SessionPersistence {
        SessionPersistence::Ephemeral
    }

    /// The timeline this session belongs to, if any.
    fn owner(&self) -> Option<TimelineId> {
        None
    }

    /// Whether the session's preconditions still hold. Checked every
    /// sweep; a failing session is removed.
    fn is_still_valid(&self) -> bool {
        true
    }

    /// Whether this session cannot coexist with `candidate`.
    fn conflicts_with(&self, candidate: &dyn Session) -> bool;

    /// Whether this session is currently pausing `timeline`.
    fn is_pausing(&self, timeline: TimelineId) -> bool {
        let _ = timeline;
        false
    }

    /// Whether this session wants per-tick servicing.
    fn wants_tick(&self) -> bool {
        false
    }

    /// One tick of servicing, for sessions that want it.
    fn tick(&mut self) -> SessionTickOutcome {
        SessionTickOutcome::Continue
    }

    /// Lifecycle hook fired exactly once when the session is detached.
    fn on_removed(&mut self) {}

    /// Binds the session's semi-persisted fields for the join-in-progress
    /// stream, in the same order in both directions.
    fn sync_body(&mut self, worker: &mut SyncWorker<'_>) -> Result<(), SerializationMismatch> {
        let _ = worker;
        Ok(())
    }

    /// Allows downcasting to the concrete session type.
    fn as_any(&self) -> &dyn Any;

    /// Allows mutable downcasting to the concrete session type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Outcome of [`SessionManager::try_add`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// The candidate was inserted.
    Accepted(SessionId),
    /// An active session conflicts; its id is returned and nothing was
    /// inserted.
    Conflicting(SessionId),
}

/// Tracks all active sessions and enforces their mutual-exclusion
/// invariants.
#[derive(Default)]
pub struct SessionManager {
    sessions: Vec<Box<dyn Session>>,
}

impl SessionManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session unless an active one conflicts with it.
    ///
    /// Every active session is asked about the candidate; the first that
    /// reports a conflict wins and its id is returned, with the candidate
    /// dropped un-inserted. Callers resume the existing interaction
    /// instead of opening a duplicate.
    pub fn try_add(&mut self, candidate: Box<dyn Session>) -> AddOutcome {
        for existing in &self.sessions {
            if existing.conflicts_with(&*candidate) {
                log::debug!(
                    "Session {} conflicts with active {}; not inserting",
                    candidate.id(),
                    existing.id()
                );
                return AddOutcome::Conflicting(existing.id());
            }
        }
        let id = candidate.id();
        log::debug!("Session {id} accepted ({:?})", candidate.persistence());
        self.sessions.push(candidate);
        AddOutcome::Accepted(id)
    }

    /// Removes a session by id, firing its lifecycle hook.
    ///
    /// Returns `false` when no such session is active, which makes
    /// redundant removal harmless: the hook cannot fire twice because the
    /// session is gone after the first call.
    pub fn remove(&mut self, id: SessionId) -> bool {
        match self.sessions.iter().position(|s| s.id() == id) {
            Some(index) => {
                let mut session = self.sessions.remove(index);
                session.on_removed();
                log::debug!("Session {id} removed");
                true
            }
            None => false,
        }
    }

    /// Services tick-driven sessions, in reverse registration order so a
    /// session that removes itself cannot skip or double-service another.
    pub fn tick(&mut self) {
        for index in (0..self.sessions.len()).rev() {
            if !self.sessions[index].wants_tick() {
                continue;
            }
            if self.sessions[index].tick() == SessionTickOutcome::RemoveSelf {
                let mut session = self.sessions.remove(index);
                session.on_removed();
                log::debug!("Session {} removed itself during tick", session.id());
            }
        }
    }

    /// Drops every session whose validity check fails, firing lifecycle
    /// hooks. Ephemeral sessions are expected to go this way; it is not
    /// an error.
    pub fn sweep(&mut self) {
        for index in (0..self.sessions.len()).rev() {
            if self.sessions[index].is_still_valid() {
                continue;
            }
            let mut session = self.sessions.remove(index);
            session.on_removed();
            log::debug!("Session {} dropped by validity sweep", session.id());
        }
    }

    /// Whether any active session is currently pausing `timeline`.
    ///
    /// A pure query evaluated fresh on every call; pause predicates may
    /// depend on state that changes between any two ticks, so nothing is
    /// cached.
    #[must_use]
    pub fn is_any_pausing(&self, timeline: TimelineId) -> bool {
        self.sessions.iter().any(|s| s.is_pausing(timeline))
    }

    /// The active session with the given id, if any.
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<&dyn Session> {
        self.sessions
            .iter()
            .find(|s| s.id() == id)
            .map(|s| &**s as &dyn Session)
    }

    /// Iterates active sessions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Session> {
        self.sessions.iter().map(|s| &**s as &dyn Session)
    }

    /// Iterates active sessions mutably, in registration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Session>> {
        self.sessions.iter_mut()
    }

    /// Number of active sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if no sessions are active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Removes every session, firing lifecycle hooks. Used on teardown.
    pub fn clear(&mut self) {
        for mut session in self.sessions.drain(..) {
            session.on_removed();
        }
    }
}
