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

//! The command model: tick-addressed units of deterministic work.
//!
//! A [`ScheduledCommand`] is produced externally (by the transport layer or
//! by local input capture), is immutable once enqueued, and is consumed
//! exactly once by the scheduler. The core never interprets a command's
//! payload; it only decides *when* and *in what relative order* the command
//! executes.

use crate::time::Tick;
use std::fmt;

/// Identifier of a logical simulation timeline.
///
/// Exactly one world timeline exists at a time (id 0 by convention), plus
/// zero or more dependent timelines.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TimelineId(pub u32);

impl TimelineId {
    /// The conventional id of the shared world timeline.
    pub const WORLD: TimelineId = TimelineId(0);
}

impl fmt::Display for TimelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timeline#{}", self.0)
    }
}

/// Identifier of the participant that issued a command.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct IssuerId(pub i32);

/// Discriminates what a command does. Opaque to the core; the host's
/// command executor gives each kind its meaning.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct CommandKind(pub u16);

/// An ordered, tick-addressed unit of deterministic work.
///
/// Immutable once enqueued. The ordering key across a timeline's queue is
/// `(due, enqueue-order)`: commands sharing a due tick execute in arrival
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledCommand {
    /// The timeline this command executes against.
    pub target: TimelineId,
    /// The tick at which the command is due. Executing it at any other tick
    /// would desynchronize participants.
    pub due: Tick,
    /// The participant that issued the command.
    pub issuer: IssuerId,
    /// The command discriminator.
    pub kind: CommandKind,
    /// Argument bytes, produced and consumed exclusively through the
    /// serialization registry for the command's declared argument types.
    pub payload: Vec<u8>,
}

impl fmt::Display for ScheduledCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "command kind={} due={} target={} issuer={} ({} payload bytes)",
            self.kind.0,
            self.due,
            self.target,
            self.issuer.0,
            self.payload.len()
        )
    }
}
