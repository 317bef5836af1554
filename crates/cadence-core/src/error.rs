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

//! Defines the hierarchy of error types for the synchronization core.
//!
//! The split mirrors the failure semantics of the tick loop: a
//! [`ProtocolError`] poisons a command stream and is fatal to it, a
//! [`SimulationFault`] is isolated to one timeline for one tick, and a
//! [`CommandFault`] must propagate so that every participant fails
//! identically or not at all.

use crate::command::{CommandKind, TimelineId};
use crate::time::Tick;
use std::fmt;

/// A malformed or out-of-order command stream.
///
/// Fatal to the affected stream and never silently retried: retrying cannot
/// restore determinism once ordering has been violated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A command arrived for a tick the target timeline has already passed.
    CommandInPast {
        /// The timeline the command targeted.
        timeline: TimelineId,
        /// The tick the command was due at.
        due: Tick,
        /// The tick the timeline had already reached.
        current: Tick,
    },
    /// A command addressed a timeline the scheduler does not know.
    UnknownTimeline {
        /// The unknown timeline id.
        timeline: TimelineId,
    },
    /// A session-type index outside the shared session catalog, on a path
    /// where it cannot be skipped.
    UnknownSessionType {
        /// The out-of-catalog index.
        index: u16,
    },
    /// A command frame that could not be decoded.
    MalformedFrame(String),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::CommandInPast {
                timeline,
                due,
                current,
            } => write!(
                f,
                "command for {timeline} due at {due} arrived after the timeline reached {current}"
            ),
            ProtocolError::UnknownTimeline { timeline } => {
                write!(f, "command addressed unknown {timeline}")
            }
            ProtocolError::UnknownSessionType { index } => {
                write!(f, "session type index {index} is not in the shared catalog")
            }
            ProtocolError::MalformedFrame(msg) => {
                write!(f, "malformed command frame: {msg}")
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

/// An error raised during a timeline's ordinary per-tick advancement.
///
/// Isolated to that timeline: the scheduler logs it, reports it through a
/// hook, and keeps advancing the other timelines and subsequent ticks so one
/// faulty subsystem cannot freeze the whole session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationFault {
    /// The timeline whose advancement failed.
    pub timeline: TimelineId,
    /// The timeline-local tick at which advancement failed.
    pub tick: Tick,
    /// Human-readable description from the domain driver.
    pub message: String,
}

impl fmt::Display for SimulationFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "advancement of {} failed at {}: {}",
            self.timeline, self.tick, self.message
        )
    }
}

impl std::error::Error for SimulationFault {}

/// An error raised while executing a scheduled command.
///
/// Never locally recovered: swallowing it would let participants diverge
/// (some throwing, some not, or at different points), so it surfaces as a
/// top-level tick-loop failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFault {
    /// The timeline the command executed against.
    pub timeline: TimelineId,
    /// The command discriminator.
    pub kind: CommandKind,
    /// The tick the command was due at.
    pub due: Tick,
    /// Human-readable description from the command executor.
    pub message: String,
}

impl fmt::Display for CommandFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "command kind={} on {} at {} failed: {}",
            self.kind.0, self.timeline, self.due, self.message
        )
    }
}

impl std::error::Error for CommandFault {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_display() {
        let err = ProtocolError::CommandInPast {
            timeline: TimelineId(2),
            due: Tick::new(5),
            current: Tick::new(8),
        };
        assert_eq!(
            format!("{err}"),
            "command for timeline#2 due at T5 arrived after the timeline reached T8"
        );
    }

    #[test]
    fn command_fault_display() {
        let err = CommandFault {
            timeline: TimelineId::WORLD,
            kind: CommandKind(7),
            due: Tick::new(12),
            message: "no such designation".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "command kind=7 on timeline#0 at T12 failed: no such designation"
        );
    }
}
