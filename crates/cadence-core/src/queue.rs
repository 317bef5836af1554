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

//! Per-timeline tick-ordered buffer of pending commands.
//!
//! Ordering key is `(due tick, enqueue order)` so that commands sharing a
//! tick execute FIFO. Only the scheduler peeks and dequeues.

use crate::command::ScheduledCommand;
use crate::error::ProtocolError;
use crate::time::Tick;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// A pending command plus the sequence number that breaks due-tick ties.
#[derive(Debug, Clone, PartialEq, Eq)]
struct QueuedCommand {
    due: Tick,
    seq: u64,
    command: ScheduledCommand,
}

impl Ord for QueuedCommand {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due.cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for QueuedCommand {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Tick-ordered queue of pending commands for a single timeline.
#[derive(Debug, Default)]
pub struct CommandQueue {
    heap: BinaryHeap<Reverse<QueuedCommand>>,
    next_seq: u64,
}

impl CommandQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a command.
    ///
    /// A command due before `current` targets a tick the timeline has
    /// already passed; that is a protocol violation and the queue rejects
    /// it rather than letting participants silently diverge.
    pub fn enqueue(
        &mut self,
        command: ScheduledCommand,
        current: Tick,
    ) -> Result<(), ProtocolError> {
        if command.due < current {
            return Err(ProtocolError::CommandInPast {
                timeline: command.target,
                due: command.due,
                current,
            });
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(QueuedCommand {
            due: command.due,
            seq,
            command,
        }));
        Ok(())
    }

    /// Removes and returns the next command due at or before `at`, if any.
    pub fn pop_due(&mut self, at: Tick) -> Option<ScheduledCommand> {
        if self.heap.peek().is_some_and(|Reverse(q)| q.due <= at) {
            self.heap.pop().map(|Reverse(q)| q.command)
        } else {
            None
        }
    }

    /// The due tick of the earliest pending command, if any.
    #[must_use]
    pub fn next_due(&self) -> Option<Tick> {
        self.heap.peek().map(|Reverse(q)| q.due)
    }

    /// Number of pending commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns `true` if no commands are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Discards all pending commands. Used on full teardown.
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
