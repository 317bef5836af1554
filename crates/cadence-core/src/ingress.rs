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

//! The command ingress bus.
//!
//! New commands may arrive from outside (the network layer) at any time;
//! everything else in the core runs on one logical thread. This bus is the
//! single crossing point: cloneable [`CommandSender`]s for the transport
//! side, one consumer drained by the scheduler at tick boundaries.

use crate::command::ScheduledCommand;

/// Thread-safe channel carrying externally issued commands into the core.
#[derive(Debug)]
pub struct CommandBus {
    sender: flume::Sender<ScheduledCommand>,
    receiver: flume::Receiver<ScheduledCommand>,
}

impl CommandBus {
    /// Creates a new bus with an unbounded channel.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        log::info!("Command ingress bus initialized.");
        Self { sender, receiver }
    }

    /// Returns a clone of the sender end for a transport-side producer.
    #[must_use]
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            sender: self.sender.clone(),
        }
    }

    /// Drains every command currently buffered, in arrival order.
    ///
    /// Called by the scheduler at tick boundaries only; the relative order
    /// of commands from a single producer is preserved.
    pub fn drain(&self) -> Vec<ScheduledCommand> {
        self.receiver.try_iter().collect()
    }

    /// Number of commands currently buffered.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

/// The producer half of the [`CommandBus`].
#[derive(Debug, Clone)]
pub struct CommandSender {
    sender: flume::Sender<ScheduledCommand>,
}

impl CommandSender {
    /// Submits a command, logging an error if the core has shut down.
    pub fn submit(&self, command: ScheduledCommand) {
        log::trace!("Submitting {command}");
        if let Err(e) = self.sender.send(command) {
            log::error!("Failed to submit command: {e}. Core likely shut down.");
        }
    }
}
