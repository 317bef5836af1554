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

//! # Cadence Core
//!
//! Foundational crate containing the tick/time types, the timeline model,
//! the command contracts, and the error hierarchy that the scheduler and
//! the wire layer build on.

#![warn(missing_docs)]

pub mod command;
pub mod config;
pub mod error;
pub mod ingress;
pub mod queue;
pub mod random;
pub mod time;
pub mod timeline;

pub use command::{CommandKind, IssuerId, ScheduledCommand, TimelineId};
pub use config::EngineConfig;
pub use error::{CommandFault, ProtocolError, SimulationFault};
pub use ingress::{CommandBus, CommandSender};
pub use queue::CommandQueue;
pub use random::DeterministicRng;
pub use time::{Tick, TickSpan};
pub use timeline::{TimeSpeed, Timeline, TimelineContext, TimelineDriver};
