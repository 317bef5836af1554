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

//! # Cadence Control
//!
//! The control loop of the synchronization core: the scheduler that
//! converts real time into simulated ticks and executes commands in a fixed
//! global order, and the session manager that reconciles concurrently
//! initiated modal interactions on top of it.

#![warn(missing_docs)]

pub mod pacing;
pub mod scheduler;
pub mod session;

pub use pacing::TickPacer;
pub use scheduler::{
    CommandExecutor, DesyncDetails, NoHooks, PumpError, PumpReport, Scheduler, SchedulerHooks,
    SchedulerState, SchedulerStatus,
};
pub use session::stream::{read_join_stream, write_join_stream, SessionTypeCatalog};
pub use session::{
    AddOutcome, Session, SessionId, SessionManager, SessionPersistence, SessionTickOutcome,
};
