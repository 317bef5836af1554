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

//! Session-layer behavior inside the running tick loop: pause gating,
//! tick-driven expiry, and command execution continuing under pause.

use cadence_control::{
    CommandExecutor, NoHooks, Scheduler, Session, SessionId, SessionTickOutcome,
};
use cadence_core::{
    CommandFault, CommandKind, EngineConfig, IssuerId, ScheduledCommand, SimulationFault, Tick,
    Timeline, TimelineContext, TimelineDriver, TimelineId,
};
use cadence_wire::{TypeDesc, TypeTag};
use std::any::Any;
use std::sync::{Arc, Mutex};

const WAIT_DESC: TypeDesc = TypeDesc::leaf("WaitSession", TypeTag(910));

/// Pauses its owner timeline until its countdown expires, then removes
/// itself.
struct WaitSession {
    id: SessionId,
    owner: TimelineId,
    remaining_ticks: u32,
}

impl Session for WaitSession {
    fn id(&self) -> SessionId {
        self.id
    }
    fn desc(&self) -> &'static TypeDesc {
        &WAIT_DESC
    }
    fn owner(&self) -> Option<TimelineId> {
        Some(self.owner)
    }
    fn conflicts_with(&self, candidate: &dyn Session) -> bool {
        candidate.desc().tag == self.desc().tag
    }
    fn is_pausing(&self, timeline: TimelineId) -> bool {
        timeline == self.owner
    }
    fn wants_tick(&self) -> bool {
        true
    }
    fn tick(&mut self) -> SessionTickOutcome {
        if self.remaining_ticks == 0 {
            return SessionTickOutcome::RemoveSelf;
        }
        self.remaining_ticks -= 1;
        SessionTickOutcome::Continue
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct CountingDriver;

impl TimelineDriver for CountingDriver {
    fn advance(&mut self, _ctx: &mut TimelineContext<'_>) -> Result<(), SimulationFault> {
        Ok(())
    }
}

struct MarkExecutor {
    marks: Arc<Mutex<Vec<u64>>>,
}

impl CommandExecutor for MarkExecutor {
    fn execute(
        &mut self,
        command: &ScheduledCommand,
        _timeline: &mut Timeline,
    ) -> Result<(), CommandFault> {
        self.marks.lock().unwrap().push(command.due.get());
        Ok(())
    }
}

fn build_scheduler() -> (Scheduler, Arc<Mutex<Vec<u64>>>) {
    let marks = Arc::new(Mutex::new(Vec::new()));
    let executor = MarkExecutor {
        marks: marks.clone(),
    };
    let mut scheduler = Scheduler::new(
        EngineConfig::default(),
        Box::new(executor),
        Box::new(NoHooks),
    );
    scheduler.add_timeline(TimelineId::WORLD, 0x5EED, Box::new(CountingDriver));
    scheduler.start();
    (scheduler, marks)
}

#[test]
fn pausing_session_gates_advancement_but_not_commands() {
    let (mut scheduler, marks) = build_scheduler();

    scheduler.sessions_mut().try_add(Box::new(WaitSession {
        id: SessionId(1),
        owner: TimelineId::WORLD,
        remaining_ticks: u32::MAX,
    }));
    scheduler
        .enqueue_command(ScheduledCommand {
            target: TimelineId::WORLD,
            due: Tick::new(2),
            issuer: IssuerId(1),
            kind: CommandKind(1),
            payload: Vec::new(),
        })
        .unwrap();

    scheduler.step(5).unwrap();

    // The global clock ran and the command executed at its tick, but the
    // paused timeline performed no simulated activity.
    assert_eq!(scheduler.current_tick(), Tick::new(5));
    assert_eq!(*marks.lock().unwrap(), vec![2]);
    assert_eq!(
        scheduler
            .timeline(TimelineId::WORLD)
            .unwrap()
            .elapsed_ticks(),
        Tick::ZERO
    );
}

#[test]
fn expiring_session_releases_its_timeline() {
    let (mut scheduler, _) = build_scheduler();

    scheduler.sessions_mut().try_add(Box::new(WaitSession {
        id: SessionId(1),
        owner: TimelineId::WORLD,
        remaining_ticks: 3,
    }));

    scheduler.step(10).unwrap();

    // The session held the timeline for its countdown (3 serviced ticks
    // plus the removal tick), then advancement resumed.
    assert!(scheduler.sessions().is_empty());
    let elapsed = scheduler
        .timeline(TimelineId::WORLD)
        .unwrap()
        .elapsed_ticks();
    assert_eq!(elapsed, Tick::new(6));
}

#[test]
fn explicit_removal_releases_immediately() {
    let (mut scheduler, _) = build_scheduler();

    scheduler.sessions_mut().try_add(Box::new(WaitSession {
        id: SessionId(1),
        owner: TimelineId::WORLD,
        remaining_ticks: u32::MAX,
    }));
    scheduler.step(4).unwrap();
    assert!(scheduler.sessions_mut().remove(SessionId(1)));

    scheduler.step(4).unwrap();
    assert_eq!(
        scheduler
            .timeline(TimelineId::WORLD)
            .unwrap()
            .elapsed_ticks(),
        Tick::new(4)
    );
}
