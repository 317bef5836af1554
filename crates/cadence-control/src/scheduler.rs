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

//! The scheduler: converts real time into simulated ticks, dequeues due
//! commands, executes them in a fixed global order, and manages catch-up
//! and freeze states.
//!
//! Every pump is synchronous and runs to completion. Within one global
//! tick, command execution completes for *all* timelines before any
//! timeline's ordinary advancement begins, so every participant observes
//! commands in identical global order relative to normal ticking. No tick
//! is ever partially executed: the catch-up wall-clock budget and
//! cancellation both take effect at tick boundaries only.

use crate::pacing::TickPacer;
use crate::session::SessionManager;
use cadence_core::{
    CommandBus, CommandFault, CommandSender, EngineConfig, IssuerId, ProtocolError,
    ScheduledCommand, SimulationFault, Tick, TickSpan, Timeline, TimelineDriver, TimelineId,
};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

/// The scheduler's lifecycle state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SchedulerState {
    /// No active run; pumps do nothing.
    Idle,
    /// Paced real-time ticking.
    Running,
    /// Ticking as fast as the per-pump wall budget allows, up to a target.
    CatchingUp {
        /// The tick to reach before returning to `Running`.
        target: Tick,
    },
    /// Explicitly halted by the host; pumps do nothing until unfrozen.
    Frozen,
}

/// A snapshot of the scheduler's position for the host's status surface.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SchedulerStatus {
    /// Current lifecycle state.
    pub state: SchedulerState,
    /// The global tick counter.
    pub current: Tick,
    /// Distance to the highest safely-executable tick, when one is known.
    pub ticks_behind: Option<TickSpan>,
    /// Whether the distance exceeds twice the buffer target. Surfaced,
    /// never enforced: corrective action is the host's.
    pub far_behind: bool,
}

/// What a checksum disagreement looked like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesyncDetails {
    /// The checkpoint tick at which checksums disagree.
    pub tick: Tick,
    /// This participant's digest at that tick.
    pub local: u64,
    /// Every reported digest that differs from the local one.
    pub disagreeing: Vec<(IssuerId, u64)>,
}

/// Host callbacks fired from inside the tick loop.
///
/// All methods default to no-ops so hosts implement only what they watch.
pub trait SchedulerHooks: Send {
    /// Checksums across participants disagree at a checkpoint tick. The
    /// scheduler has already stopped advancing; recovery is external.
    fn on_desync(&mut self, details: &DesyncDetails) {
        let _ = details;
    }

    /// A catch-up request completed (or was already satisfied).
    fn on_catch_up_finished(&mut self) {}

    /// A timeline's ordinary advancement failed this tick. The loop
    /// continues; the fault is informational.
    fn on_tick_fault(&mut self, timeline: TimelineId, fault: &SimulationFault) {
        let _ = (timeline, fault);
    }
}

/// Hook implementation for hosts that watch nothing.
pub struct NoHooks;

impl SchedulerHooks for NoHooks {}

/// Executes scheduled commands against their target timeline.
///
/// The core decides when a command runs; the executor gives its kind and
/// payload meaning. An executor error is a [`CommandFault`] and propagates
/// out of the pump: every participant must fail identically here or not
/// at all.
pub trait CommandExecutor: Send {
    /// Executes one command against its target timeline.
    fn execute(
        &mut self,
        command: &ScheduledCommand,
        timeline: &mut Timeline,
    ) -> Result<(), CommandFault>;
}

/// A fatal pump failure. Simulation faults are not represented here; they
/// are isolated inside the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpError {
    /// The command stream violated protocol. Fatal to the stream.
    Protocol(ProtocolError),
    /// A scheduled command failed. Propagated so participants fail alike.
    Command(CommandFault),
}

impl fmt::Display for PumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PumpError::Protocol(err) => write!(f, "protocol violation: {err}"),
            PumpError::Command(err) => write!(f, "command execution failed: {err}"),
        }
    }
}

impl std::error::Error for PumpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PumpError::Protocol(err) => Some(err),
            PumpError::Command(err) => Some(err),
        }
    }
}

impl From<ProtocolError> for PumpError {
    fn from(err: ProtocolError) -> Self {
        PumpError::Protocol(err)
    }
}

impl From<CommandFault> for PumpError {
    fn from(err: CommandFault) -> Self {
        PumpError::Command(err)
    }
}

/// What one pump accomplished.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PumpReport {
    /// Whole ticks executed.
    pub ticks_run: u64,
    /// Scheduled commands executed.
    pub commands_executed: u64,
}

struct TimelineEntry {
    timeline: Timeline,
    driver: Box<dyn TimelineDriver>,
    rng_seed: u64,
}

/// Per-checkpoint checksum bookkeeping backing the desync gate.
#[derive(Default)]
struct ChecksumLedger {
    local: BTreeMap<u64, u64>,
    remote: BTreeMap<u64, Vec<(IssuerId, u64)>>,
}

impl ChecksumLedger {
    fn record_local(&mut self, tick: Tick, digest: u64) {
        self.local.insert(tick.get(), digest);
    }

    fn record_remote(&mut self, participant: IssuerId, tick: Tick, digest: u64) {
        self.remote
            .entry(tick.get())
            .or_default()
            .push((participant, digest));
    }

    /// The earliest checkpoint at which any report disagrees with the
    /// local digest, if one exists.
    fn first_disagreement(&self) -> Option<DesyncDetails> {
        for (&tick, &local) in &self.local {
            let Some(reports) = self.remote.get(&tick) else {
                continue;
            };
            let disagreeing: Vec<(IssuerId, u64)> = reports
                .iter()
                .copied()
                .filter(|&(_, digest)| digest != local)
                .collect();
            if !disagreeing.is_empty() {
                return Some(DesyncDetails {
                    tick: Tick::new(tick),
                    local,
                    disagreeing,
                });
            }
        }
        None
    }

    fn prune_before(&mut self, tick: u64) {
        self.local.retain(|&t, _| t >= tick);
        self.remote.retain(|&t, _| t >= tick);
    }

    fn clear(&mut self) {
        self.local.clear();
        self.remote.clear();
    }
}

/// The lockstep tick loop.
pub struct Scheduler {
    config: EngineConfig,
    state: SchedulerState,
    current: Tick,
    entries: Vec<TimelineEntry>,
    ingress: CommandBus,
    executor: Box<dyn CommandExecutor>,
    hooks: Box<dyn SchedulerHooks>,
    sessions: SessionManager,
    pacer: TickPacer,
    safe_tick: Option<Tick>,
    ledger: ChecksumLedger,
    desynced: Option<DesyncDetails>,
}

impl Scheduler {
    /// Creates an idle scheduler with no timelines.
    #[must_use]
    pub fn new(
        config: EngineConfig,
        executor: Box<dyn CommandExecutor>,
        hooks: Box<dyn SchedulerHooks>,
    ) -> Self {
        let pacer = TickPacer::new(config.ticks_per_second, config.buffer_target_ticks);
        log::info!(
            "Scheduler created ({} tps, buffer target {} ticks)",
            config.ticks_per_second,
            config.buffer_target_ticks
        );
        Self {
            config,
            state: SchedulerState::Idle,
            current: Tick::ZERO,
            entries: Vec::new(),
            ingress: CommandBus::new(),
            executor,
            hooks,
            sessions: SessionManager::new(),
            pacer,
            safe_tick: None,
            ledger: ChecksumLedger::default(),
            desynced: None,
        }
    }

    /// Registers a timeline. Iteration order across every tick is the
    /// registration order, identical on all participants.
    pub fn add_timeline(&mut self, id: TimelineId, rng_seed: u64, driver: Box<dyn TimelineDriver>) {
        self.entries.push(TimelineEntry {
            timeline: Timeline::new(id, rng_seed),
            driver,
            rng_seed,
        });
    }

    /// A sender for the transport layer to submit commands on.
    #[must_use]
    pub fn command_sender(&self) -> CommandSender {
        self.ingress.sender()
    }

    /// Enqueues a command directly, bypassing the ingress channel. Used by
    /// locally originated input that is already on the core's thread.
    pub fn enqueue_command(&mut self, command: ScheduledCommand) -> Result<(), ProtocolError> {
        let current = self.current;
        let entry = self.entry_mut(command.target)?;
        entry.timeline.queue_mut().enqueue(command, current)
    }

    /// Begins a run: `Idle` becomes `Running`. Any other state is kept.
    pub fn start(&mut self) {
        if self.state == SchedulerState::Idle {
            log::info!("Scheduler starting at {}", self.current);
            self.state = SchedulerState::Running;
        }
    }

    /// Halts ticking until [`unfreeze`](Self::unfreeze). A pending
    /// catch-up request is cancelled at the tick boundary.
    pub fn freeze(&mut self) {
        if self.state != SchedulerState::Idle {
            log::info!("Scheduler frozen at {}", self.current);
            self.state = SchedulerState::Frozen;
        }
    }

    /// Resumes paced ticking after a freeze.
    pub fn unfreeze(&mut self) {
        if self.state == SchedulerState::Frozen {
            log::info!("Scheduler unfrozen at {}", self.current);
            self.state = SchedulerState::Running;
        }
    }

    /// Requests fast-forwarding to `target`.
    ///
    /// A target at or behind the current tick is a no-op that still fires
    /// the finish callback. Requests are honored only during an active,
    /// unfrozen run.
    pub fn request_catch_up_to(&mut self, target: Tick) {
        if target <= self.current {
            log::debug!("Catch-up to {target} already satisfied at {}", self.current);
            self.hooks.on_catch_up_finished();
            return;
        }
        match self.state {
            SchedulerState::Running | SchedulerState::CatchingUp { .. } => {
                log::info!("Catching up from {} to {target}", self.current);
                self.state = SchedulerState::CatchingUp { target };
            }
            SchedulerState::Idle | SchedulerState::Frozen => {
                log::warn!("Catch-up to {target} ignored in {:?} state", self.state);
            }
        }
    }

    /// Cancels a pending catch-up at the current tick boundary. The
    /// scheduler stays wherever it got to; no callback fires.
    pub fn cancel_catch_up(&mut self) {
        if let SchedulerState::CatchingUp { target } = self.state {
            log::info!(
                "Catch-up to {target} cancelled at {}; resuming paced run",
                self.current
            );
            self.state = SchedulerState::Running;
        }
    }

    /// Zeroes counters, clears all queues, and returns to `Idle`. Used on
    /// full teardown.
    pub fn reset(&mut self) {
        log::info!("Scheduler reset at {}", self.current);
        self.state = SchedulerState::Idle;
        self.current = Tick::ZERO;
        for entry in &mut self.entries {
            entry.timeline.reset(entry.rng_seed);
        }
        self.ingress.drain();
        self.sessions.clear();
        self.pacer.reset();
        self.safe_tick = None;
        self.ledger.clear();
        self.desynced = None;
    }

    /// Records the highest tick known to be safely executable (the
    /// authoritative bound the pacer must not overtake). Monotonic.
    pub fn confirm_safe_tick(&mut self, tick: Tick) {
        match self.safe_tick {
            Some(existing) if existing >= tick => {}
            _ => self.safe_tick = Some(tick),
        }
    }

    /// Records a participant's checksum for a checkpoint tick.
    ///
    /// Disagreement with the locally computed digest stops the loop at the
    /// next tick boundary and fires [`SchedulerHooks::on_desync`].
    pub fn report_checksum(&mut self, participant: IssuerId, tick: Tick, digest: u64) {
        self.ledger.record_remote(participant, tick, digest);
        self.check_for_desync();
    }

    /// The scheduler's current position and health.
    #[must_use]
    pub fn status(&self) -> SchedulerStatus {
        let ticks_behind = self.safe_tick.map(|safe| safe.since(self.current));
        let far_behind = ticks_behind
            .is_some_and(|span| span.get() > u64::from(self.config.buffer_target_ticks) * 2);
        SchedulerStatus {
            state: self.state,
            current: self.current,
            ticks_behind,
            far_behind,
        }
    }

    /// The global tick counter.
    #[must_use]
    pub fn current_tick(&self) -> Tick {
        self.current
    }

    /// This participant's digest of all deterministic state, as recorded
    /// at checkpoint ticks.
    #[must_use]
    pub fn state_digest(&self) -> u64 {
        const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
        let mut h = self.current.get().wrapping_mul(FNV_PRIME);
        for entry in &self.entries {
            h = (h ^ entry.timeline.digest()).wrapping_mul(FNV_PRIME);
            h = (h ^ entry.driver.digest()).wrapping_mul(FNV_PRIME);
        }
        h
    }

    /// Read access to a timeline, for assertions and status surfaces.
    #[must_use]
    pub fn timeline(&self, id: TimelineId) -> Option<&Timeline> {
        self.entries
            .iter()
            .find(|e| e.timeline.id() == id)
            .map(|e| &e.timeline)
    }

    /// The session manager layered on this scheduler.
    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Mutable access to the session manager.
    pub fn sessions_mut(&mut self) -> &mut SessionManager {
        &mut self.sessions
    }

    /// Advances the simulation according to elapsed wall-clock time.
    ///
    /// Synchronous; returns once the tick budget is spent. While catching
    /// up, pacing is ignored and ticks run until the target or the soft
    /// wall-clock budget is reached, whichever is first; the budget is
    /// checked between whole ticks, never mid-tick.
    pub fn pump(&mut self, now: Instant) -> Result<PumpReport, PumpError> {
        match self.state {
            SchedulerState::Idle | SchedulerState::Frozen => return Ok(PumpReport::default()),
            SchedulerState::Running | SchedulerState::CatchingUp { .. } => {}
        }
        self.drain_ingress()?;

        match self.state {
            SchedulerState::Running => {
                let headroom = self.safe_tick.map(|safe| safe.since(self.current));
                let budget = self.pacer.whole_ticks(now, headroom);
                self.run_ticks(budget, None)
            }
            SchedulerState::CatchingUp { target } => {
                let deadline = now + Duration::from_millis(self.config.catch_up_budget_ms);
                let budget = target.since(self.current).get();
                let report = self.run_ticks(budget, Some(deadline))?;
                if self.current >= target {
                    log::info!("Catch-up finished at {}", self.current);
                    self.state = SchedulerState::Running;
                    self.hooks.on_catch_up_finished();
                }
                Ok(report)
            }
            SchedulerState::Idle | SchedulerState::Frozen => unreachable!(),
        }
    }

    /// Advances exactly `ticks` whole ticks, ignoring pacing. Intended for
    /// deterministic harnesses and replay drivers.
    pub fn step(&mut self, ticks: u64) -> Result<PumpReport, PumpError> {
        match self.state {
            SchedulerState::Idle | SchedulerState::Frozen => return Ok(PumpReport::default()),
            SchedulerState::Running | SchedulerState::CatchingUp { .. } => {}
        }
        self.drain_ingress()?;
        self.run_ticks(ticks, None)
    }

    fn entry_mut(&mut self, id: TimelineId) -> Result<&mut TimelineEntry, ProtocolError> {
        self.entries
            .iter_mut()
            .find(|e| e.timeline.id() == id)
            .ok_or(ProtocolError::UnknownTimeline { timeline: id })
    }

    /// Routes buffered ingress commands to their timeline queues.
    fn drain_ingress(&mut self) -> Result<(), ProtocolError> {
        for command in self.ingress.drain() {
            let current = self.current;
            let entry = self.entry_mut(command.target)?;
            entry.timeline.queue_mut().enqueue(command, current)?;
        }
        Ok(())
    }

    /// Runs up to `budget` whole ticks, stopping early at `deadline` or on
    /// a desync. The deadline is soft: it is checked between ticks only.
    fn run_ticks(
        &mut self,
        budget: u64,
        deadline: Option<Instant>,
    ) -> Result<PumpReport, PumpError> {
        let mut report = PumpReport::default();
        for _ in 0..budget {
            if self.is_desync_blocked() {
                break;
            }
            report.commands_executed += self.run_one_tick()?;
            report.ticks_run += 1;
            if deadline.is_some_and(|d| Instant::now() >= d) {
                log::debug!(
                    "Pump budget exhausted at {} after {} ticks",
                    self.current,
                    report.ticks_run
                );
                break;
            }
        }
        Ok(report)
    }

    /// Executes one whole global tick. Never partially: a fatal error can
    /// only surface from command execution, which happens before any
    /// state advances, or propagates after the tick completed.
    fn run_one_tick(&mut self) -> Result<u64, PumpError> {
        // Phase 1: every command due exactly now, for all timelines, in
        // fixed iteration order. Completes before any advancement below.
        let mut executed = 0u64;
        for i in 0..self.entries.len() {
            let current = self.current;
            let entry = &mut self.entries[i];
            while let Some(command) = entry.timeline.queue_mut().pop_due(current) {
                log::trace!("Executing {command} at {current}");
                self.executor
                    .execute(&command, &mut entry.timeline)
                    .map_err(PumpError::Command)?;
                executed += 1;
            }
        }

        // Phase 2: ordinary advancement for every nonzero-rate timeline.
        // Faults are isolated here so one faulty subsystem cannot freeze
        // the whole session.
        for entry in &mut self.entries {
            if !entry.timeline.is_ticking() {
                continue;
            }
            if self.sessions.is_any_pausing(entry.timeline.id()) {
                continue;
            }
            if let Err(fault) = entry.timeline.advance(entry.driver.as_mut()) {
                log::error!("{fault}");
                self.hooks.on_tick_fault(entry.timeline.id(), &fault);
            }
        }

        // Tick-driven sessions run after advancement, then invalid ones
        // are swept.
        self.sessions.tick();
        self.sessions.sweep();

        self.current = self.current.next();

        let interval = self.config.checksum_interval_ticks;
        if interval > 0 && self.current.get() % interval == 0 {
            let digest = self.state_digest();
            log::trace!("Checkpoint {}: digest {digest:#018x}", self.current);
            self.ledger.record_local(self.current, digest);
            let keep_from = self.current.get().saturating_sub(interval * 4);
            self.ledger.prune_before(keep_from);
            self.check_for_desync();
        }
        Ok(executed)
    }

    fn check_for_desync(&mut self) {
        if self.desynced.is_some() {
            return;
        }
        if let Some(details) = self.ledger.first_disagreement() {
            log::error!(
                "Desync at {}: local digest {:#018x}, {} disagreeing report(s)",
                details.tick,
                details.local,
                details.disagreeing.len()
            );
            self.desynced = Some(details.clone());
            self.hooks.on_desync(&details);
        }
    }

    fn is_desync_blocked(&self) -> bool {
        self.desynced.is_some()
    }
}
