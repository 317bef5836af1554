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

//! The timeline model: an independently-paced logical simulation clock.
//!
//! A [`Timeline`] owns its command queue, its pseudo-random stream, and a
//! fractional accumulator that converts the global scheduler tick into
//! speed-scaled units of simulated activity. Domain effects are delegated
//! to a [`TimelineDriver`], which the core never interprets.

use crate::command::TimelineId;
use crate::error::SimulationFault;
use crate::queue::CommandQueue;
use crate::random::DeterministicRng;
use crate::time::Tick;

/// The desired pacing of a timeline, as selected by commands.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TimeSpeed {
    /// No simulated activity.
    Paused,
    /// One unit of simulated activity per global tick.
    #[default]
    Normal,
    /// Three units per global tick.
    Fast,
    /// Six units per global tick.
    Superfast,
}

impl TimeSpeed {
    /// Units of simulated activity added to the accumulator per global tick.
    #[must_use]
    pub fn tick_rate(self) -> f64 {
        match self {
            TimeSpeed::Paused => 0.0,
            TimeSpeed::Normal => 1.0,
            TimeSpeed::Fast => 3.0,
            TimeSpeed::Superfast => 6.0,
        }
    }
}

/// Per-step view handed to a [`TimelineDriver`].
///
/// Drivers draw randomness exclusively from `rng` so that all participants
/// consume the stream in the same order.
pub struct TimelineContext<'a> {
    /// The timeline being advanced.
    pub id: TimelineId,
    /// Timeline-local elapsed ticks before this step.
    pub elapsed: Tick,
    /// The timeline's deterministic random stream.
    pub rng: &'a mut DeterministicRng,
}

/// Domain-side advancement of a timeline.
///
/// The core decides when a step happens; the driver decides what a step
/// does. An error from [`advance`](TimelineDriver::advance) is a
/// [`SimulationFault`]: isolated, logged, never loop-stopping.
pub trait TimelineDriver: Send {
    /// Performs exactly one unit of simulated activity.
    fn advance(&mut self, ctx: &mut TimelineContext<'_>) -> Result<(), SimulationFault>;

    /// A digest of the driver's deterministic state, folded into the
    /// participant checksum at checkpoint ticks.
    fn digest(&self) -> u64 {
        0
    }
}

/// An independently clocked logical simulation unit.
#[derive(Debug)]
pub struct Timeline {
    id: TimelineId,
    desired_speed: TimeSpeed,
    elapsed: u64,
    time_to_tick_through: f64,
    queue: CommandQueue,
    rng: DeterministicRng,
}

impl Timeline {
    /// Creates a timeline at tick zero with its own seeded random stream.
    #[must_use]
    pub fn new(id: TimelineId, rng_seed: u64) -> Self {
        log::debug!("Timeline {id} created (seed={rng_seed:#x})");
        Self {
            id,
            desired_speed: TimeSpeed::Normal,
            elapsed: 0,
            time_to_tick_through: 0.0,
            queue: CommandQueue::new(),
            rng: DeterministicRng::new(rng_seed),
        }
    }

    /// The timeline's identifier.
    #[must_use]
    pub fn id(&self) -> TimelineId {
        self.id
    }

    /// The currently desired speed.
    #[must_use]
    pub fn speed(&self) -> TimeSpeed {
        self.desired_speed
    }

    /// Changes the desired speed. Takes effect from the next advancement;
    /// must only be called from deterministically ordered code (a command).
    pub fn set_speed(&mut self, speed: TimeSpeed) {
        if speed != self.desired_speed {
            log::debug!("{} speed {:?} -> {:?}", self.id, self.desired_speed, speed);
            self.desired_speed = speed;
        }
    }

    /// Timeline-local elapsed ticks (units of simulated activity performed).
    #[must_use]
    pub fn elapsed_ticks(&self) -> Tick {
        Tick::new(self.elapsed)
    }

    /// The timeline's pending-command queue.
    #[must_use]
    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    /// Mutable access to the queue. Only the scheduler dequeues.
    pub fn queue_mut(&mut self) -> &mut CommandQueue {
        &mut self.queue
    }

    /// Mutable access to the random stream, for command execution.
    pub fn rng_mut(&mut self) -> &mut DeterministicRng {
        &mut self.rng
    }

    /// Whether the current speed yields a nonzero tick rate.
    #[must_use]
    pub fn is_ticking(&self) -> bool {
        self.desired_speed.tick_rate() > 0.0
    }

    /// Performs this timeline's share of one global tick.
    ///
    /// Adds the speed's tick rate to the fractional accumulator and runs the
    /// driver once per whole unit accumulated, so a `Fast` timeline performs
    /// three driver steps per global tick. Returns the number of steps
    /// performed. On a driver fault the remaining steps of this global tick
    /// are abandoned; the fault is the caller's to log and isolate.
    pub fn advance(&mut self, driver: &mut dyn TimelineDriver) -> Result<u32, SimulationFault> {
        self.time_to_tick_through += self.desired_speed.tick_rate();
        let mut steps = 0u32;
        while self.time_to_tick_through >= 1.0 {
            self.time_to_tick_through -= 1.0;
            let mut ctx = TimelineContext {
                id: self.id,
                elapsed: Tick::new(self.elapsed),
                rng: &mut self.rng,
            };
            driver.advance(&mut ctx)?;
            self.elapsed += 1;
            steps += 1;
        }
        Ok(steps)
    }

    /// Folds the timeline's own deterministic state into a digest.
    /// The driver's digest is mixed in separately by the scheduler.
    #[must_use]
    pub fn digest(&self) -> u64 {
        const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
        let mut h = FNV_OFFSET;
        for v in [u64::from(self.id.0), self.elapsed, self.rng.state()] {
            h = (h ^ v).wrapping_mul(FNV_PRIME);
        }
        h
    }

    /// Zeroes counters and clears the queue. Used on full teardown.
    pub fn reset(&mut self, rng_seed: u64) {
        self.desired_speed = TimeSpeed::Normal;
        self.elapsed = 0;
        self.time_to_tick_through = 0.0;
        self.queue.clear();
        self.rng = DeterministicRng::new(rng_seed);
    }
}
