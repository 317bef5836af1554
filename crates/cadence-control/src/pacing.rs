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

//! Converts elapsed wall-clock time into a whole-tick budget.
//!
//! The pacer deliberately runs slightly slower than real time when the
//! buffer of safely-executable ticks is nearly empty and slightly faster
//! when it is comfortably full, smoothing network jitter without ever
//! overtaking the highest tick known to be safe. Fractional ticks carry
//! over between pumps so the long-run rate stays exact.

use cadence_core::TickSpan;
use std::time::Instant;

/// Pacing factor applied when the safe-tick buffer is empty.
const FLOOR_FACTOR: f64 = 0.85;
/// Additional factor gained as the buffer fills toward twice the target.
const FACTOR_RANGE: f64 = 0.3;

/// Wall-clock to tick-budget conversion state.
#[derive(Debug)]
pub struct TickPacer {
    ticks_per_second: f64,
    buffer_target: u32,
    carry: f64,
    last_pump: Option<Instant>,
}

impl TickPacer {
    /// Creates a pacer for the given base rate and buffer target.
    #[must_use]
    pub fn new(ticks_per_second: f64, buffer_target: u32) -> Self {
        Self {
            ticks_per_second,
            buffer_target,
            carry: 0.0,
            last_pump: None,
        }
    }

    /// Computes how many whole ticks should elapse for this pump.
    ///
    /// `headroom` is the distance to the highest safely-executable tick,
    /// or `None` when no authoritative bound applies (a local-only run).
    /// The budget never exceeds the headroom; excess carry is discarded
    /// when clamped so a stall does not turn into a burst later.
    pub fn whole_ticks(&mut self, now: Instant, headroom: Option<TickSpan>) -> u64 {
        let elapsed = match self.last_pump.replace(now) {
            Some(last) => now.saturating_duration_since(last).as_secs_f64(),
            None => 0.0,
        };

        let factor = match headroom {
            Some(h) => self.fill_factor(h),
            None => 1.0,
        };
        self.carry += elapsed * self.ticks_per_second * factor;

        let mut budget = self.carry as u64;
        self.carry -= budget as f64;

        if let Some(h) = headroom {
            if budget > h.get() {
                budget = h.get();
                self.carry = 0.0;
            }
        }
        budget
    }

    /// Forgets accumulated carry and the last pump instant.
    pub fn reset(&mut self) {
        self.carry = 0.0;
        self.last_pump = None;
    }

    fn fill_factor(&self, headroom: TickSpan) -> f64 {
        if self.buffer_target == 0 {
            return 1.0;
        }
        let fill = headroom.get() as f64 / f64::from(self.buffer_target * 2);
        FLOOR_FACTOR + FACTOR_RANGE * fill.min(1.0)
    }
}
