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

//! Deterministic seeded random number generator.
//!
//! Xorshift64: fast and bit-identical across platforms. Every timeline owns
//! one stream; all participants must draw from it in the same order, so it
//! is only ever stepped from deterministic simulation code.

/// Deterministic pseudo-random stream with explicitly accessible state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    /// Creates a new stream with the given seed.
    /// Seed 0 is treated as 1 to avoid the degenerate all-zero sequence.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Returns the next raw value from the stream.
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Returns the next value truncated to 32 bits.
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Returns a value from 0 (inclusive) to `max` (exclusive).
    /// Returns 0 when `max` is 0.
    pub fn next_int(&mut self, max: u32) -> u32 {
        ((self.next_u32() as u64 * max as u64) >> 32) as u32
    }

    /// Returns a float in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        // 53 significant bits, the full precision of an f64 mantissa.
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Returns the current internal state, for snapshotting.
    #[must_use]
    pub fn state(&self) -> u64 {
        self.state
    }

    /// Restores a previously captured state.
    pub fn set_state(&mut self, state: u64) {
        self.state = if state == 0 { 1 } else { state };
    }
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(1)
    }
}
