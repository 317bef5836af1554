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

//! Simulated-time coordinate types.
//!
//! The engine operates on a discrete tick lattice. A [`Tick`] is a point on
//! that lattice (the global simulation clock), a [`TickSpan`] is a distance
//! between two points. Wall-clock time only ever enters the system at the
//! scheduler's pacing boundary, never here.

use std::fmt;
use std::ops::{Add, Sub};

/// A point on the global simulation tick lattice.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Tick(u64);

impl Tick {
    /// Tick zero, the state of a freshly reset engine.
    pub const ZERO: Tick = Tick(0);

    /// Creates a tick from a raw count.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying tick count.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the tick immediately after this one.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Distance to an earlier tick, saturating at zero.
    #[inline]
    #[must_use]
    pub const fn since(self, earlier: Tick) -> TickSpan {
        TickSpan(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// A span in tick space (number of ticks).
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct TickSpan(u64);

impl TickSpan {
    /// Creates a span from a raw tick count.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying tick count.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Add<TickSpan> for Tick {
    type Output = Tick;

    #[inline]
    fn add(self, rhs: TickSpan) -> Tick {
        Tick(self.0 + rhs.0)
    }
}

impl Sub<Tick> for Tick {
    type Output = TickSpan;

    #[inline]
    fn sub(self, rhs: Tick) -> TickSpan {
        self.since(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_ordering_and_arithmetic() {
        let a = Tick::new(5);
        let b = Tick::new(9);
        assert!(a < b);
        assert_eq!(b - a, TickSpan::new(4));
        assert_eq!(a + TickSpan::new(4), b);
        assert_eq!(a.next(), Tick::new(6));
    }

    #[test]
    fn since_saturates() {
        assert_eq!(Tick::new(3).since(Tick::new(10)), TickSpan::new(0));
    }
}
