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

//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Tuning knobs for the scheduler's pacing and checkpointing.
///
/// None of these affect simulation semantics: two participants with
/// different pacing settings still execute the same commands at the same
/// ticks. They only shape how wall-clock time maps onto the tick lattice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base simulation rate in global ticks per wall-clock second.
    pub ticks_per_second: f64,
    /// How many ticks of authoritatively confirmed headroom the scheduler
    /// tries to keep buffered. Pacing slows slightly when the buffer is
    /// nearly empty and speeds up when it is comfortably full.
    pub buffer_target_ticks: u32,
    /// Soft wall-clock budget per pump while catching up, in milliseconds.
    /// Checked between whole ticks, never mid-tick.
    pub catch_up_budget_ms: u64,
    /// Interval between checksum checkpoint ticks.
    pub checksum_interval_ticks: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 60.0,
            buffer_target_ticks: 6,
            catch_up_budget_ms: 25,
            checksum_interval_ticks: 60,
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from a JSON document. Missing fields fall
    /// back to their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
