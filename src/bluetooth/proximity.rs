// Copyright 2026 Daniel Pelikan
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

//! Signal-strength proximity gate.

use std::time::Duration;

use super::ble_constants::{timing, PROXIMITY_THRESHOLD};

/// Whether `signal_strength` (dBm, negative, less negative is closer) is
/// within the default closeness threshold.
pub fn is_close(signal_strength: i32) -> bool {
    ProximityGate::default().is_close(signal_strength)
}

/// Closeness threshold plus the cadence at which the client samples it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProximityGate {
    threshold: i32,
    interval: Duration,
}

impl Default for ProximityGate {
    fn default() -> Self {
        Self {
            threshold: PROXIMITY_THRESHOLD,
            interval: timing::PROXIMITY_INTERVAL,
        }
    }
}

impl ProximityGate {
    pub fn new(threshold: i32, interval: Duration) -> Self {
        Self {
            threshold,
            interval,
        }
    }

    /// `0` and above is not a valid reading and never counts as close.
    pub fn is_close(&self, signal_strength: i32) -> bool {
        signal_strength >= self.threshold && signal_strength < 0
    }

    /// Delay between two samples.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn threshold(&self) -> i32 {
        self.threshold
    }
}
