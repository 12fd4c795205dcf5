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

//! Server-side bookkeeping of connected peers.

use tracing::debug;

use super::radio::PeerId;

/// Ordered set of currently connected peers.
///
/// Only the server's connect/disconnect handling mutates it.
#[derive(Debug, Default, Clone)]
pub struct DeviceRegistry {
    devices: Vec<PeerId>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connected peer. Returns `false` if it was already present.
    pub fn add(&mut self, peer: PeerId) -> bool {
        if self.devices.contains(&peer) {
            debug!("Device {} already registered", peer);
            return false;
        }
        debug!("Device added: {}", peer);
        self.devices.push(peer);
        true
    }

    /// Forget a disconnected peer. Returns `false` if it was not present.
    pub fn remove(&mut self, peer: &PeerId) -> bool {
        let before = self.devices.len();
        self.devices.retain(|p| p != peer);
        let removed = self.devices.len() != before;
        if removed {
            debug!("Device removed: {}", peer);
        }
        removed
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.devices.contains(peer)
    }

    pub fn devices(&self) -> &[PeerId] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }
}
