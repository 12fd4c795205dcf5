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

//! Client-side connection record.

use tracing::info;

use super::radio::PeerId;
use crate::error::PairingFailure;

/// State of the client role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    /// Not connected to anyone (scanning or not started).
    Idle,
    Connecting,
    Connected,
    DiscoveringServices,
    /// Match-control token sent, waiting for the reversed echo.
    AwaitingEcho,
    /// Handshake confirmed, sampling signal strength.
    ProximityCheck,
    /// Friend token sent. Terminal.
    Matched,
    /// Attempt abandoned; the client is back to scanning.
    Failed(PairingFailure),
    /// Radio halted by the host or by the other role matching. Terminal.
    Disabled,
}

impl ClientState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClientState::Matched | ClientState::Disabled)
    }
}

/// The one live link the client holds.
#[derive(Debug)]
pub struct Connection {
    peer: PeerId,
    epoch: u64,
    state: ClientState,
    signal_strength: Option<i32>,
    handshake_confirmed: bool,
}

impl Connection {
    /// New connection attempt to `peer`, in `Connecting`.
    pub fn new(peer: PeerId, epoch: u64) -> Self {
        Self {
            peer,
            epoch,
            state: ClientState::Connecting,
            signal_strength: None,
            handshake_confirmed: false,
        }
    }

    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    /// Identifies this attempt in timers.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn is(&self, state: &ClientState) -> bool {
        &self.state == state
    }

    pub fn transition(&mut self, next: ClientState) {
        info!("{}: {:?} -> {:?}", self.peer, self.state, next);
        self.state = next;
    }

    pub fn signal_strength(&self) -> Option<i32> {
        self.signal_strength
    }

    pub fn record_signal(&mut self, rssi: i32) {
        self.signal_strength = Some(rssi);
    }

    pub fn handshake_confirmed(&self) -> bool {
        self.handshake_confirmed
    }

    pub fn confirm_handshake(&mut self) {
        self.handshake_confirmed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_connection() {
        let mut conn = Connection::new(PeerId::new("11:22:33:44:55:66"), 7);
        assert!(conn.is(&ClientState::Connecting));
        assert_eq!(conn.epoch(), 7);
        assert!(!conn.handshake_confirmed());

        conn.transition(ClientState::Connected);
        conn.record_signal(-48);
        conn.confirm_handshake();
        assert_eq!(conn.state(), &ClientState::Connected);
        assert_eq!(conn.signal_strength(), Some(-48));
        assert!(conn.handshake_confirmed());
    }

    #[test]
    fn test_terminal_states() {
        assert!(ClientState::Matched.is_terminal());
        assert!(ClientState::Disabled.is_terminal());
        assert!(!ClientState::Failed(PairingFailure::LinkLost).is_terminal());
        assert!(!ClientState::ProximityCheck.is_terminal());
    }
}
