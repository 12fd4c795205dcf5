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

//! Proximity-gated BLE pairing.
//!
//! Two devices run both a scanner/client and an advertiser/server role.
//! The client connects, proves it speaks the protocol with a reversed-echo
//! handshake, and once signal strength says the peer is close it sends a
//! friend token. Whichever role completes first wins; both then stop.

pub mod bluetooth;
pub mod config;
pub mod error;
pub mod events;
pub mod state;

pub use error::{PairingFailure, RadioError};
pub use events::{HostEvent, Role};
pub use state::MatchCoordinator;
