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

//! Bluetooth LE pairing: both roles, their state machines, and the BlueZ
//! radios they run on.

pub mod ble_constants;
pub mod bluez;
pub mod client;
pub mod connection;
pub mod gatt_server;
pub mod protocol;
pub mod proximity;
pub mod radio;
pub mod registry;
pub mod scanner;
pub mod timer;

pub use client::{ClientConfig, ClientSession};
pub use connection::{ClientState, Connection};
pub use gatt_server::{ServerConfig, ServerSession, ServerState};
pub use protocol::{Token, Tokens};
pub use proximity::ProximityGate;
pub use radio::{
    CentralEvent, CentralRadio, PeerId, PeripheralEvent, PeripheralRadio, WriteRequest,
    WriteResponder,
};
pub use registry::DeviceRegistry;
