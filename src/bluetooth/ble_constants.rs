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

//! Default BLE identifiers, handshake tokens and protocol timings.
//!
//! Both roles must agree on every value here out of band; the defaults
//! interoperate with the existing handset peers.

use uuid::Uuid;

/// Pairing GATT service UUID.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x066a76ed_35b9_41de_a2b5_8021fb832dbb);

/// Pairing characteristic UUID (the single writable channel).
/// Properties: Write, Notify
///
/// Deployed peers reuse the service UUID for the characteristic.
pub const CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x066a76ed_35b9_41de_a2b5_8021fb832dbb);

/// First handshake literal: "I am a valid counterpart".
pub const MATCH_CONTROL_TOKEN: &str = "XEE_KIDS_SMART_WATCH";

/// Second handshake literal: "proximity confirmed, pairing complete".
pub const FRIEND_TOKEN: &str = "XEE_KIDS_FRIEND";

/// Protocol timings.
pub mod timing {
    use std::time::Duration;

    /// Length of one discovery window.
    pub const SCAN_WINDOW: Duration = Duration::from_millis(5000);

    /// Cadence of the proximity sampling loop.
    pub const PROXIMITY_INTERVAL: Duration = Duration::from_millis(1000);

    /// Delay before re-trying a failed advertisement or server registration.
    pub const ADVERTISE_RETRY: Duration = Duration::from_millis(5000);

    /// How often the BlueZ peripheral polls for connected devices.
    pub const CONNECTION_POLL: Duration = Duration::from_secs(1);
}

/// Signal strength at or above which a peer counts as close (dBm).
pub const PROXIMITY_THRESHOLD: i32 = -60;
