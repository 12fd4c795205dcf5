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

//! Platform radio interface driven by the pairing roles.
//!
//! Each role talks to the radio through one trait. Trait methods only
//! *issue* a request; anything that completes later (scan hits, connect
//! results, discovered services, inbound values, signal strength, writes
//! from remote centrals) comes back as an event on the channel the adapter
//! was built with. The role actor is the single consumer of that channel.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::RadioError;

/// Opaque identifier of a radio peer (its platform address string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scan duty cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    LowPower,
    Balanced,
    LowLatency,
}

/// Discovery filter: only peers advertising `service` are reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFilter {
    pub service: Uuid,
    pub mode: ScanMode,
}

impl ScanFilter {
    pub fn low_power(service: Uuid) -> Self {
        Self {
            service,
            mode: ScanMode::LowPower,
        }
    }
}

/// Link-layer state reported by a connect callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    Disconnected,
}

/// A remote GATT service and the UUIDs of its characteristics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub uuid: Uuid,
    pub characteristics: Vec<Uuid>,
}

impl ServiceInfo {
    pub fn has_characteristic(&self, characteristic: Uuid) -> bool {
        self.characteristics.contains(&characteristic)
    }
}

/// Callbacks delivered to the client role.
#[derive(Debug, Clone, PartialEq)]
pub enum CentralEvent {
    /// A peer matching the scan filter was seen.
    PeerDiscovered { peer: PeerId, rssi: Option<i32> },
    /// Discovery stopped on its own with an error.
    ScanFailed(RadioError),
    /// Outcome of a connect request, or a later link change.
    ConnectionStateChanged {
        peer: PeerId,
        result: Result<LinkState, RadioError>,
    },
    ServicesDiscovered {
        peer: PeerId,
        result: Result<Vec<ServiceInfo>, RadioError>,
    },
    /// Characteristic value received by notification or read.
    ValueReceived {
        peer: PeerId,
        characteristic: Uuid,
        value: Vec<u8>,
    },
    WriteCompleted {
        peer: PeerId,
        characteristic: Uuid,
        result: Result<(), RadioError>,
    },
    SignalStrength {
        peer: PeerId,
        result: Result<i32, RadioError>,
    },
}

/// Radio capabilities used by the scanner/client role.
#[async_trait]
pub trait CentralRadio: Send {
    /// Begin discovery. Hits arrive as [`CentralEvent::PeerDiscovered`].
    async fn start_scan(&mut self, filter: &ScanFilter) -> Result<(), RadioError>;

    async fn stop_scan(&mut self) -> Result<(), RadioError>;

    /// Begin connecting. The outcome arrives as
    /// [`CentralEvent::ConnectionStateChanged`].
    async fn connect(&mut self, peer: &PeerId) -> Result<(), RadioError>;

    async fn disconnect(&mut self, peer: &PeerId) -> Result<(), RadioError>;

    async fn discover_services(&mut self, peer: &PeerId) -> Result<(), RadioError>;

    /// Subscribe to value changes. Once this returns `Ok`, notifications
    /// are delivered as [`CentralEvent::ValueReceived`].
    async fn enable_notifications(
        &mut self,
        peer: &PeerId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), RadioError>;

    async fn write_characteristic(
        &mut self,
        peer: &PeerId,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), RadioError>;

    async fn read_signal_strength(&mut self, peer: &PeerId) -> Result<(), RadioError>;

    /// Disable the local radio.
    async fn power_off(&mut self) -> Result<(), RadioError>;
}

/// Advertising duty cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertiseMode {
    LowPower,
    Balanced,
    LowLatency,
}

impl AdvertiseMode {
    /// Nominal advertising interval for the mode.
    pub fn interval(&self) -> Duration {
        match self {
            Self::LowPower => Duration::from_millis(1000),
            Self::Balanced => Duration::from_millis(250),
            Self::LowLatency => Duration::from_millis(100),
        }
    }
}

/// Advertising transmit power.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPower {
    UltraLow,
    Low,
    Medium,
    High,
}

impl TxPower {
    pub fn dbm(&self) -> i16 {
        match self {
            Self::UltraLow => -21,
            Self::Low => -15,
            Self::Medium => -7,
            Self::High => 1,
        }
    }
}

/// What the server broadcasts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertiseSettings {
    pub service: Uuid,
    pub mode: AdvertiseMode,
    pub tx_power: TxPower,
    pub connectable: bool,
    /// `None` advertises until stopped.
    pub timeout: Option<Duration>,
    pub include_device_name: bool,
}

impl AdvertiseSettings {
    /// Connectable, balanced, indefinite, anonymous advertisement of `service`.
    pub fn pairing(service: Uuid) -> Self {
        Self {
            service,
            mode: AdvertiseMode::Balanced,
            tx_power: TxPower::Low,
            connectable: true,
            timeout: None,
            include_device_name: false,
        }
    }
}

/// One primary service exposing one writable, notifying characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GattServiceSpec {
    pub service: Uuid,
    pub characteristic: Uuid,
}

/// Acknowledgement handle for a write request.
///
/// Dropping it without calling [`WriteResponder::respond`] leaves the write
/// unacknowledged at the protocol level.
#[derive(Debug, Default)]
pub struct WriteResponder(Option<oneshot::Sender<()>>);

impl WriteResponder {
    pub fn new() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self(Some(tx)), rx)
    }

    /// Responder for radios that do not expect an acknowledgement.
    pub fn detached() -> Self {
        Self(None)
    }

    /// Acknowledge the write. Returns `false` if it was already answered
    /// or the writer went away.
    pub fn respond(&mut self) -> bool {
        match self.0.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

/// A remote central wrote to a local characteristic.
#[derive(Debug)]
pub struct WriteRequest {
    pub peer: PeerId,
    pub characteristic: Uuid,
    pub value: Vec<u8>,
    pub responder: WriteResponder,
}

/// Callbacks delivered to the server role.
#[derive(Debug)]
pub enum PeripheralEvent {
    ConnectionStateChanged { peer: PeerId, connected: bool },
    CharacteristicWrite(WriteRequest),
}

/// Radio capabilities used by the advertiser/server role.
#[async_trait]
pub trait PeripheralRadio: Send {
    /// Register the GATT service. Connection changes and writes arrive as
    /// [`PeripheralEvent`]s from here on.
    async fn open_server(&mut self, spec: &GattServiceSpec) -> Result<(), RadioError>;

    async fn start_advertising(&mut self, settings: &AdvertiseSettings) -> Result<(), RadioError>;

    async fn stop_advertising(&mut self) -> Result<(), RadioError>;

    /// Notify `value` on `characteristic` to each of `peers`.
    async fn notify(
        &mut self,
        peers: &[PeerId],
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), RadioError>;

    async fn close_server(&mut self) -> Result<(), RadioError>;

    /// Disable the local radio.
    async fn power_off(&mut self) -> Result<(), RadioError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairing_advertisement() {
        let settings = AdvertiseSettings::pairing(Uuid::nil());
        assert_eq!(settings.mode, AdvertiseMode::Balanced);
        assert!(settings.connectable);
        assert!(settings.timeout.is_none());
        assert!(!settings.include_device_name);
    }

    #[test]
    fn test_responder_answers_once() {
        let (mut responder, mut rx) = WriteResponder::new();
        assert!(responder.respond());
        assert!(!responder.respond());
        assert!(rx.try_recv().is_ok());

        assert!(!WriteResponder::detached().respond());
    }
}
