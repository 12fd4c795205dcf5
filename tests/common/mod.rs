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

//! In-memory radios for driving both roles without hardware.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use proxpair::bluetooth::ble_constants::{CHARACTERISTIC_UUID, SERVICE_UUID};
use proxpair::bluetooth::radio::{
    AdvertiseSettings, CentralEvent, CentralRadio, GattServiceSpec, LinkState, PeerId,
    PeripheralEvent, PeripheralRadio, ScanFilter, ServiceInfo, WriteRequest, WriteResponder,
};
use proxpair::{HostEvent, RadioError};

pub fn peer(n: u8) -> PeerId {
    PeerId::new(format!("AA:BB:CC:DD:EE:{:02X}", n))
}

pub fn pairing_service() -> ServiceInfo {
    ServiceInfo {
        uuid: SERVICE_UUID,
        characteristics: vec![CHARACTERISTIC_UUID],
    }
}

pub fn drain_host(rx: &mut mpsc::UnboundedReceiver<HostEvent>) -> Vec<HostEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[derive(Debug, Clone, PartialEq)]
pub enum CentralCall {
    StartScan(Uuid),
    StopScan,
    Connect(PeerId),
    Disconnect(PeerId),
    DiscoverServices(PeerId),
    EnableNotifications(PeerId, Uuid),
    Write(PeerId, Vec<u8>),
    ReadSignal(PeerId),
    PowerOff,
}

/// Central radio that records every request and answers nothing.
/// Tests feed the completions back by hand.
#[derive(Default)]
pub struct MockCentral {
    pub calls: Arc<Mutex<Vec<CentralCall>>>,
    pub fail_scan_start: bool,
    pub fail_connect: bool,
}

impl MockCentral {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<CentralCall> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: CentralCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl CentralRadio for MockCentral {
    async fn start_scan(&mut self, filter: &ScanFilter) -> Result<(), RadioError> {
        self.record(CentralCall::StartScan(filter.service));
        if self.fail_scan_start {
            return Err(RadioError::Unavailable("adapter powered off".into()));
        }
        Ok(())
    }

    async fn stop_scan(&mut self) -> Result<(), RadioError> {
        self.record(CentralCall::StopScan);
        Ok(())
    }

    async fn connect(&mut self, peer: &PeerId) -> Result<(), RadioError> {
        self.record(CentralCall::Connect(peer.clone()));
        if self.fail_connect {
            return Err(RadioError::Connect("out of range".into()));
        }
        Ok(())
    }

    async fn disconnect(&mut self, peer: &PeerId) -> Result<(), RadioError> {
        self.record(CentralCall::Disconnect(peer.clone()));
        Ok(())
    }

    async fn discover_services(&mut self, peer: &PeerId) -> Result<(), RadioError> {
        self.record(CentralCall::DiscoverServices(peer.clone()));
        Ok(())
    }

    async fn enable_notifications(
        &mut self,
        peer: &PeerId,
        _service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), RadioError> {
        self.record(CentralCall::EnableNotifications(peer.clone(), characteristic));
        Ok(())
    }

    async fn write_characteristic(
        &mut self,
        peer: &PeerId,
        _service: Uuid,
        _characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), RadioError> {
        self.record(CentralCall::Write(peer.clone(), value.to_vec()));
        Ok(())
    }

    async fn read_signal_strength(&mut self, peer: &PeerId) -> Result<(), RadioError> {
        self.record(CentralCall::ReadSignal(peer.clone()));
        Ok(())
    }

    async fn power_off(&mut self) -> Result<(), RadioError> {
        self.record(CentralCall::PowerOff);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PeripheralCall {
    OpenServer(GattServiceSpec),
    StartAdvertising(AdvertiseSettings),
    StopAdvertising,
    Notify(Vec<PeerId>, Uuid, Vec<u8>),
    CloseServer,
    PowerOff,
}

/// Peripheral radio that records every request.
#[derive(Default)]
pub struct MockPeripheral {
    pub calls: Arc<Mutex<Vec<PeripheralCall>>>,
    /// Number of advertising attempts that fail before one succeeds.
    pub advertise_failures: usize,
}

impl MockPeripheral {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PeripheralCall> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: PeripheralCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl PeripheralRadio for MockPeripheral {
    async fn open_server(&mut self, spec: &GattServiceSpec) -> Result<(), RadioError> {
        self.record(PeripheralCall::OpenServer(*spec));
        Ok(())
    }

    async fn start_advertising(&mut self, settings: &AdvertiseSettings) -> Result<(), RadioError> {
        self.record(PeripheralCall::StartAdvertising(settings.clone()));
        if self.advertise_failures > 0 {
            self.advertise_failures -= 1;
            return Err(RadioError::Advertise("too many advertisers".into()));
        }
        Ok(())
    }

    async fn stop_advertising(&mut self) -> Result<(), RadioError> {
        self.record(PeripheralCall::StopAdvertising);
        Ok(())
    }

    async fn notify(
        &mut self,
        peers: &[PeerId],
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), RadioError> {
        self.record(PeripheralCall::Notify(
            peers.to_vec(),
            characteristic,
            value.to_vec(),
        ));
        Ok(())
    }

    async fn close_server(&mut self) -> Result<(), RadioError> {
        self.record(PeripheralCall::CloseServer);
        Ok(())
    }

    async fn power_off(&mut self) -> Result<(), RadioError> {
        self.record(PeripheralCall::PowerOff);
        Ok(())
    }
}

/// Write request as a connected central would issue it.
pub fn write_request(
    from: PeerId,
    characteristic: Uuid,
    value: &[u8],
) -> (PeripheralEvent, tokio::sync::oneshot::Receiver<()>) {
    let (responder, ack) = WriteResponder::new();
    let event = PeripheralEvent::CharacteristicWrite(WriteRequest {
        peer: from,
        characteristic,
        value: value.to_vec(),
        responder,
    });
    (event, ack)
}

/// Central half of an in-memory link between two devices.
///
/// Requests are answered immediately: the server peer is found on every
/// scan, connections succeed, and writes land in the server's event queue.
pub struct LoopbackCentral {
    /// Address the local device has on the remote side.
    pub local: PeerId,
    /// Address of the remote server.
    pub remote: PeerId,
    pub rssi: i32,
    pub client_events: mpsc::UnboundedSender<CentralEvent>,
    pub server_events: mpsc::UnboundedSender<PeripheralEvent>,
    pub calls: Arc<Mutex<Vec<CentralCall>>>,
}

impl LoopbackCentral {
    fn record(&self, call: CentralCall) {
        self.calls.lock().push(call);
    }

    fn emit(&self, event: CentralEvent) {
        let _ = self.client_events.send(event);
    }
}

#[async_trait]
impl CentralRadio for LoopbackCentral {
    async fn start_scan(&mut self, filter: &ScanFilter) -> Result<(), RadioError> {
        self.record(CentralCall::StartScan(filter.service));
        self.emit(CentralEvent::PeerDiscovered {
            peer: self.remote.clone(),
            rssi: Some(self.rssi),
        });
        Ok(())
    }

    async fn stop_scan(&mut self) -> Result<(), RadioError> {
        self.record(CentralCall::StopScan);
        Ok(())
    }

    async fn connect(&mut self, peer: &PeerId) -> Result<(), RadioError> {
        self.record(CentralCall::Connect(peer.clone()));
        let _ = self.server_events.send(PeripheralEvent::ConnectionStateChanged {
            peer: self.local.clone(),
            connected: true,
        });
        self.emit(CentralEvent::ConnectionStateChanged {
            peer: peer.clone(),
            result: Ok(LinkState::Connected),
        });
        Ok(())
    }

    async fn disconnect(&mut self, peer: &PeerId) -> Result<(), RadioError> {
        self.record(CentralCall::Disconnect(peer.clone()));
        let _ = self.server_events.send(PeripheralEvent::ConnectionStateChanged {
            peer: self.local.clone(),
            connected: false,
        });
        Ok(())
    }

    async fn discover_services(&mut self, peer: &PeerId) -> Result<(), RadioError> {
        self.record(CentralCall::DiscoverServices(peer.clone()));
        self.emit(CentralEvent::ServicesDiscovered {
            peer: peer.clone(),
            result: Ok(vec![pairing_service()]),
        });
        Ok(())
    }

    async fn enable_notifications(
        &mut self,
        peer: &PeerId,
        _service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), RadioError> {
        self.record(CentralCall::EnableNotifications(peer.clone(), characteristic));
        Ok(())
    }

    async fn write_characteristic(
        &mut self,
        peer: &PeerId,
        _service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), RadioError> {
        self.record(CentralCall::Write(peer.clone(), value.to_vec()));
        let _ = self
            .server_events
            .send(PeripheralEvent::CharacteristicWrite(WriteRequest {
                peer: self.local.clone(),
                characteristic,
                value: value.to_vec(),
                responder: WriteResponder::detached(),
            }));
        self.emit(CentralEvent::WriteCompleted {
            peer: peer.clone(),
            characteristic,
            result: Ok(()),
        });
        Ok(())
    }

    async fn read_signal_strength(&mut self, peer: &PeerId) -> Result<(), RadioError> {
        self.record(CentralCall::ReadSignal(peer.clone()));
        self.emit(CentralEvent::SignalStrength {
            peer: peer.clone(),
            result: Ok(self.rssi),
        });
        Ok(())
    }

    async fn power_off(&mut self) -> Result<(), RadioError> {
        self.record(CentralCall::PowerOff);
        Ok(())
    }
}

/// Peripheral half of the in-memory link: notifications go straight to
/// the remote client's event queue.
pub struct LoopbackPeripheral {
    /// Address of this server as the remote client sees it.
    pub local: PeerId,
    pub client_events: mpsc::UnboundedSender<CentralEvent>,
    pub calls: Arc<Mutex<Vec<PeripheralCall>>>,
}

impl LoopbackPeripheral {
    fn record(&self, call: PeripheralCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl PeripheralRadio for LoopbackPeripheral {
    async fn open_server(&mut self, spec: &GattServiceSpec) -> Result<(), RadioError> {
        self.record(PeripheralCall::OpenServer(*spec));
        Ok(())
    }

    async fn start_advertising(&mut self, settings: &AdvertiseSettings) -> Result<(), RadioError> {
        self.record(PeripheralCall::StartAdvertising(settings.clone()));
        Ok(())
    }

    async fn stop_advertising(&mut self) -> Result<(), RadioError> {
        self.record(PeripheralCall::StopAdvertising);
        Ok(())
    }

    async fn notify(
        &mut self,
        peers: &[PeerId],
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), RadioError> {
        self.record(PeripheralCall::Notify(
            peers.to_vec(),
            characteristic,
            value.to_vec(),
        ));
        let _ = self.client_events.send(CentralEvent::ValueReceived {
            peer: self.local.clone(),
            characteristic,
            value: value.to_vec(),
        });
        Ok(())
    }

    async fn close_server(&mut self) -> Result<(), RadioError> {
        self.record(PeripheralCall::CloseServer);
        Ok(())
    }

    async fn power_off(&mut self) -> Result<(), RadioError> {
        self.record(PeripheralCall::PowerOff);
        Ok(())
    }
}
