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

//! Central (scanner/client) radio on top of BlueZ.

use async_trait::async_trait;
use bluer::gatt::remote::Characteristic;
use bluer::{
    Adapter, AdapterEvent, Device, DeviceEvent, DeviceProperty, DiscoveryFilter,
    DiscoveryTransport,
};
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{address, peer_id};
use crate::bluetooth::radio::{
    CentralEvent, CentralRadio, LinkState, PeerId, ScanFilter, ServiceInfo,
};
use crate::error::RadioError;

/// How long to wait for BlueZ to resolve a peer's services.
const SERVICE_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);
const SERVICE_RESOLVE_POLL: Duration = Duration::from_millis(200);

/// [`CentralRadio`] backed by a BlueZ adapter.
pub struct BluezCentral {
    adapter: Adapter,
    events: mpsc::UnboundedSender<CentralEvent>,
    scan_task: Option<JoinHandle<()>>,
    link_tasks: HashMap<PeerId, JoinHandle<()>>,
    notify_tasks: HashMap<PeerId, JoinHandle<()>>,
}

impl BluezCentral {
    pub fn new(adapter: Adapter, events: mpsc::UnboundedSender<CentralEvent>) -> Self {
        Self {
            adapter,
            events,
            scan_task: None,
            link_tasks: HashMap::new(),
            notify_tasks: HashMap::new(),
        }
    }

    fn device(&self, peer: &PeerId) -> Result<Device, RadioError> {
        Ok(self.adapter.device(address(peer)?)?)
    }

    fn abort_peer_tasks(&mut self, peer: &PeerId) {
        if let Some(task) = self.link_tasks.remove(peer) {
            task.abort();
        }
        if let Some(task) = self.notify_tasks.remove(peer) {
            task.abort();
        }
    }

    fn abort_all(&mut self) {
        if let Some(task) = self.scan_task.take() {
            task.abort();
        }
        for (_, task) in self.link_tasks.drain() {
            task.abort();
        }
        for (_, task) in self.notify_tasks.drain() {
            task.abort();
        }
    }
}

impl Drop for BluezCentral {
    fn drop(&mut self) {
        self.abort_all();
    }
}

async fn find_characteristic(
    device: &Device,
    service: Uuid,
    characteristic: Uuid,
) -> Result<Characteristic, RadioError> {
    for s in device.services().await? {
        if s.uuid().await? != service {
            continue;
        }
        for c in s.characteristics().await? {
            if c.uuid().await? == characteristic {
                return Ok(c);
            }
        }
    }
    Err(RadioError::Gatt(format!(
        "characteristic {} not found in service {}",
        characteristic, service
    )))
}

async fn resolve_services(device: &Device) -> Result<Vec<ServiceInfo>, RadioError> {
    let resolved = tokio::time::timeout(SERVICE_RESOLVE_TIMEOUT, async {
        while !device.is_services_resolved().await? {
            tokio::time::sleep(SERVICE_RESOLVE_POLL).await;
        }
        Ok::<_, RadioError>(())
    })
    .await;

    match resolved {
        Ok(result) => result?,
        Err(_) => return Err(RadioError::Gatt("service resolution timed out".into())),
    }

    let mut services = Vec::new();
    for service in device.services().await? {
        let mut characteristics = Vec::new();
        for c in service.characteristics().await? {
            characteristics.push(c.uuid().await?);
        }
        services.push(ServiceInfo {
            uuid: service.uuid().await?,
            characteristics,
        });
    }
    Ok(services)
}

#[async_trait]
impl CentralRadio for BluezCentral {
    async fn start_scan(&mut self, filter: &ScanFilter) -> Result<(), RadioError> {
        if let Some(task) = self.scan_task.take() {
            task.abort();
        }

        let discovery_filter = DiscoveryFilter {
            uuids: HashSet::from([filter.service]),
            transport: DiscoveryTransport::Le,
            ..Default::default()
        };
        self.adapter
            .set_discovery_filter(discovery_filter)
            .await
            .map_err(|e| RadioError::Scan(e.to_string()))?;

        let stream = self
            .adapter
            .discover_devices()
            .await
            .map_err(|e| RadioError::Scan(e.to_string()))?;

        let adapter = self.adapter.clone();
        let events = self.events.clone();
        let service = filter.service;

        self.scan_task = Some(tokio::spawn(async move {
            let mut stream = Box::pin(stream);
            while let Some(event) = stream.next().await {
                let AdapterEvent::DeviceAdded(addr) = event else {
                    continue;
                };
                let Ok(device) = adapter.device(addr) else {
                    continue;
                };

                let advertises_service = match device.uuids().await {
                    Ok(Some(uuids)) => uuids.contains(&service),
                    _ => false,
                };
                if !advertises_service {
                    continue;
                }

                let rssi = device.rssi().await.ok().flatten().map(i32::from);
                let _ = events.send(CentralEvent::PeerDiscovered {
                    peer: peer_id(addr),
                    rssi,
                });
            }

            warn!("Discovery stream ended");
            let _ = events.send(CentralEvent::ScanFailed(RadioError::Scan(
                "discovery stream ended".into(),
            )));
        }));

        Ok(())
    }

    async fn stop_scan(&mut self) -> Result<(), RadioError> {
        // Dropping the discovery stream ends the session with BlueZ.
        if let Some(task) = self.scan_task.take() {
            task.abort();
        }
        Ok(())
    }

    async fn connect(&mut self, peer: &PeerId) -> Result<(), RadioError> {
        let device = self.device(peer)?;
        self.abort_peer_tasks(peer);

        let events = self.events.clone();
        let peer = peer.clone();
        let task_peer = peer.clone();

        let task = tokio::spawn(async move {
            let peer = task_peer;
            let device_events = match device.events().await {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = events.send(CentralEvent::ConnectionStateChanged {
                        peer,
                        result: Err(RadioError::Connect(e.to_string())),
                    });
                    return;
                }
            };

            if let Err(e) = device.connect().await {
                let _ = events.send(CentralEvent::ConnectionStateChanged {
                    peer,
                    result: Err(RadioError::Connect(e.to_string())),
                });
                return;
            }
            let _ = events.send(CentralEvent::ConnectionStateChanged {
                peer: peer.clone(),
                result: Ok(LinkState::Connected),
            });

            let mut device_events = Box::pin(device_events);
            while let Some(event) = device_events.next().await {
                if let DeviceEvent::PropertyChanged(DeviceProperty::Connected(false)) = event {
                    let _ = events.send(CentralEvent::ConnectionStateChanged {
                        peer,
                        result: Ok(LinkState::Disconnected),
                    });
                    break;
                }
            }
        });

        self.link_tasks.insert(peer, task);
        Ok(())
    }

    async fn disconnect(&mut self, peer: &PeerId) -> Result<(), RadioError> {
        self.abort_peer_tasks(peer);
        let device = self.device(peer)?;
        if device.is_connected().await? {
            device.disconnect().await?;
            info!("Disconnected from {}", peer);
        }
        Ok(())
    }

    async fn discover_services(&mut self, peer: &PeerId) -> Result<(), RadioError> {
        let device = self.device(peer)?;
        let events = self.events.clone();
        let peer = peer.clone();

        tokio::spawn(async move {
            let result = resolve_services(&device).await;
            let _ = events.send(CentralEvent::ServicesDiscovered { peer, result });
        });
        Ok(())
    }

    async fn enable_notifications(
        &mut self,
        peer: &PeerId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), RadioError> {
        let device = self.device(peer)?;
        let remote = find_characteristic(&device, service, characteristic).await?;
        let values = remote.notify().await?;

        let events = self.events.clone();
        let task_peer = peer.clone();
        let task = tokio::spawn(async move {
            let mut values = Box::pin(values);
            while let Some(value) = values.next().await {
                let _ = events.send(CentralEvent::ValueReceived {
                    peer: task_peer.clone(),
                    characteristic,
                    value,
                });
            }
            debug!("Notification stream from {} ended", task_peer);
        });

        if let Some(old) = self.notify_tasks.insert(peer.clone(), task) {
            old.abort();
        }
        debug!("Notifications enabled on {} for {}", characteristic, peer);
        Ok(())
    }

    async fn write_characteristic(
        &mut self,
        peer: &PeerId,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), RadioError> {
        let device = self.device(peer)?;
        let remote = find_characteristic(&device, service, characteristic).await?;

        let result = remote.write(value).await.map_err(RadioError::from);
        let _ = self.events.send(CentralEvent::WriteCompleted {
            peer: peer.clone(),
            characteristic,
            result,
        });
        Ok(())
    }

    async fn read_signal_strength(&mut self, peer: &PeerId) -> Result<(), RadioError> {
        let device = self.device(peer)?;

        // BlueZ only refreshes RSSI from advertising reports.
        let result = match device.rssi().await {
            Ok(Some(rssi)) => Ok(i32::from(rssi)),
            Ok(None) => Err(RadioError::Gatt("no signal strength reported".into())),
            Err(e) => Err(e.into()),
        };
        let _ = self.events.send(CentralEvent::SignalStrength {
            peer: peer.clone(),
            result,
        });
        Ok(())
    }

    async fn power_off(&mut self) -> Result<(), RadioError> {
        self.abort_all();
        self.adapter.set_powered(false).await?;
        info!("Bluetooth adapter powered off");
        Ok(())
    }
}
