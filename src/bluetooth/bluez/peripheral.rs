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

//! Peripheral (advertiser/server) radio on top of BlueZ.

use async_trait::async_trait;
use bluer::adv::{Advertisement, AdvertisementHandle, Type as AdvertisementType};
use bluer::gatt::local::{
    Application, ApplicationHandle, Characteristic, CharacteristicNotify,
    CharacteristicNotifyMethod, CharacteristicWrite, CharacteristicWriteMethod,
    CharacteristicWriteRequest, ReqError, Service,
};
use bluer::{Adapter, Address};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::peer_id;
use crate::bluetooth::ble_constants::timing;
use crate::bluetooth::radio::{
    AdvertiseSettings, GattServiceSpec, PeerId, PeripheralEvent, PeripheralRadio,
    WriteRequest, WriteResponder,
};
use crate::error::RadioError;

type Subscribers = Arc<Mutex<Vec<mpsc::Sender<Vec<u8>>>>>;

/// Centrals already reported as connected.
type Connected = Arc<Mutex<HashSet<Address>>>;

/// [`PeripheralRadio`] backed by a BlueZ adapter.
///
/// BlueZ does not say which central subscribed to a notification, so
/// [`notify`](PeripheralRadio::notify) reaches every subscriber.
pub struct BluezPeripheral {
    adapter: Adapter,
    events: mpsc::UnboundedSender<PeripheralEvent>,
    app_handle: Option<ApplicationHandle>,
    adv_handle: Option<AdvertisementHandle>,
    subscribers: Subscribers,
    connected: Connected,
    poll_task: Option<JoinHandle<()>>,
}

impl BluezPeripheral {
    pub fn new(adapter: Adapter, events: mpsc::UnboundedSender<PeripheralEvent>) -> Self {
        Self {
            adapter,
            events,
            app_handle: None,
            adv_handle: None,
            subscribers: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(Mutex::new(HashSet::new())),
            poll_task: None,
        }
    }

    fn build_application(&self, spec: &GattServiceSpec) -> Application {
        let characteristic = spec.characteristic;
        let write_events = self.events.clone();
        let writers = self.connected.clone();
        let subscribers = self.subscribers.clone();

        let write = CharacteristicWrite {
            write: true,
            write_without_response: true,
            method: CharacteristicWriteMethod::Fun(Box::new(
                move |value: Vec<u8>, req: CharacteristicWriteRequest| {
                    let events = write_events.clone();
                    let writers = writers.clone();
                    Box::pin(async move {
                        // A write can arrive before the poll has seen the link.
                        let address = req.device_address;
                        if writers.lock().insert(address) {
                            let _ = events.send(PeripheralEvent::ConnectionStateChanged {
                                peer: peer_id(address),
                                connected: true,
                            });
                        }

                        let (responder, ack) = WriteResponder::new();
                        let request = WriteRequest {
                            peer: peer_id(address),
                            characteristic,
                            value,
                            responder,
                        };
                        if events
                            .send(PeripheralEvent::CharacteristicWrite(request))
                            .is_err()
                        {
                            return Err(ReqError::Failed);
                        }
                        // Dropped unanswered when the server ignores the write.
                        let _ = ack.await;
                        Ok(())
                    })
                },
            )),
            ..Default::default()
        };

        let notify = CharacteristicNotify {
            notify: true,
            method: CharacteristicNotifyMethod::Fun(Box::new(move |mut notifier| {
                let subscribers = subscribers.clone();
                Box::pin(async move {
                    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(16);
                    subscribers.lock().push(tx);
                    debug!("Notification subscriber added");

                    while let Some(value) = rx.recv().await {
                        if let Err(e) = notifier.notify(value).await {
                            warn!("Failed to send notification: {}", e);
                            break;
                        }
                    }
                    debug!("Notification subscriber gone");
                })
            })),
            ..Default::default()
        };

        Application {
            services: vec![Service {
                uuid: spec.service,
                primary: true,
                characteristics: vec![Characteristic {
                    uuid: characteristic,
                    write: Some(write),
                    notify: Some(notify),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    /// Report centrals connecting and disconnecting.
    ///
    /// BlueZ has no connection callback for local GATT servers, so this
    /// polls. The write handler shares the same set and reports a writer
    /// the poll has not caught yet.
    fn spawn_connection_poll(&mut self) {
        let adapter = self.adapter.clone();
        let events = self.events.clone();
        let connected = self.connected.clone();

        self.poll_task = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(timing::CONNECTION_POLL).await;

                let addresses = match adapter.device_addresses().await {
                    Ok(addresses) => addresses,
                    Err(e) => {
                        error!("BlueZ poll: failed to query device addresses: {}", e);
                        continue;
                    }
                };

                let mut now = HashSet::new();
                for addr in addresses {
                    let Ok(device) = adapter.device(addr) else {
                        continue;
                    };
                    if let Ok(true) = device.is_connected().await {
                        now.insert(addr);
                    }
                }

                let mut known = connected.lock();
                for addr in now.difference(&known) {
                    let _ = events.send(PeripheralEvent::ConnectionStateChanged {
                        peer: peer_id(*addr),
                        connected: true,
                    });
                }
                for addr in known.difference(&now) {
                    let _ = events.send(PeripheralEvent::ConnectionStateChanged {
                        peer: peer_id(*addr),
                        connected: false,
                    });
                }
                *known = now;
            }
        }));
    }
}

impl Drop for BluezPeripheral {
    fn drop(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl PeripheralRadio for BluezPeripheral {
    async fn open_server(&mut self, spec: &GattServiceSpec) -> Result<(), RadioError> {
        let app = self.build_application(spec);
        self.app_handle = Some(self.adapter.serve_gatt_application(app).await?);
        self.spawn_connection_poll();
        info!("GATT service registered");
        Ok(())
    }

    async fn start_advertising(&mut self, settings: &AdvertiseSettings) -> Result<(), RadioError> {
        let local_name = if settings.include_device_name {
            Some(self.adapter.alias().await?)
        } else {
            None
        };
        let advertisement_type = if settings.connectable {
            AdvertisementType::Peripheral
        } else {
            AdvertisementType::Broadcast
        };

        let adv = Advertisement {
            advertisement_type,
            service_uuids: BTreeSet::from([settings.service]),
            discoverable: Some(true),
            local_name,
            timeout: settings.timeout,
            min_interval: Some(settings.mode.interval()),
            max_interval: Some(settings.mode.interval()),
            tx_power: Some(settings.tx_power.dbm()),
            ..Default::default()
        };

        let handle = self
            .adapter
            .advertise(adv)
            .await
            .map_err(|e| RadioError::Advertise(e.to_string()))?;
        self.adv_handle = Some(handle);

        info!("BLE advertising started");
        Ok(())
    }

    async fn stop_advertising(&mut self) -> Result<(), RadioError> {
        if self.adv_handle.take().is_some() {
            info!("BLE advertising stopped");
        }
        Ok(())
    }

    async fn notify(
        &mut self,
        peers: &[PeerId],
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), RadioError> {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| !tx.is_closed());
        if subscribers.is_empty() {
            return Err(RadioError::Gatt(format!(
                "no subscribers on {} ({} connected)",
                characteristic,
                peers.len()
            )));
        }

        for tx in subscribers.iter() {
            if let Err(e) = tx.try_send(value.to_vec()) {
                warn!("Dropping notification: {}", e);
            }
        }
        Ok(())
    }

    async fn close_server(&mut self) -> Result<(), RadioError> {
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
        self.subscribers.lock().clear();
        self.connected.lock().clear();
        if self.app_handle.take().is_some() {
            info!("GATT service unregistered");
        }
        Ok(())
    }

    async fn power_off(&mut self) -> Result<(), RadioError> {
        self.adv_handle = None;
        self.close_server().await?;
        self.adapter.set_powered(false).await?;
        info!("Bluetooth adapter powered off");
        Ok(())
    }
}
