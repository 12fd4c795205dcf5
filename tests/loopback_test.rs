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

//! Two devices paired over an in-memory link: device A scans, device B
//! advertises.

mod common;

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use common::{drain_host, peer, CentralCall, LoopbackCentral, LoopbackPeripheral, PeripheralCall};
use proxpair::bluetooth::{
    ClientConfig, ClientSession, ClientState, ServerConfig, ServerSession, ServerState,
};
use proxpair::{HostEvent, MatchCoordinator, Role};

struct Link {
    client: JoinHandle<ClientState>,
    server: JoinHandle<ServerState>,
    client_calls: Arc<Mutex<Vec<CentralCall>>>,
    server_calls: Arc<Mutex<Vec<PeripheralCall>>>,
    coordinator_a: Arc<MatchCoordinator>,
    coordinator_b: Arc<MatchCoordinator>,
    host_a: mpsc::UnboundedReceiver<HostEvent>,
    host_b: mpsc::UnboundedReceiver<HostEvent>,
    stop: watch::Sender<bool>,
}

fn link(rssi: i32) -> Link {
    let (client_tx, client_rx) = mpsc::unbounded_channel();
    let (server_tx, server_rx) = mpsc::unbounded_channel();
    let (stop, stop_rx) = watch::channel(false);

    let central = LoopbackCentral {
        local: peer(0xA),
        remote: peer(0xB),
        rssi,
        client_events: client_tx.clone(),
        server_events: server_tx,
        calls: Arc::default(),
    };
    let peripheral = LoopbackPeripheral {
        local: peer(0xB),
        client_events: client_tx,
        calls: Arc::default(),
    };
    let client_calls = central.calls.clone();
    let server_calls = peripheral.calls.clone();

    let (host_a_tx, host_a) = mpsc::unbounded_channel();
    let (host_b_tx, host_b) = mpsc::unbounded_channel();
    let coordinator_a = MatchCoordinator::new(host_a_tx);
    let coordinator_b = MatchCoordinator::new(host_b_tx);

    let client = ClientSession::new(central, ClientConfig::default(), coordinator_a.clone());
    let server = ServerSession::new(peripheral, ServerConfig::default(), coordinator_b.clone());

    Link {
        client: tokio::spawn(client.run(client_rx, stop_rx.clone())),
        server: tokio::spawn(server.run(server_rx, stop_rx)),
        client_calls,
        server_calls,
        coordinator_a,
        coordinator_b,
        host_a,
        host_b,
        stop,
    }
}

#[tokio::test(start_paused = true)]
async fn test_close_devices_pair() {
    let mut link = link(-45);

    assert_eq!(link.client.await.unwrap(), ClientState::Matched);
    assert_eq!(link.server.await.unwrap(), ServerState::Matched);

    assert!(link.coordinator_a.is_matched());
    assert!(link.coordinator_b.is_matched());
    assert_eq!(link.coordinator_a.info(), "Client is paired");
    assert_eq!(link.coordinator_b.info(), "Server is paired");

    assert!(drain_host(&mut link.host_a).contains(&HostEvent::Matched { role: Role::Client }));
    assert!(drain_host(&mut link.host_b).contains(&HostEvent::Matched { role: Role::Server }));

    let client_calls = link.client_calls.lock().clone();
    assert!(client_calls.contains(&CentralCall::Write(peer(0xB), b"XEE_KIDS_FRIEND".to_vec())));
    assert_eq!(client_calls.last(), Some(&CentralCall::PowerOff));

    let server_calls = link.server_calls.lock().clone();
    assert!(server_calls.contains(&PeripheralCall::Notify(
        vec![peer(0xA)],
        proxpair::bluetooth::ble_constants::CHARACTERISTIC_UUID,
        b"HCTAW_TRAMS_SDIK_EEX".to_vec(),
    )));
    assert_eq!(server_calls.last(), Some(&PeripheralCall::PowerOff));
}

#[tokio::test(start_paused = true)]
async fn test_distant_devices_keep_sampling() {
    let link = link(-80);

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(!link.coordinator_a.is_matched());
    assert!(!link.coordinator_b.is_matched());
    assert_eq!(link.coordinator_a.info(), "Client is ready to pair");
    assert_eq!(link.coordinator_b.info(), "Server is ready to pair");

    let samples = link
        .client_calls
        .lock()
        .iter()
        .filter(|c| matches!(c, CentralCall::ReadSignal(_)))
        .count();
    assert!(samples >= 10, "expected one sample per second, got {}", samples);

    link.stop.send(true).unwrap();
    assert_eq!(link.client.await.unwrap(), ClientState::Disabled);
    assert_eq!(link.server.await.unwrap(), ServerState::Disabled);
}
