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

//! Advertiser/server role.
//!
//! Hosts the pairing service, answers the match-control token with its
//! reversal to every connected device, and completes the match when a
//! client writes the friend token.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::ble_constants::{timing, CHARACTERISTIC_UUID, SERVICE_UUID};
use super::protocol::{display_value, Token, Tokens};
use super::radio::{
    AdvertiseSettings, GattServiceSpec, PeerId, PeripheralEvent, PeripheralRadio, WriteRequest,
};
use super::registry::DeviceRegistry;
use super::timer::{self, ServerTimer, Timers};
use crate::events::Role;
use crate::state::MatchCoordinator;

/// State of the server role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    /// Service registration or advertising has not succeeded yet.
    Initializing,
    Advertising,
    /// Echo sent, waiting for the friend token.
    HandshakePending,
    /// Terminal.
    Matched,
    /// Halted by the host or by the other role matching. Terminal.
    Disabled,
}

impl ServerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServerState::Matched | ServerState::Disabled)
    }
}

/// Server role settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub service: Uuid,
    pub characteristic: Uuid,
    pub tokens: Tokens,
    /// Delay before retrying a failed registration or advertisement.
    pub advertise_retry: Duration,
    pub power_off_on_match: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            service: SERVICE_UUID,
            characteristic: CHARACTERISTIC_UUID,
            tokens: Tokens::default(),
            advertise_retry: timing::ADVERTISE_RETRY,
            power_off_on_match: true,
        }
    }
}

mod info_text {
    pub const READY: &str = "Server is ready to pair";
    pub const PAIRED: &str = "Server is paired";
    pub const CHARACTERISTIC_MISMATCH: &str = "Characteristic ids don't match";
    pub const UNEXPECTED_MESSAGE: &str = "Device sent an unexpected message";
}

/// Server-side pairing state machine.
pub struct ServerSession<P> {
    radio: P,
    config: ServerConfig,
    coordinator: Arc<MatchCoordinator>,
    registry: DeviceRegistry,
    state: ServerState,
    server_open: bool,
    advertising: bool,
    handshakes: Vec<PeerId>,
    timers: Timers<ServerTimer>,
}

impl<P: PeripheralRadio> ServerSession<P> {
    pub fn new(radio: P, config: ServerConfig, coordinator: Arc<MatchCoordinator>) -> Self {
        Self {
            radio,
            config,
            coordinator,
            registry: DeviceRegistry::new(),
            state: ServerState::Idle,
            server_open: false,
            advertising: false,
            handshakes: Vec::new(),
            timers: Timers::default(),
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn is_advertising(&self) -> bool {
        self.advertising
    }

    /// Peers that have completed the echo step.
    pub fn pending_handshakes(&self) -> &[PeerId] {
        &self.handshakes
    }

    pub fn radio(&self) -> &P {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut P {
        &mut self.radio
    }

    pub fn take_timers(&mut self) -> Vec<(ServerTimer, Duration)> {
        self.timers.drain()
    }

    /// Register the service and start advertising.
    ///
    /// Failures are logged and retried after `advertise_retry`.
    pub async fn start(&mut self) {
        if self.state.is_terminal() || self.coordinator.is_matched() {
            return;
        }
        self.state = ServerState::Initializing;

        if !self.server_open {
            let spec = GattServiceSpec {
                service: self.config.service,
                characteristic: self.config.characteristic,
            };
            match self.radio.open_server(&spec).await {
                Ok(()) => {
                    self.server_open = true;
                    info!("GATT service {} registered", self.config.service);
                }
                Err(e) => {
                    error!("Failed to open GATT server: {}", e);
                    self.schedule_retry();
                    return;
                }
            }
        }

        if !self.advertising {
            let settings = AdvertiseSettings::pairing(self.config.service);
            match self.radio.start_advertising(&settings).await {
                Ok(()) => {
                    self.advertising = true;
                    info!("BLE advertising started");
                }
                Err(e) => {
                    error!("BLE advertising failed: {}", e);
                    self.schedule_retry();
                    return;
                }
            }
        }

        self.state = if self.handshakes.is_empty() {
            ServerState::Advertising
        } else {
            ServerState::HandshakePending
        };
    }

    fn schedule_retry(&mut self) {
        self.timers
            .schedule(ServerTimer::RetryAdvertising, self.config.advertise_retry);
    }

    pub async fn handle_timer(&mut self, timer: ServerTimer) {
        match timer {
            ServerTimer::RetryAdvertising => {
                if self.state == ServerState::Initializing {
                    info!("Retrying GATT server start");
                    self.start().await;
                }
            }
        }
    }

    pub async fn handle_event(&mut self, event: PeripheralEvent) {
        match event {
            PeripheralEvent::ConnectionStateChanged { peer, connected } => {
                self.on_connection_state(peer, connected)
            }
            PeripheralEvent::CharacteristicWrite(request) => self.on_write(request).await,
        }
    }

    fn on_connection_state(&mut self, peer: PeerId, connected: bool) {
        if connected {
            if self.registry.add(peer.clone()) {
                info!("Device connected: {}", peer);
            }
        } else {
            if self.registry.remove(&peer) {
                info!("Device disconnected: {}", peer);
            }
            self.handshakes.retain(|p| p != &peer);
            if self.state == ServerState::HandshakePending && self.handshakes.is_empty() {
                self.state = ServerState::Advertising;
            }
        }
    }

    async fn on_write(&mut self, mut request: WriteRequest) {
        let token = self.config.tokens.classify(&request.value);
        debug!(
            "Write from {} on {}: '{}'",
            request.peer,
            request.characteristic,
            display_value(&request.value)
        );

        if self.state.is_terminal() || self.coordinator.is_matched() {
            if token == Some(Token::Friend) {
                request.responder.respond();
                debug!("Repeated friend token from {}", request.peer);
            } else {
                debug!("Ignoring write from {} after pairing ended", request.peer);
            }
            return;
        }

        if request.characteristic != self.config.characteristic {
            warn!(
                "Write on unknown characteristic {} from {}",
                request.characteristic, request.peer
            );
            self.coordinator
                .set_info(Role::Server, info_text::CHARACTERISTIC_MISMATCH);
            return;
        }

        // Only the two tokens are acknowledged, before their effects run.
        match token {
            Some(Token::MatchControl) => {
                request.responder.respond();
                self.on_match_control(request.peer, &request.value).await
            }
            Some(Token::Friend) => {
                request.responder.respond();
                self.on_friend(request.peer).await
            }
            None => {
                warn!(
                    "Unexpected value '{}' from {}",
                    display_value(&request.value),
                    request.peer
                );
                self.coordinator
                    .set_info(Role::Server, info_text::UNEXPECTED_MESSAGE);
            }
        }
    }

    async fn on_match_control(&mut self, peer: PeerId, value: &[u8]) {
        let echo = self.config.tokens.echo(value);
        let devices = self.registry.devices().to_vec();
        match self
            .radio
            .notify(&devices, self.config.characteristic, &echo)
            .await
        {
            Ok(()) => info!("Echoed match-control token to {} device(s)", devices.len()),
            Err(e) => error!("Failed to notify echo: {}", e),
        }

        if !self.handshakes.contains(&peer) {
            self.handshakes.push(peer);
        }
        if self.state == ServerState::Advertising {
            self.state = ServerState::HandshakePending;
        }
        self.coordinator.set_info(Role::Server, info_text::READY);
    }

    async fn on_friend(&mut self, peer: PeerId) {
        info!("Friend token received from {}", peer);
        self.coordinator.set_info(Role::Server, info_text::PAIRED);
        self.coordinator.freeze_info();
        self.coordinator.try_set_matched(Role::Server);
        self.state = ServerState::Matched;

        self.shutdown_radio().await;
        self.registry.clear();
        self.handshakes.clear();
        if self.config.power_off_on_match {
            if let Err(e) = self.radio.power_off().await {
                error!("Failed to disable the radio: {}", e);
            }
        }
    }

    /// Stop advertising and unregister the service.
    async fn shutdown_radio(&mut self) {
        if self.advertising {
            if let Err(e) = self.radio.stop_advertising().await {
                warn!("Stopping advertisement: {}", e);
            }
            self.advertising = false;
        }
        if self.server_open {
            if let Err(e) = self.radio.close_server().await {
                warn!("Closing GATT server: {}", e);
            }
            self.server_open = false;
        }
    }

    /// Stop signal or the client role matched.
    pub async fn halt(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.shutdown_radio().await;
        self.registry.clear();
        self.handshakes.clear();
        self.state = ServerState::Disabled;
        info!("Server halted");
    }

    /// Run the server until it matches or is stopped.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<PeripheralEvent>,
        mut stop: watch::Receiver<bool>,
    ) -> ServerState {
        let (timer_tx, mut timer_rx) = mpsc::unbounded_channel();
        let mut matched = self.coordinator.subscribe();

        if *stop.borrow() || self.coordinator.is_matched() {
            return ServerState::Disabled;
        }

        self.start().await;
        self.arm_timers(&timer_tx);

        while !self.state.is_terminal() {
            tokio::select! {
                Some(event) = events.recv() => self.handle_event(event).await,
                Some(timer) = timer_rx.recv() => self.handle_timer(timer).await,
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        info!("Stop signal received");
                        self.halt().await;
                    }
                }
                Ok(()) = matched.changed() => {
                    if *matched.borrow() && !self.state.is_terminal() {
                        info!("Matched by the client role, stopping server");
                        self.halt().await;
                    }
                }
            }
            self.arm_timers(&timer_tx);
        }

        self.state
    }

    fn arm_timers(&mut self, tx: &mpsc::UnboundedSender<ServerTimer>) {
        for (t, after) in self.timers.drain() {
            timer::arm(tx, t, after);
        }
    }
}
