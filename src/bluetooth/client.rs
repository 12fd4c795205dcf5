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

//! Scanner/client role.
//!
//! The client scans for the pairing service, connects to what it finds,
//! writes the match-control token, waits for the server to echo it back
//! reversed, then samples signal strength until the peer is close enough
//! and finally writes the friend token.
//!
//! Every failure before that point tears the link down and moves on to
//! the next peer found in the same scan window, or back to scanning once
//! none are left. All state lives in [`ClientSession`] and is only touched from
//! its own run loop.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::ble_constants::{timing, CHARACTERISTIC_UUID, SERVICE_UUID};
use super::connection::{ClientState, Connection};
use super::protocol::{display_value, Token, Tokens};
use super::proximity::ProximityGate;
use super::radio::{CentralEvent, CentralRadio, LinkState, PeerId, ServiceInfo};
use super::scanner::{ScanController, WindowOutcome};
use super::timer::{self, ClientTimer, Timers};
use crate::error::{PairingFailure, RadioError};
use crate::events::Role;
use crate::state::MatchCoordinator;

/// Client role settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub service: Uuid,
    pub characteristic: Uuid,
    pub tokens: Tokens,
    pub scan_window: Duration,
    pub proximity: ProximityGate,
    /// Disable the adapter once matched.
    pub power_off_on_match: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service: SERVICE_UUID,
            characteristic: CHARACTERISTIC_UUID,
            tokens: Tokens::default(),
            scan_window: timing::SCAN_WINDOW,
            proximity: ProximityGate::default(),
            power_off_on_match: true,
        }
    }
}

/// Status texts published by the client.
mod info_text {
    pub const SCANNING: &str = "Looking for a device to pair with";
    pub const SERVICE_NOT_FOUND: &str = "Pairing service not found";
    pub const READY: &str = "Client is ready to pair";
    pub const NOT_A_COUNTERPART: &str = "Device is not a valid counterpart";
    pub const PAIRED: &str = "Client is paired";
}

/// Client-side pairing state machine.
pub struct ClientSession<R> {
    radio: R,
    config: ClientConfig,
    coordinator: Arc<MatchCoordinator>,
    scanner: ScanController,
    connection: Option<Connection>,
    /// Peers from the last scan window not tried yet, in discovery order.
    candidates: VecDeque<PeerId>,
    phase: ClientState,
    next_epoch: u64,
    timers: Timers<ClientTimer>,
}

impl<R: CentralRadio> ClientSession<R> {
    pub fn new(radio: R, config: ClientConfig, coordinator: Arc<MatchCoordinator>) -> Self {
        let scanner = ScanController::new(config.service, config.scan_window);
        Self {
            radio,
            config,
            coordinator,
            scanner,
            connection: None,
            candidates: VecDeque::new(),
            phase: ClientState::Idle,
            next_epoch: 0,
            timers: Timers::default(),
        }
    }

    /// Current state: the live connection's if there is one.
    pub fn state(&self) -> ClientState {
        match &self.connection {
            Some(conn) => conn.state().clone(),
            None => self.phase.clone(),
        }
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn scanner(&self) -> &ScanController {
        &self.scanner
    }

    /// Peers still queued after the current connection attempt.
    pub fn candidates(&self) -> &VecDeque<PeerId> {
        &self.candidates
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Timers requested since the last call.
    pub fn take_timers(&mut self) -> Vec<(ClientTimer, Duration)> {
        self.timers.drain()
    }

    /// Kick off the first scan window.
    pub async fn start(&mut self) {
        self.candidates.clear();
        if self
            .scanner
            .start_scan(&mut self.radio, &self.coordinator, &mut self.timers)
            .await
        {
            self.coordinator.set_info(Role::Client, info_text::SCANNING);
        }
    }

    /// Handle one radio callback.
    pub async fn handle_event(&mut self, event: CentralEvent) {
        if self.state().is_terminal() {
            debug!("Client finished, ignoring {:?}", event);
            return;
        }

        match event {
            CentralEvent::PeerDiscovered { peer, rssi } => self.scanner.record(peer, rssi),
            CentralEvent::ScanFailed(e) => {
                if !self.scanner.is_scanning() {
                    debug!("Scan error outside a window: {}", e);
                    return;
                }
                error!("BLE scan failed: {}", e);
                self.phase = ClientState::Failed(PairingFailure::ScanFailure(e));
                self.restart_scan().await;
            }
            CentralEvent::ConnectionStateChanged { peer, result } => {
                self.on_connection_state(peer, result).await
            }
            CentralEvent::ServicesDiscovered { peer, result } => {
                self.on_services_discovered(peer, result).await
            }
            CentralEvent::ValueReceived {
                peer,
                characteristic,
                value,
            } => self.on_value(peer, characteristic, value).await,
            CentralEvent::WriteCompleted {
                peer,
                characteristic,
                result,
            } => self.on_write_completed(peer, characteristic, result).await,
            CentralEvent::SignalStrength { peer, result } => {
                self.on_signal_strength(peer, result).await
            }
        }
    }

    /// Handle one expired timer.
    pub async fn handle_timer(&mut self, timer: ClientTimer) {
        if self.state().is_terminal() {
            return;
        }

        match timer {
            ClientTimer::ScanWindow { epoch } => {
                match self.scanner.window_elapsed(epoch, &mut self.radio).await {
                    WindowOutcome::Stale => {}
                    WindowOutcome::Empty => {
                        info!("No scanning result");
                        self.restart_scan().await;
                    }
                    WindowOutcome::Candidates(peers) => self.connect_candidates(peers).await,
                }
            }
            ClientTimer::ProximityTick { epoch } => self.on_proximity_tick(epoch).await,
        }
    }

    /// Stop signal: halt scanning and drop the link without finishing the
    /// handshake.
    pub async fn halt(&mut self) {
        self.scanner.halt(&mut self.radio).await;
        self.candidates.clear();
        self.teardown().await;
        self.phase = ClientState::Disabled;
        info!("Client halted");
    }

    /// Run the client until it matches or is stopped.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<CentralEvent>,
        mut stop: watch::Receiver<bool>,
    ) -> ClientState {
        let (timer_tx, mut timer_rx) = mpsc::unbounded_channel();
        let mut matched = self.coordinator.subscribe();

        if *stop.borrow() || self.coordinator.is_matched() {
            return ClientState::Disabled;
        }

        self.start().await;
        self.arm_timers(&timer_tx);

        while !self.state().is_terminal() {
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
                    if *matched.borrow() && !self.state().is_terminal() {
                        info!("Matched by the server role, stopping client");
                        self.halt().await;
                    }
                }
            }
            self.arm_timers(&timer_tx);
        }

        self.state()
    }

    fn arm_timers(&mut self, tx: &mpsc::UnboundedSender<ClientTimer>) {
        for (t, after) in self.timers.drain() {
            timer::arm(tx, t, after);
        }
    }

    async fn restart_scan(&mut self) {
        self.candidates.clear();
        self.teardown().await;
        self.scanner
            .restart_scan(&mut self.radio, &self.coordinator, &mut self.timers)
            .await;
    }

    /// Disconnect and forget the live link, if any.
    async fn teardown(&mut self) {
        if let Some(conn) = self.connection.take() {
            info!("Closing GATT connection to {}", conn.peer());
            if let Err(e) = self.radio.disconnect(conn.peer()).await {
                debug!("Disconnect from {}: {}", conn.peer(), e);
            }
        }
    }

    /// Abandon the current attempt and try the next candidate.
    async fn fail(&mut self, reason: PairingFailure) {
        match &self.connection {
            Some(conn) => warn!("Pairing with {} failed: {}", conn.peer(), reason),
            None => warn!("Pairing failed: {}", reason),
        }
        self.teardown().await;
        self.phase = ClientState::Failed(reason);
        self.connect_next().await;
    }

    /// The connection if it belongs to `peer`.
    fn current(&mut self, peer: &PeerId) -> Option<&mut Connection> {
        self.connection.as_mut().filter(|c| c.peer() == peer)
    }

    async fn connect_candidates(&mut self, peers: Vec<PeerId>) {
        self.teardown().await;
        self.candidates = peers.into();
        self.connect_next().await;
    }

    /// Connect to the next queued candidate, rescanning once the queue is
    /// exhausted.
    async fn connect_next(&mut self) {
        while let Some(peer) = self.candidates.pop_front() {
            if self.coordinator.is_matched() {
                self.candidates.clear();
                return;
            }

            self.next_epoch += 1;
            info!("Connecting automatically to {}", peer);
            match self.radio.connect(&peer).await {
                Ok(()) => {
                    self.connection = Some(Connection::new(peer, self.next_epoch));
                    return;
                }
                Err(e) => {
                    error!("Connection to {} failed: {}", peer, e);
                    self.phase = ClientState::Failed(PairingFailure::ConnectFailure(e));
                }
            }
        }

        if !self.coordinator.is_matched() {
            self.restart_scan().await;
        }
    }

    async fn on_connection_state(&mut self, peer: PeerId, result: Result<LinkState, RadioError>) {
        let Some(conn) = self.current(&peer) else {
            debug!("Connection change for {} with no live link", peer);
            return;
        };

        match result {
            Err(e) => {
                error!("Connection GATT failure for {}: {}", peer, e);
                self.fail(PairingFailure::ConnectFailure(e)).await;
            }
            Ok(LinkState::Connected) => {
                if !conn.is(&ClientState::Connecting) {
                    debug!("Duplicate connected callback for {}", peer);
                    return;
                }
                conn.transition(ClientState::Connected);
                info!("Connected to device: {}", peer);

                match self.radio.discover_services(&peer).await {
                    Ok(()) => {
                        if let Some(conn) = self.current(&peer) {
                            conn.transition(ClientState::DiscoveringServices);
                        }
                    }
                    Err(e) => {
                        error!("Service discovery on {} failed to start: {}", peer, e);
                        self.fail(PairingFailure::ServiceNotFound).await;
                    }
                }
            }
            Ok(LinkState::Disconnected) => {
                info!("Disconnected from device {}", peer);
                self.fail(PairingFailure::LinkLost).await;
            }
        }
    }

    async fn on_services_discovered(
        &mut self,
        peer: PeerId,
        result: Result<Vec<ServiceInfo>, RadioError>,
    ) {
        let service = self.config.service;
        let characteristic = self.config.characteristic;

        match self.current(&peer) {
            Some(conn) if conn.is(&ClientState::DiscoveringServices) => {}
            _ => {
                debug!("Unexpected service discovery result from {}", peer);
                return;
            }
        }

        let found = match result {
            Ok(services) => services
                .iter()
                .any(|s| s.uuid == service && s.has_characteristic(characteristic)),
            Err(e) => {
                error!("No services on {}: {}", peer, e);
                false
            }
        };

        if !found {
            self.coordinator
                .set_info(Role::Client, info_text::SERVICE_NOT_FOUND);
            self.fail(PairingFailure::ServiceNotFound).await;
            return;
        }
        info!("Service discovered on {}", peer);

        if let Err(e) = self
            .radio
            .enable_notifications(&peer, service, characteristic)
            .await
        {
            error!("Enabling notifications on {} failed: {}", peer, e);
            self.fail(PairingFailure::ConnectFailure(e)).await;
            return;
        }

        if self.coordinator.is_matched() {
            return;
        }

        let value = self.config.tokens.encode(Token::MatchControl);
        match self
            .radio
            .write_characteristic(&peer, service, characteristic, &value)
            .await
        {
            Ok(()) => {
                info!("Sent {} token to {}", Token::MatchControl.as_str(), peer);
                if let Some(conn) = self.current(&peer) {
                    conn.transition(ClientState::AwaitingEcho);
                }
            }
            Err(e) => {
                error!("Writing match-control token to {} failed: {}", peer, e);
                self.fail(PairingFailure::ConnectFailure(e)).await;
            }
        }
    }

    async fn on_write_completed(
        &mut self,
        peer: PeerId,
        characteristic: Uuid,
        result: Result<(), RadioError>,
    ) {
        let awaiting = matches!(
            self.current(&peer),
            Some(conn) if conn.is(&ClientState::AwaitingEcho)
        );

        match result {
            Ok(()) => debug!("Write to {} on {} acknowledged", characteristic, peer),
            Err(e) if awaiting => {
                error!("Match-control write to {} failed: {}", peer, e);
                self.fail(PairingFailure::ConnectFailure(e)).await;
            }
            Err(e) => warn!("Write to {} on {} failed: {}", characteristic, peer, e),
        }
    }

    async fn on_value(&mut self, peer: PeerId, characteristic: Uuid, value: Vec<u8>) {
        if characteristic != self.config.characteristic {
            debug!("Value on unrelated characteristic {} from {}", characteristic, peer);
            return;
        }

        let interval = self.config.proximity.interval();
        let is_echo = self.config.tokens.is_echo(&value);

        let Some(conn) = self.current(&peer) else {
            debug!("Value from {} with no live link", peer);
            return;
        };
        if !conn.is(&ClientState::AwaitingEcho) {
            debug!(
                "Ignoring value '{}' from {} in {:?}",
                display_value(&value),
                peer,
                conn.state()
            );
            return;
        }

        if is_echo {
            conn.confirm_handshake();
            conn.transition(ClientState::ProximityCheck);
            let epoch = conn.epoch();
            self.candidates.clear();
            info!("Ready to pair with {}", peer);
            self.coordinator.set_info(Role::Client, info_text::READY);
            self.timers
                .schedule(ClientTimer::ProximityTick { epoch }, interval);
        } else {
            warn!(
                "Unexpected echo '{}' from {}",
                display_value(&value),
                peer
            );
            self.coordinator
                .set_info(Role::Client, info_text::NOT_A_COUNTERPART);
            self.fail(PairingFailure::HandshakeMismatch).await;
        }
    }

    async fn on_proximity_tick(&mut self, epoch: u64) {
        let peer = match &self.connection {
            Some(conn) if conn.epoch() == epoch && conn.is(&ClientState::ProximityCheck) => {
                conn.peer().clone()
            }
            _ => {
                debug!("Stale proximity tick {}", epoch);
                return;
            }
        };

        if self.coordinator.is_matched() {
            return;
        }

        if let Err(e) = self.radio.read_signal_strength(&peer).await {
            warn!("Signal strength read on {} failed: {}", peer, e);
            self.timers.schedule(
                ClientTimer::ProximityTick { epoch },
                self.config.proximity.interval(),
            );
        }
    }

    async fn on_signal_strength(&mut self, peer: PeerId, result: Result<i32, RadioError>) {
        let gate = self.config.proximity;
        let Some(conn) = self.current(&peer) else {
            return;
        };
        if !conn.is(&ClientState::ProximityCheck) {
            return;
        }

        let close = match result {
            Ok(rssi) => {
                conn.record_signal(rssi);
                debug!("Signal strength of {}: {}", peer, rssi);
                gate.is_close(rssi)
            }
            Err(e) => {
                debug!("No signal strength for {}: {}", peer, e);
                false
            }
        };

        if close {
            self.become_friend().await;
        } else {
            let epoch = conn.epoch();
            self.timers
                .schedule(ClientTimer::ProximityTick { epoch }, gate.interval());
        }
    }

    /// Proximity holds: send the friend token and finish.
    async fn become_friend(&mut self) {
        if self.coordinator.is_matched() {
            return;
        }
        let Some(mut conn) = self.connection.take() else {
            return;
        };
        self.candidates.clear();
        let peer = conn.peer().clone();
        info!(
            "Close enough to {} ({:?}), pairing",
            peer,
            conn.signal_strength()
        );

        self.coordinator.set_info(Role::Client, info_text::PAIRED);
        self.coordinator.freeze_info();

        let value = self.config.tokens.encode(Token::Friend);
        if let Err(e) = self
            .radio
            .write_characteristic(&peer, self.config.service, self.config.characteristic, &value)
            .await
        {
            error!("Writing friend token to {} failed: {}", peer, e);
        }

        self.coordinator.try_set_matched(Role::Client);
        conn.transition(ClientState::Matched);
        self.phase = ClientState::Matched;

        if self.config.power_off_on_match {
            if let Err(e) = self.radio.power_off().await {
                error!("Failed to disable the radio: {}", e);
            }
        }
    }
}
