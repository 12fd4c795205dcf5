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

//! Scan controller for the client role.
//!
//! Discovery runs in fixed windows. A window that ends empty is followed
//! immediately by another one, forever, until a peer shows up, the match
//! signal is set, or the host stops the role.

use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::radio::{CentralRadio, PeerId, ScanFilter};
use super::timer::{ClientTimer, Timers};
use crate::state::MatchCoordinator;

/// A peer seen during the current window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPeer {
    pub id: PeerId,
    pub rssi: Option<i32>,
}

/// Peers found in the current scan window, unique by id, in discovery order.
#[derive(Debug, Default, Clone)]
pub struct ScanResults {
    peers: Vec<DiscoveredPeer>,
}

impl ScanResults {
    /// Insert or refresh a peer. Returns `true` for a new id.
    pub fn insert(&mut self, id: PeerId, rssi: Option<i32>) -> bool {
        if let Some(existing) = self.peers.iter_mut().find(|p| p.id == id) {
            if rssi.is_some() {
                existing.rssi = rssi;
            }
            return false;
        }
        self.peers.push(DiscoveredPeer { id, rssi });
        true
    }

    pub fn clear(&mut self) {
        self.peers.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn peers(&self) -> &[DiscoveredPeer] {
        &self.peers
    }

    pub fn ids(&self) -> Vec<PeerId> {
        self.peers.iter().map(|p| p.id.clone()).collect()
    }
}

/// Result of a scan window running out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowOutcome {
    /// Timer belongs to an abandoned window.
    Stale,
    /// Nothing found; the caller should start the next window right away.
    Empty,
    /// Peers to hand to the connection state machine, in discovery order.
    Candidates(Vec<PeerId>),
}

/// Drives discovery windows against a [`CentralRadio`].
#[derive(Debug)]
pub struct ScanController {
    filter: ScanFilter,
    window: Duration,
    scanning: bool,
    epoch: u64,
    results: ScanResults,
}

impl ScanController {
    pub fn new(service: Uuid, window: Duration) -> Self {
        Self {
            filter: ScanFilter::low_power(service),
            window,
            scanning: false,
            epoch: 0,
            results: ScanResults::default(),
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    /// Identifier of the current (or last) window.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn results(&self) -> &ScanResults {
        &self.results
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Start a discovery window.
    ///
    /// No-op while a window is open or once the match signal is set.
    /// Returns whether a new window was opened.
    pub async fn start_scan<R: CentralRadio + ?Sized>(
        &mut self,
        radio: &mut R,
        coordinator: &MatchCoordinator,
        timers: &mut Timers<ClientTimer>,
    ) -> bool {
        if self.scanning {
            debug!("Scan already running");
            return false;
        }
        if coordinator.is_matched() {
            debug!("Already matched, not scanning");
            return false;
        }

        self.results.clear();
        self.epoch += 1;
        self.scanning = true;

        match radio.start_scan(&self.filter).await {
            Ok(()) => info!("Started scanning for {}", self.filter.service),
            // A window that never really started still runs out and
            // restarts; this paces retries while the radio is unusable.
            Err(e) => error!("BLE scan failed to start: {}", e),
        }

        timers.schedule(ClientTimer::ScanWindow { epoch: self.epoch }, self.window);
        true
    }

    /// Abandon the current window and open a new one.
    pub async fn restart_scan<R: CentralRadio + ?Sized>(
        &mut self,
        radio: &mut R,
        coordinator: &MatchCoordinator,
        timers: &mut Timers<ClientTimer>,
    ) -> bool {
        if self.scanning {
            if let Err(e) = radio.stop_scan().await {
                debug!("Stopping abandoned scan: {}", e);
            }
            self.scanning = false;
        }
        self.start_scan(radio, coordinator, timers).await
    }

    /// Record a scan hit. Ignored outside a window.
    pub fn record(&mut self, peer: PeerId, rssi: Option<i32>) {
        if !self.scanning {
            debug!("Scan result for {} outside a window, ignoring", peer);
            return;
        }
        if self.results.insert(peer.clone(), rssi) {
            debug!("Discovered {} (rssi {:?})", peer, rssi);
        }
    }

    /// Close the window identified by `epoch`.
    pub async fn window_elapsed<R: CentralRadio + ?Sized>(
        &mut self,
        epoch: u64,
        radio: &mut R,
    ) -> WindowOutcome {
        if !self.scanning || epoch != self.epoch {
            debug!("Ignoring stale scan window {}", epoch);
            return WindowOutcome::Stale;
        }

        if let Err(e) = radio.stop_scan().await {
            debug!("Stopping scan: {}", e);
        }
        self.scanning = false;
        info!("Stopped scanning ({} peers)", self.results.len());

        if self.results.is_empty() {
            WindowOutcome::Empty
        } else {
            WindowOutcome::Candidates(self.results.ids())
        }
    }

    /// Stop discovery without deciding anything.
    pub async fn halt<R: CentralRadio + ?Sized>(&mut self, radio: &mut R) {
        if !self.scanning {
            return;
        }
        if let Err(e) = radio.stop_scan().await {
            debug!("Stopping scan on halt: {}", e);
        }
        self.scanning = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RadioError;
    use crate::events::Role;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct ScanOnlyRadio {
        starts: usize,
        stops: usize,
        fail_start: bool,
    }

    #[async_trait]
    impl CentralRadio for ScanOnlyRadio {
        async fn start_scan(&mut self, _filter: &ScanFilter) -> Result<(), RadioError> {
            self.starts += 1;
            if self.fail_start {
                return Err(RadioError::Unavailable("powered off".into()));
            }
            Ok(())
        }
        async fn stop_scan(&mut self) -> Result<(), RadioError> {
            self.stops += 1;
            Ok(())
        }
        async fn connect(&mut self, _: &PeerId) -> Result<(), RadioError> {
            unreachable!()
        }
        async fn disconnect(&mut self, _: &PeerId) -> Result<(), RadioError> {
            unreachable!()
        }
        async fn discover_services(&mut self, _: &PeerId) -> Result<(), RadioError> {
            unreachable!()
        }
        async fn enable_notifications(&mut self, _: &PeerId, _: Uuid, _: Uuid) -> Result<(), RadioError> {
            unreachable!()
        }
        async fn write_characteristic(
            &mut self,
            _: &PeerId,
            _: Uuid,
            _: Uuid,
            _: &[u8],
        ) -> Result<(), RadioError> {
            unreachable!()
        }
        async fn read_signal_strength(&mut self, _: &PeerId) -> Result<(), RadioError> {
            unreachable!()
        }
        async fn power_off(&mut self) -> Result<(), RadioError> {
            unreachable!()
        }
    }

    fn setup() -> (ScanController, Arc<MatchCoordinator>, Timers<ClientTimer>) {
        let (tx, _rx) = mpsc::unbounded_channel();
        (
            ScanController::new(Uuid::nil(), Duration::from_millis(5000)),
            MatchCoordinator::new(tx),
            Timers::default(),
        )
    }

    fn peer(n: u8) -> PeerId {
        PeerId::new(format!("AA:BB:CC:DD:EE:{:02X}", n))
    }

    #[tokio::test]
    async fn test_start_clears_results_and_arms_window() {
        let (mut scanner, coordinator, mut timers) = setup();
        let mut radio = ScanOnlyRadio::default();

        assert!(scanner.start_scan(&mut radio, &coordinator, &mut timers).await);
        scanner.record(peer(1), Some(-70));
        assert_eq!(scanner.results().len(), 1);

        // Second start while scanning is a no-op.
        assert!(!scanner.start_scan(&mut radio, &coordinator, &mut timers).await);
        assert_eq!(radio.starts, 1);

        assert!(scanner.restart_scan(&mut radio, &coordinator, &mut timers).await);
        assert!(scanner.results().is_empty());
        assert_eq!(radio.starts, 2);
        assert_eq!(
            timers.drain(),
            vec![
                (ClientTimer::ScanWindow { epoch: 1 }, Duration::from_millis(5000)),
                (ClientTimer::ScanWindow { epoch: 2 }, Duration::from_millis(5000)),
            ]
        );
    }

    #[tokio::test]
    async fn test_window_outcomes() {
        let (mut scanner, coordinator, mut timers) = setup();
        let mut radio = ScanOnlyRadio::default();

        scanner.start_scan(&mut radio, &coordinator, &mut timers).await;
        assert_eq!(scanner.window_elapsed(1, &mut radio).await, WindowOutcome::Empty);
        assert!(!scanner.is_scanning());

        scanner.start_scan(&mut radio, &coordinator, &mut timers).await;
        assert_eq!(scanner.window_elapsed(1, &mut radio).await, WindowOutcome::Stale);

        scanner.record(peer(2), None);
        scanner.record(peer(1), Some(-50));
        scanner.record(peer(2), Some(-40));
        assert_eq!(
            scanner.window_elapsed(2, &mut radio).await,
            WindowOutcome::Candidates(vec![peer(2), peer(1)])
        );
        assert_eq!(scanner.results().peers()[0].rssi, Some(-40));
    }

    #[tokio::test]
    async fn test_no_scan_once_matched() {
        let (mut scanner, coordinator, mut timers) = setup();
        let mut radio = ScanOnlyRadio::default();
        coordinator.try_set_matched(Role::Server);

        assert!(!scanner.start_scan(&mut radio, &coordinator, &mut timers).await);
        assert_eq!(radio.starts, 0);
        assert!(timers.pending().is_empty());
    }

    #[tokio::test]
    async fn test_start_failure_still_arms_window() {
        let (mut scanner, coordinator, mut timers) = setup();
        let mut radio = ScanOnlyRadio {
            fail_start: true,
            ..Default::default()
        };

        assert!(scanner.start_scan(&mut radio, &coordinator, &mut timers).await);
        assert!(scanner.is_scanning());
        assert_eq!(timers.pending().len(), 1);
        assert_eq!(scanner.window_elapsed(1, &mut radio).await, WindowOutcome::Empty);
    }

    #[test]
    fn test_record_outside_window_is_ignored() {
        let (mut scanner, _coordinator, _timers) = setup();
        scanner.record(peer(1), Some(-30));
        assert!(scanner.results().is_empty());
    }
}
