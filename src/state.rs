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

//! Match coordination shared by both roles.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::events::{HostEvent, Role};

/// Status text shown to the user, frozen once pairing completes.
#[derive(Debug, Default)]
struct InfoState {
    text: String,
    frozen: bool,
}

/// Display channel for status text.
#[derive(Debug, Default)]
pub struct InfoSink {
    state: RwLock<InfoState>,
}

impl InfoSink {
    /// Replace the text. Returns `false` once the sink is frozen.
    pub fn set(&self, text: &str) -> bool {
        let mut state = self.state.write();
        if state.frozen {
            debug!("Info frozen, dropping: {}", text);
            return false;
        }
        state.text = text.to_string();
        true
    }

    /// Stop accepting updates, permanently.
    pub fn freeze(&self) {
        self.state.write().frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.state.read().frozen
    }

    pub fn text(&self) -> String {
        self.state.read().text.clone()
    }
}

/// Process-wide pairing outcome, owned explicitly and shared by reference.
///
/// `matched` flips from `false` to `true` at most once and is never reset.
#[derive(Debug)]
pub struct MatchCoordinator {
    matched: AtomicBool,
    matched_tx: watch::Sender<bool>,
    info: InfoSink,
    host_tx: mpsc::UnboundedSender<HostEvent>,
}

impl MatchCoordinator {
    pub fn new(host_tx: mpsc::UnboundedSender<HostEvent>) -> Arc<Self> {
        let (matched_tx, _) = watch::channel(false);
        Arc::new(Self {
            matched: AtomicBool::new(false),
            matched_tx,
            info: InfoSink::default(),
            host_tx,
        })
    }

    pub fn is_matched(&self) -> bool {
        self.matched.load(Ordering::SeqCst)
    }

    /// Mark the pairing as complete. Only the first caller gets `true`;
    /// that call also fires [`HostEvent::Matched`].
    pub fn try_set_matched(&self, role: Role) -> bool {
        let won = self
            .matched
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();

        if won {
            info!("Match signal set by {}", role);
            self.matched_tx.send_replace(true);
            let _ = self.host_tx.send(HostEvent::Matched { role });
        }
        won
    }

    /// Receiver that observes the match signal flipping to `true`.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.matched_tx.subscribe()
    }

    /// Update the status text and tell the host, unless frozen.
    pub fn set_info(&self, role: Role, text: &str) -> bool {
        if !self.info.set(text) {
            return false;
        }
        let _ = self.host_tx.send(HostEvent::InfoChanged {
            role,
            text: text.to_string(),
        });
        true
    }

    pub fn freeze_info(&self) {
        self.info.freeze();
    }

    pub fn info(&self) -> String {
        self.info.text()
    }

    pub fn is_info_frozen(&self) -> bool {
        self.info.is_frozen()
    }
}
