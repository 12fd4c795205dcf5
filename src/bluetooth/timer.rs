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

//! Deferred timer requests.
//!
//! State machines never sleep. They queue a timer here and the owning actor
//! arms it, feeding the timer back into the same queue it reads radio
//! events from.

use std::time::Duration;
use tokio::sync::mpsc;

/// Client-side timers. The epoch ties a timer to the scan window or
/// connection that armed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientTimer {
    ScanWindow { epoch: u64 },
    ProximityTick { epoch: u64 },
}

/// Server-side timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerTimer {
    RetryAdvertising,
}

/// Timers requested since the last drain.
#[derive(Debug)]
pub struct Timers<T> {
    pending: Vec<(T, Duration)>,
}

impl<T> Default for Timers<T> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
        }
    }
}

impl<T> Timers<T> {
    pub fn schedule(&mut self, timer: T, after: Duration) {
        self.pending.push((timer, after));
    }

    pub fn pending(&self) -> &[(T, Duration)] {
        &self.pending
    }

    pub fn drain(&mut self) -> Vec<(T, Duration)> {
        std::mem::take(&mut self.pending)
    }
}

/// Deliver `timer` on `tx` after `after`.
pub fn arm<T: Send + 'static>(tx: &mpsc::UnboundedSender<T>, timer: T, after: Duration) {
    let tx = tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        // Receiver is gone once the actor has stopped.
        let _ = tx.send(timer);
    });
}
