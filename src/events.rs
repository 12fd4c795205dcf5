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

//! Events surfaced to the host application.

use std::fmt;
use tracing::info;

/// Which side of the handshake produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Server => "server",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host-facing notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// The status text changed (`on_info_changed`).
    InfoChanged { role: Role, text: String },
    /// Pairing confirmed; fired once per process (`on_matched`).
    Matched { role: Role },
}

/// What the host loop should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Finish,
}

/// Processes host events for the daemon loop.
#[derive(Debug, Default)]
pub struct EventProcessor {
    last_info: Option<String>,
    matched_by: Option<Role>,
}

impl EventProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a single event.
    pub fn process_event(&mut self, event: HostEvent) -> Flow {
        match event {
            HostEvent::InfoChanged { role, text } => {
                info!("[{}] {}", role, text);
                self.last_info = Some(text);
                Flow::Continue
            }
            HostEvent::Matched { role } => {
                info!("Pairing confirmed by the {} role", role);
                self.matched_by = Some(role);
                Flow::Finish
            }
        }
    }

    /// Most recent status text.
    pub fn last_info(&self) -> Option<&str> {
        self.last_info.as_deref()
    }

    pub fn matched_by(&self) -> Option<Role> {
        self.matched_by
    }
}
