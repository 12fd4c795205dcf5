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

//! Error types shared by both pairing roles.

use thiserror::Error;

/// Failure reported by the platform radio layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RadioError {
    /// Adapter missing, powered off, or otherwise unusable.
    #[error("radio unavailable: {0}")]
    Unavailable(String),

    /// Discovery could not be started or stopped unexpectedly.
    #[error("scan failed: {0}")]
    Scan(String),

    /// Link-layer connection attempt failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Attribute operation (discover, read, write, notify) failed.
    #[error("GATT operation failed: {0}")]
    Gatt(String),

    /// Operation issued against a peer with no live link.
    #[error("peer {0} is not connected")]
    NotConnected(String),

    /// Advertisement could not be registered.
    #[error("advertising failed: {0}")]
    Advertise(String),

    /// Error surfaced by the BlueZ bindings.
    #[error("BlueZ error: {0}")]
    Bluez(String),
}

impl From<bluer::Error> for RadioError {
    fn from(err: bluer::Error) -> Self {
        RadioError::Bluez(err.to_string())
    }
}

/// Reason a client connection ended in the `Failed` state.
///
/// None of these are fatal: every one of them sends the client back to
/// scanning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairingFailure {
    #[error("scan failure: {0}")]
    ScanFailure(RadioError),

    #[error("connect failure: {0}")]
    ConnectFailure(RadioError),

    #[error("pairing service not found on peer")]
    ServiceNotFound,

    #[error("echoed value does not match the match-control token")]
    HandshakeMismatch,

    #[error("link lost before pairing completed")]
    LinkLost,
}
