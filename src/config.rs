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

//! Configuration management.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::bluetooth::ble_constants::{
    timing, CHARACTERISTIC_UUID, FRIEND_TOKEN, MATCH_CONTROL_TOKEN, PROXIMITY_THRESHOLD,
    SERVICE_UUID,
};
use crate::bluetooth::{ClientConfig, ProximityGate, ServerConfig, Tokens};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Identifiers and tokens both peers must agree on.
    pub pairing: PairingConfig,

    /// Scanner/client role.
    pub client: ClientRoleConfig,

    /// Signal strength gate.
    pub proximity: ProximityConfig,

    /// Advertiser/server role.
    pub server: ServerRoleConfig,

    /// Adapter settings.
    pub bluetooth: BluetoothConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
    pub match_control_token: String,
    pub friend_token: String,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            service_uuid: SERVICE_UUID,
            characteristic_uuid: CHARACTERISTIC_UUID,
            match_control_token: MATCH_CONTROL_TOKEN.to_string(),
            friend_token: FRIEND_TOKEN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientRoleConfig {
    pub enabled: bool,

    /// Length of one discovery window in milliseconds.
    pub scan_window_ms: u64,
}

impl Default for ClientRoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_window_ms: timing::SCAN_WINDOW.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityConfig {
    /// Weakest signal strength (dBm) that counts as close.
    pub threshold: i32,

    pub sample_interval_ms: u64,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            threshold: PROXIMITY_THRESHOLD,
            sample_interval_ms: timing::PROXIMITY_INTERVAL.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerRoleConfig {
    pub enabled: bool,

    /// Delay before retrying a failed advertisement in milliseconds.
    pub advertise_retry_ms: u64,
}

impl Default for ServerRoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            advertise_retry_ms: timing::ADVERTISE_RETRY.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Adapter name such as `hci0`. The default adapter when unset.
    pub adapter: Option<String>,

    /// Power the adapter off once pairing completes.
    pub power_off_on_match: bool,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            adapter: None,
            power_off_on_match: true,
        }
    }
}

impl Config {
    /// Default location, `<config_dir>/proxpair/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("proxpair")
            .join("config.toml")
    }

    /// Load configuration from file or create default.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load from `path`, writing the defaults there if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let config = Self::default();
            let content = toml::to_string_pretty(&config)?;
            std::fs::write(path, content)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let pairing = &self.pairing;
        if pairing.match_control_token.is_empty() || pairing.friend_token.is_empty() {
            bail!("pairing tokens must not be empty");
        }
        if pairing.match_control_token == pairing.friend_token {
            bail!("match-control and friend tokens must differ");
        }
        if self.client.scan_window_ms == 0
            || self.proximity.sample_interval_ms == 0
            || self.server.advertise_retry_ms == 0
        {
            bail!("intervals must be greater than zero");
        }
        if self.proximity.threshold >= 0 {
            bail!(
                "proximity threshold must be negative, got {}",
                self.proximity.threshold
            );
        }
        Ok(())
    }

    fn tokens(&self) -> Tokens {
        Tokens::new(
            self.pairing.match_control_token.as_str(),
            self.pairing.friend_token.as_str(),
        )
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            service: self.pairing.service_uuid,
            characteristic: self.pairing.characteristic_uuid,
            tokens: self.tokens(),
            scan_window: Duration::from_millis(self.client.scan_window_ms),
            proximity: ProximityGate::new(
                self.proximity.threshold,
                Duration::from_millis(self.proximity.sample_interval_ms),
            ),
            power_off_on_match: self.bluetooth.power_off_on_match,
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            service: self.pairing.service_uuid,
            characteristic: self.pairing.characteristic_uuid,
            tokens: self.tokens(),
            advertise_retry: Duration::from_millis(self.server.advertise_retry_ms),
            power_off_on_match: self.bluetooth.power_off_on_match,
        }
    }
}
