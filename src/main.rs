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

//! Proxpair daemon

use anyhow::{bail, Result};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use proxpair::bluetooth::bluez::{self, BluezCentral, BluezPeripheral};
use proxpair::bluetooth::{ClientSession, ServerSession};
use proxpair::config::Config;
use proxpair::events::{EventProcessor, Flow};
use proxpair::MatchCoordinator;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("proxpair=info".parse()?))
        .init();

    info!("Starting Proxpair v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load()?;
    info!("Configuration loaded from {}", Config::default_path().display());

    if !config.client.enabled && !config.server.enabled {
        bail!("both roles are disabled in the configuration");
    }

    let adapter = bluez::open_adapter(config.bluetooth.adapter.as_deref()).await?;

    let (host_tx, mut host_rx) = mpsc::unbounded_channel();
    let coordinator = MatchCoordinator::new(host_tx);
    let (stop_tx, stop_rx) = watch::channel(false);

    let client_task = if config.client.enabled {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let radio = BluezCentral::new(adapter.clone(), event_tx);
        let session = ClientSession::new(radio, config.client_config(), coordinator.clone());
        let stop_rx = stop_rx.clone();
        info!("Client role enabled");
        Some(tokio::spawn(session.run(event_rx, stop_rx)))
    } else {
        None
    };

    let server_task = if config.server.enabled {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let radio = BluezPeripheral::new(adapter.clone(), event_tx);
        let session = ServerSession::new(radio, config.server_config(), coordinator.clone());
        let stop_rx = stop_rx.clone();
        info!("Server role enabled");
        Some(tokio::spawn(session.run(event_rx, stop_rx)))
    } else {
        None
    };

    let mut processor = EventProcessor::new();
    info!("Ready. Waiting for a peer.");

    loop {
        tokio::select! {
            Some(event) = host_rx.recv() => {
                if processor.process_event(event) == Flow::Finish {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
        }
    }

    let _ = stop_tx.send(true);

    if let Some(task) = client_task {
        match task.await {
            Ok(state) => info!("Client finished in {:?}", state),
            Err(e) => error!("Client task failed: {}", e),
        }
    }
    if let Some(task) = server_task {
        match task.await {
            Ok(state) => info!("Server finished in {:?}", state),
            Err(e) => error!("Server task failed: {}", e),
        }
    }

    match processor.matched_by() {
        Some(role) => info!("Paired ({} role)", role),
        None => warn!("Stopped without pairing"),
    }
    if let Some(text) = processor.last_info() {
        info!("Last status: {}", text);
    }

    Ok(())
}
