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

//! BlueZ backends for the radio traits.

mod central;
mod peripheral;

pub use central::BluezCentral;
pub use peripheral::BluezPeripheral;

use bluer::{Adapter, Address, Session};
use tracing::info;

use super::radio::PeerId;
use crate::error::RadioError;

/// Open a BlueZ adapter and make sure it is powered.
///
/// Uses the default adapter unless `name` (e.g. `hci1`) is given.
pub async fn open_adapter(name: Option<&str>) -> Result<Adapter, RadioError> {
    let session = Session::new().await?;

    let adapter = match name {
        Some(name) => session.adapter(name)?,
        None => session.default_adapter().await?,
    };
    info!("Using Bluetooth adapter: {}", adapter.name());

    if !adapter.is_powered().await? {
        info!("Powering on Bluetooth adapter...");
        adapter.set_powered(true).await?;
    }

    let address = adapter.address().await?;
    info!("Adapter address: {}", address);

    Ok(adapter)
}

pub(crate) fn peer_id(address: Address) -> PeerId {
    PeerId::new(address.to_string())
}

pub(crate) fn address(peer: &PeerId) -> Result<Address, RadioError> {
    peer.as_str()
        .parse()
        .map_err(|_| RadioError::NotConnected(peer.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_round_trip() {
        let addr: Address = "AA:BB:CC:DD:EE:01".parse().unwrap();
        let peer = peer_id(addr);
        assert_eq!(peer.as_str(), "AA:BB:CC:DD:EE:01");
        assert_eq!(address(&peer).unwrap(), addr);
    }

    #[test]
    fn test_invalid_address() {
        assert!(address(&PeerId::new("not-an-address")).is_err());
    }
}
