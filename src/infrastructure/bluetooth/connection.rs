//! BLE Connection Module
//!
//! btleplug-backed [`GattTransport`]. Characteristics are addressed by UUID;
//! btleplug does not expose ATT handles, so handle identifiers are refused.

use crate::error::TransportError;
use crate::infrastructure::bluetooth::protocol::CharacteristicId;
use crate::infrastructure::bluetooth::scanner::BleScanner;
use crate::infrastructure::bluetooth::transport::{CharacteristicInfo, GattTransport, Properties};
use async_trait::async_trait;
use btleplug::api::{CharPropFlags, Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{info, warn};

/// Configuration for connection behavior
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// How long to scan for the device before giving up
    pub scan_duration_secs: u64,
    /// Upper bound for connecting and discovering services
    pub connect_timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            scan_duration_secs: 5,
            connect_timeout_secs: 20,
        }
    }
}

/// A live GATT connection to one fan
pub struct BleConnection {
    peripheral: Peripheral,
    characteristics: BTreeSet<Characteristic>,
    connected: bool,
}

impl BleConnection {
    /// Find the device by address, connect and discover its characteristics
    pub async fn connect(
        scanner: &BleScanner,
        address: &str,
        config: &ConnectionConfig,
    ) -> Result<Self, TransportError> {
        info!("Connecting to Bluetooth device: {}", address);

        let peripheral = scanner
            .find(address, Duration::from_secs(config.scan_duration_secs))
            .await?;

        let timeout = Duration::from_secs(config.connect_timeout_secs);
        let setup = async {
            peripheral.connect().await?;
            peripheral.discover_services().await
        };
        let outcome = tokio::time::timeout(timeout, setup)
            .await
            .map_err(|_| TransportError::Timeout(config.connect_timeout_secs))
            .and_then(|result| result.map_err(TransportError::from));
        if let Err(e) = outcome {
            // The link may be up even though setup failed
            release(&peripheral).await;
            return Err(e);
        }

        let characteristics = peripheral.characteristics();
        info!("Found {} characteristics", characteristics.len());

        Ok(Self {
            peripheral,
            characteristics,
            connected: true,
        })
    }

    fn lookup(&self, id: &CharacteristicId) -> Result<&Characteristic, TransportError> {
        if !self.connected {
            return Err(TransportError::Disconnected);
        }
        match id {
            CharacteristicId::Handle(_) => {
                Err(TransportError::UnsupportedAddressing(id.to_string()))
            }
            CharacteristicId::Uuid(uuid) => self
                .characteristics
                .iter()
                .find(|c| c.uuid == *uuid)
                .ok_or_else(|| TransportError::CharacteristicNotFound(id.to_string())),
        }
    }
}

/// Drop a half-established link, logging instead of failing.
async fn release(peripheral: &Peripheral) {
    match peripheral.is_connected().await {
        Ok(false) => {}
        Ok(true) | Err(_) => {
            if let Err(e) = peripheral.disconnect().await {
                warn!("Could not drop the link after a failed setup: {}", e);
            }
        }
    }
}

fn properties_of(flags: CharPropFlags) -> Properties {
    Properties {
        read: flags.contains(CharPropFlags::READ),
        write: flags.contains(CharPropFlags::WRITE),
        write_without_response: flags.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE),
        notify: flags.contains(CharPropFlags::NOTIFY),
        indicate: flags.contains(CharPropFlags::INDICATE),
    }
}

#[async_trait]
impl GattTransport for BleConnection {
    async fn read(&mut self, id: &CharacteristicId) -> Result<Vec<u8>, TransportError> {
        let characteristic = self.lookup(id)?;
        Ok(self.peripheral.read(characteristic).await?)
    }

    async fn write(&mut self, id: &CharacteristicId, value: &[u8]) -> Result<(), TransportError> {
        let characteristic = self.lookup(id)?;
        Ok(self
            .peripheral
            .write(characteristic, value, WriteType::WithResponse)
            .await?)
    }

    async fn list_characteristics(&mut self) -> Result<Vec<CharacteristicInfo>, TransportError> {
        if !self.connected {
            return Err(TransportError::Disconnected);
        }
        Ok(self
            .characteristics
            .iter()
            .map(|c| CharacteristicInfo {
                id: CharacteristicId::Uuid(c.uuid),
                properties: properties_of(c.properties),
            })
            .collect())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;

        // The link may already be gone after a failed operation
        match self.peripheral.is_connected().await {
            Ok(true) => self.peripheral.disconnect().await?,
            Ok(false) => {}
            Err(e) => warn!("Could not query connection state: {}", e),
        }
        info!("Disconnected from device");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties_mapping() {
        let props = properties_of(CharPropFlags::READ | CharPropFlags::WRITE);
        assert!(props.read);
        assert!(props.write);
        assert!(!props.notify);
        assert!(!props.write_without_response);
    }
}
