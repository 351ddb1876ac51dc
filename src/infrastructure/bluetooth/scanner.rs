//! BLE Scanner Module
//!
//! Handles Bluetooth LE discovery of Calima fans, which are recognised by
//! the vendor prefix of their address.

use crate::domain::models::ScannedDevice;
use crate::error::TransportError;
use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use std::time::Duration;
use tracing::{debug, info};

/// Get the first Bluetooth adapter on the system
pub async fn get_adapter() -> Result<Adapter, TransportError> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    adapters
        .into_iter()
        .next()
        .ok_or(TransportError::AdapterNotFound)
}

/// True if `address` starts with `prefix`, ignoring case.
pub fn matches_prefix(address: &str, prefix: &str) -> bool {
    address
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// BLE Scanner for discovering fans
pub struct BleScanner {
    adapter: Adapter,
    address_prefix: String,
}

impl BleScanner {
    pub fn new(adapter: Adapter, address_prefix: impl Into<String>) -> Self {
        Self {
            adapter,
            address_prefix: address_prefix.into(),
        }
    }

    /// Scan for `duration` and return every peripheral matching the address prefix.
    pub async fn scan(&self, duration: Duration) -> Result<Vec<ScannedDevice>, TransportError> {
        info!("Scanning for fans with address prefix {}", self.address_prefix);
        let peripherals = self.discover(duration).await?;

        let mut devices = Vec::new();
        for peripheral in peripherals {
            let address = peripheral.address().to_string();
            if !matches_prefix(&address, &self.address_prefix) {
                debug!("Ignoring {}", address);
                continue;
            }
            let props = peripheral.properties().await?;
            let name = props
                .as_ref()
                .and_then(|p| p.local_name.clone())
                .unwrap_or_else(|| "Unknown".to_string());
            let signal_strength = props.and_then(|p| p.rssi);
            devices.push(ScannedDevice {
                name,
                address,
                signal_strength,
            });
        }

        info!("Found {} fan(s)", devices.len());
        Ok(devices)
    }

    /// Scan until the peripheral with `address` has been seen.
    pub async fn find(
        &self,
        address: &str,
        duration: Duration,
    ) -> Result<Peripheral, TransportError> {
        let peripherals = self.discover(duration).await?;
        peripherals
            .into_iter()
            .find(|p| p.address().to_string().eq_ignore_ascii_case(address))
            .ok_or_else(|| TransportError::DeviceNotFound(address.to_string()))
    }

    async fn discover(&self, duration: Duration) -> Result<Vec<Peripheral>, TransportError> {
        self.adapter.start_scan(ScanFilter::default()).await?;
        tokio::time::sleep(duration).await;
        let peripherals = self.adapter.peripherals().await;
        self.adapter.stop_scan().await?;
        Ok(peripherals?)
    }
}
