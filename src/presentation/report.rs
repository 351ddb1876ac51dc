//! Report printing. Every printer renders either readable text or JSON.

use crate::domain::models::{
    AutomaticCycles, BoostMode, DeviceMode, FanSpeedSettings, FanState, HeatDistributorSettings,
    LightSensorSettings, SensorSensitivity, SilentHours, Time, TrickleDays,
};
use crate::error::{Error, Result};
use crate::infrastructure::bluetooth::protocol::Protocol;
use crate::infrastructure::bluetooth::service::CharacteristicReport;
use crate::infrastructure::bluetooth::transport::GattTransport;
use crate::infrastructure::bluetooth::FanService;
use serde::Serialize;
use std::fmt;

/// Status value the fan reports after a power loss reset its clock.
const CLOCK_NOT_SET: u8 = 0x02;

/// Lowercase hex without separators, e.g. `0a1f`.
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Everything readable from one fan.
///
/// Fields the active protocol has no characteristic for are `None`.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceReport {
    pub protocol: Protocol,
    pub device_name: String,
    pub model_number: String,
    pub serial_number: String,
    pub hardware_revision: String,
    pub firmware_revision: String,
    pub software_revision: String,
    pub manufacturer: String,
    pub alias: String,
    pub authenticated: Option<bool>,
    pub status: String,
    pub clock_set: bool,
    pub factory_settings_changed: Option<bool>,
    pub mode: Option<DeviceMode>,
    pub state: FanState,
    pub fan_speeds: FanSpeedSettings,
    pub sensitivity: SensorSensitivity,
    pub light_sensor: LightSensorSettings,
    pub heat_distributor: Option<HeatDistributorSettings>,
    pub boost: BoostMode,
    pub led: Option<String>,
    pub automatic_cycles: AutomaticCycles,
    pub time: Time,
    pub silent_hours: SilentHours,
    pub trickle_days: TrickleDays,
}

/// Treat a characteristic missing from the protocol as absent rather than an error.
fn optional<V>(result: Result<V>) -> Result<Option<V>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(Error::UnsupportedCharacteristic(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Read every record the fan exposes, one characteristic at a time.
pub async fn collect<T: GattTransport>(fan: &mut FanService<T>) -> Result<DeviceReport> {
    let status = fan.get_status().await?;
    Ok(DeviceReport {
        protocol: fan.protocol(),
        device_name: fan.get_device_name().await?,
        model_number: fan.get_model_number().await?,
        serial_number: fan.get_serial_number().await?,
        hardware_revision: fan.get_hardware_revision().await?,
        firmware_revision: fan.get_firmware_revision().await?,
        software_revision: fan.get_software_revision().await?,
        manufacturer: fan.get_manufacturer().await?,
        alias: fan.get_alias().await?,
        authenticated: optional(fan.check_auth().await)?,
        clock_set: status.first() != Some(&CLOCK_NOT_SET),
        status: hex(&status),
        factory_settings_changed: optional(fan.get_factory_settings_changed().await)?,
        mode: optional(fan.get_mode().await)?,
        state: fan.get_state().await?,
        fan_speeds: fan.get_fan_speed_settings().await?,
        sensitivity: fan.get_sensors_sensitivity().await?,
        light_sensor: fan.get_light_sensor_settings().await?,
        heat_distributor: optional(fan.get_heat_distributor().await)?,
        boost: fan.get_boost_mode().await?,
        led: optional(fan.get_led().await)?.map(|led| hex(&led)),
        automatic_cycles: fan.get_automatic_cycles().await?,
        time: fan.get_time().await?,
        silent_hours: fan.get_silent_hours().await?,
        trickle_days: fan.get_trickle_days().await?,
    })
}

struct Maybe<'a, V>(&'a Option<V>);

impl<V: fmt::Display> fmt::Display for Maybe<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => fmt::Display::fmt(value, f),
            None => f.write_str("n/a"),
        }
    }
}

impl fmt::Display for DeviceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Protocol: {}", self.protocol)?;
        writeln!(f, "Device Name: {}", self.device_name)?;
        writeln!(f, "Model Number: {}", self.model_number)?;
        writeln!(f, "Serial Number: {}", self.serial_number)?;
        writeln!(f, "Hardware Revision: {}", self.hardware_revision)?;
        writeln!(f, "Firmware Revision: {}", self.firmware_revision)?;
        writeln!(f, "Software Revision: {}", self.software_revision)?;
        writeln!(f, "Manufacturer: {}", self.manufacturer)?;
        writeln!(f, "Alias: {}", self.alias)?;
        writeln!(f, "Authenticated: {}", Maybe(&self.authenticated))?;
        writeln!(f, "Status: {} (clock set: {})", self.status, self.clock_set)?;
        writeln!(
            f,
            "Factory Settings Changed: {}",
            Maybe(&self.factory_settings_changed)
        )?;
        writeln!(f, "Mode: {}", Maybe(&self.mode))?;
        writeln!(f, "State: {}", self.state)?;
        writeln!(f, "Fan Speed Settings: {}", self.fan_speeds)?;
        writeln!(f, "Sensors Sensitivity: {}", self.sensitivity)?;
        writeln!(f, "Light Sensor Settings: {}", self.light_sensor)?;
        writeln!(f, "Heat Distributor: {}", Maybe(&self.heat_distributor))?;
        writeln!(f, "Boost Mode: {}", self.boost)?;
        writeln!(f, "Led: {}", Maybe(&self.led))?;
        writeln!(f, "Automatic Cycles: {}", self.automatic_cycles)?;
        writeln!(f, "Time: {}", self.time)?;
        writeln!(f, "Silent Hours: {}", self.silent_hours)?;
        write!(f, "Trickle Days: {}", self.trickle_days)
    }
}

/// Serializable row of a characteristic dump.
#[derive(Debug, Clone, Serialize)]
pub struct CharacteristicRow {
    pub id: String,
    pub name: &'static str,
    pub properties: String,
    pub value: Option<String>,
}

impl From<&CharacteristicReport> for CharacteristicRow {
    fn from(report: &CharacteristicReport) -> Self {
        Self {
            id: report.id.to_string(),
            name: report.name,
            properties: report.properties.to_string(),
            value: report.value.as_deref().map(hex),
        }
    }
}

impl fmt::Display for CharacteristicRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.id, self.name, self.properties)?;
        if let Some(value) = &self.value {
            write!(f, " = {}", value)?;
        }
        Ok(())
    }
}

/// Print one value as pretty JSON or with its `Display` form.
pub fn print<V: Serialize + fmt::Display>(value: &V, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", value);
    }
    Ok(())
}

/// Print a list as a JSON array or one item per line.
pub fn print_all<V: Serialize + fmt::Display>(values: &[V], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(values)?);
    } else {
        for value in values {
            println!("{}", value);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::protocol::{
        Characteristic, CharacteristicId, FAN_SPEED_LEVELS_UUID,
    };
    use crate::infrastructure::bluetooth::transport::mock::MockTransport;
    use crate::infrastructure::bluetooth::transport::Properties;

    fn string(value: &str) -> Vec<u8> {
        value.as_bytes().to_vec()
    }

    /// A legacy fan with every handle populated.
    fn legacy_fan() -> MockTransport {
        let mut state = Vec::new();
        for v in [1024u16, 84, 7, 1500] {
            state.extend_from_slice(&v.to_le_bytes());
        }
        state.extend_from_slice(&[0b0000_0010, 0, 0, 0]);

        let values: [(Characteristic, Vec<u8>); 18] = [
            (Characteristic::DeviceName, string("Calima")),
            (Characteristic::ModelNumber, string("PAX")),
            (Characteristic::SerialNumber, string("0001")),
            (Characteristic::HardwareRevision, string("1.0")),
            (Characteristic::FirmwareRevision, string("2.0")),
            (Characteristic::SoftwareRevision, string("3.0")),
            (Characteristic::Manufacturer, string("PAX AB")),
            (Characteristic::Alias, b"Bathroom\0\0\0\0".to_vec()),
            (Characteristic::Status, vec![0x02]),
            (Characteristic::SensorData, state),
            (Characteristic::FanSpeeds, vec![0xca, 0x08, 0x59, 0x06, 0xe8, 0x03]),
            (Characteristic::Sensitivity, vec![1, 2, 0, 0]),
            (Characteristic::LightSensor, vec![5, 10]),
            (Characteristic::Boost, vec![0, 0, 0, 0, 0]),
            (Characteristic::AutomaticCycles, vec![2]),
            (Characteristic::Clock, vec![1, 12, 30, 0]),
            (Characteristic::SilentHours, vec![1, 22, 0, 6, 30]),
            (Characteristic::TrickleDays, vec![0x1f, 0x60]),
        ];
        let mut mock = MockTransport::new();
        for (characteristic, value) in values {
            let id = Protocol::Legacy.resolve(characteristic).unwrap();
            mock = mock.with_value(id, &value);
        }
        mock
    }

    #[test]
    fn test_hex() {
        assert_eq!(hex(&[0x0a, 0x1f, 0x00]), "0a1f00");
        assert_eq!(hex(&[]), "");
    }

    #[tokio::test]
    async fn test_collect_legacy_skips_missing_characteristics() {
        let mock = legacy_fan();
        let mut fan = FanService::connect(mock, Protocol::Legacy, "1234")
            .await
            .unwrap();

        let report = collect(&mut fan).await.unwrap();
        assert_eq!(report.alias, "Bathroom");
        assert!(!report.clock_set);
        assert_eq!(report.status, "02");
        assert_eq!(report.authenticated, None);
        assert_eq!(report.mode, None);
        assert_eq!(report.heat_distributor, None);
        assert_eq!(report.fan_speeds, FanSpeedSettings::default());
        assert_eq!(report.automatic_cycles, AutomaticCycles::Minutes60);
        assert_eq!(report.state.temperature(), 21.0);

        let text = report.to_string();
        assert!(text.contains("Alias: Bathroom"));
        assert!(text.contains("Mode: n/a"));
    }

    #[tokio::test]
    async fn test_collect_propagates_transport_failure() {
        let mock = MockTransport::new();
        let mut fan = FanService::connect(mock, Protocol::Current, "1234")
            .await
            .unwrap();
        let err = collect(&mut fan).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_characteristic_row() {
        let report = CharacteristicReport {
            id: CharacteristicId::Uuid(FAN_SPEED_LEVELS_UUID),
            name: "fan speeds",
            properties: Properties {
                read: true,
                write: true,
                ..Properties::default()
            },
            value: Some(vec![0xca, 0x08]),
        };
        let row = CharacteristicRow::from(&report);
        assert_eq!(
            row.to_string(),
            "1488a757-35bc-4ec8-9a6b-9ecf1502778e [fan speeds] READ WRITE = ca08"
        );
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["value"], "ca08");
    }
}
