//! Fan Service Module
//!
//! Device facade: one method per characteristic, each doing exactly one
//! transport read or write plus the matching codec step. Setters validate
//! before touching the transport, so a rejected value never reaches the fan.

use crate::domain::models::{
    AutomaticCycles, BoostMode, DeviceMode, FanSpeedSettings, FanState, HeatDistributorSettings,
    LightSensorSettings, SensorSensitivity, SilentHours, Time, TrickleDays,
};
use crate::error::{Error, Result, TransportError};
use crate::infrastructure::bluetooth::codec;
use crate::infrastructure::bluetooth::protocol::{Characteristic, CharacteristicId, Protocol};
use crate::infrastructure::bluetooth::transport::{GattTransport, Properties};
use tracing::{debug, info, warn};

/// One entry of a characteristic dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicReport {
    pub id: CharacteristicId,
    pub name: &'static str,
    pub properties: Properties,
    /// Current value, for readable characteristics.
    pub value: Option<Vec<u8>>,
}

/// Authenticated session with one fan.
pub struct FanService<T: GattTransport> {
    transport: T,
    protocol: Protocol,
    connected: bool,
}

impl<T: GattTransport> FanService<T> {
    /// Take ownership of an open transport and authenticate with `pin`.
    ///
    /// The link is closed again if authentication cannot be written.
    pub async fn connect(transport: T, protocol: Protocol, pin: &str) -> Result<Self> {
        let mut service = Self {
            transport,
            protocol,
            connected: true,
        };
        if let Err(e) = service.set_auth(pin).await {
            warn!("Authentication failed: {}", e);
            if let Err(close) = service.disconnect().await {
                warn!("Disconnect after failed authentication failed: {}", close);
            }
            return Err(e);
        }
        info!("Authenticated ({} protocol)", protocol);
        Ok(service)
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Close the link. Safe to call repeatedly and after a failure.
    pub async fn disconnect(&mut self) -> Result<()> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        self.transport.disconnect().await?;
        Ok(())
    }

    fn resolve(&self, characteristic: Characteristic) -> Result<CharacteristicId> {
        self.protocol
            .resolve(characteristic)
            .ok_or(Error::UnsupportedCharacteristic(characteristic.name()))
    }

    async fn read(&mut self, characteristic: Characteristic) -> Result<Vec<u8>> {
        let id = self.resolve(characteristic)?;
        if !self.connected {
            return Err(TransportError::Disconnected.into());
        }
        let value = self.transport.read(&id).await?;
        debug!("[R] {} ({}) = {:02x?}", id, characteristic, value);
        Ok(value)
    }

    async fn write(&mut self, characteristic: Characteristic, value: &[u8]) -> Result<()> {
        let id = self.resolve(characteristic)?;
        if !self.connected {
            return Err(TransportError::Disconnected.into());
        }
        debug!("[W] {} ({}) = {:02x?}", id, characteristic, value);
        self.transport.write(&id, value).await?;
        Ok(())
    }

    async fn read_string(&mut self, characteristic: Characteristic) -> Result<String> {
        let raw = self.read(characteristic).await?;
        codec::decode_string(characteristic.name(), &raw)
    }

    /// Read a characteristic without interpreting it.
    pub async fn read_raw(&mut self, characteristic: Characteristic) -> Result<Vec<u8>> {
        self.read(characteristic).await
    }

    /// Dump every characteristic the device exposes, with current values
    /// where readable.
    pub async fn scan_characteristics(&mut self) -> Result<Vec<CharacteristicReport>> {
        if !self.connected {
            return Err(TransportError::Disconnected.into());
        }
        let found = self.transport.list_characteristics().await?;
        let mut reports = Vec::with_capacity(found.len());
        for info in found {
            let name = self
                .protocol
                .identify(&info.id)
                .map_or("unknown", Characteristic::name);
            let value = if info.properties.read {
                Some(self.transport.read(&info.id).await?)
            } else {
                None
            };
            reports.push(CharacteristicReport {
                id: info.id,
                name,
                properties: info.properties,
                value,
            });
        }
        Ok(reports)
    }

    // --- Device information

    pub async fn get_device_name(&mut self) -> Result<String> {
        self.read_string(Characteristic::DeviceName).await
    }

    pub async fn get_model_number(&mut self) -> Result<String> {
        self.read_string(Characteristic::ModelNumber).await
    }

    pub async fn get_serial_number(&mut self) -> Result<String> {
        self.read_string(Characteristic::SerialNumber).await
    }

    pub async fn get_hardware_revision(&mut self) -> Result<String> {
        self.read_string(Characteristic::HardwareRevision).await
    }

    pub async fn get_firmware_revision(&mut self) -> Result<String> {
        self.read_string(Characteristic::FirmwareRevision).await
    }

    pub async fn get_software_revision(&mut self) -> Result<String> {
        self.read_string(Characteristic::SoftwareRevision).await
    }

    pub async fn get_manufacturer(&mut self) -> Result<String> {
        self.read_string(Characteristic::Manufacturer).await
    }

    // --- Authentication

    /// Write the pin to the authentication characteristic. The device does
    /// not answer; use [`Self::check_auth`] where supported.
    pub async fn set_auth(&mut self, pin: &str) -> Result<()> {
        let value = codec::encode_pin(pin)?;
        self.write(Characteristic::PinCode, &value).await
    }

    pub async fn check_auth(&mut self) -> Result<bool> {
        let raw = self.read(Characteristic::PinConfirmation).await?;
        codec::decode_pin_confirmation(&raw)
    }

    // --- Identity and status

    pub async fn get_alias(&mut self) -> Result<String> {
        self.read_string(Characteristic::Alias).await
    }

    pub async fn set_alias(&mut self, name: &str) -> Result<()> {
        let value = codec::encode_alias(name)?;
        self.write(Characteristic::Alias, &value).await
    }

    /// Raw status bytes. Firmware reports `02` here after losing the clock.
    pub async fn get_status(&mut self) -> Result<Vec<u8>> {
        self.read(Characteristic::Status).await
    }

    pub async fn get_led(&mut self) -> Result<Vec<u8>> {
        self.read(Characteristic::Led).await
    }

    pub async fn get_factory_settings_changed(&mut self) -> Result<bool> {
        let raw = self.read(Characteristic::FactorySettingsChanged).await?;
        codec::decode_flag("factory settings changed", &raw)
    }

    pub async fn get_mode(&mut self) -> Result<DeviceMode> {
        let raw = self.read(Characteristic::Mode).await?;
        codec::decode_mode(&raw)
    }

    pub async fn set_mode(&mut self, mode: DeviceMode) -> Result<()> {
        let value = codec::encode_mode(mode)?;
        self.write(Characteristic::Mode, &value).await
    }

    // --- Live state

    /// Current sensor readout, decoded with the layout of the active protocol.
    pub async fn get_state(&mut self) -> Result<FanState> {
        let raw = self.read(Characteristic::SensorData).await?;
        match self.protocol {
            Protocol::Legacy => codec::decode_legacy_state(&raw).map(FanState::Legacy),
            Protocol::Current => codec::decode_sensor_data(&raw).map(FanState::Current),
        }
    }

    // --- Configuration

    pub async fn get_fan_speed_settings(&mut self) -> Result<FanSpeedSettings> {
        let raw = self.read(Characteristic::FanSpeeds).await?;
        codec::decode_fan_speeds(&raw)
    }

    pub async fn set_fan_speed_settings(&mut self, speeds: &FanSpeedSettings) -> Result<()> {
        let value = codec::encode_fan_speeds(speeds)?;
        self.write(Characteristic::FanSpeeds, &value).await
    }

    pub async fn get_sensors_sensitivity(&mut self) -> Result<SensorSensitivity> {
        let raw = self.read(Characteristic::Sensitivity).await?;
        codec::decode_sensitivity(&raw)
    }

    /// Set sensor sensitivity levels (0-3). Level 0 disables the sensor.
    pub async fn set_sensors_sensitivity(&mut self, humidity: u8, light: u8) -> Result<()> {
        let sensitivity = SensorSensitivity::from_levels(humidity, light)?;
        let value = codec::encode_sensitivity(&sensitivity)?;
        self.write(Characteristic::Sensitivity, &value).await
    }

    pub async fn get_light_sensor_settings(&mut self) -> Result<LightSensorSettings> {
        let raw = self.read(Characteristic::LightSensor).await?;
        codec::decode_light_sensor(&raw)
    }

    pub async fn set_light_sensor_settings(
        &mut self,
        delayed_start: u8,
        running_time: u8,
    ) -> Result<()> {
        let value = codec::encode_light_sensor(&LightSensorSettings {
            delayed_start,
            running_time,
        })?;
        self.write(Characteristic::LightSensor, &value).await
    }

    pub async fn get_heat_distributor(&mut self) -> Result<HeatDistributorSettings> {
        let raw = self.read(Characteristic::HeatDistributor).await?;
        codec::decode_heat_distributor(&raw)
    }

    pub async fn get_boost_mode(&mut self) -> Result<BoostMode> {
        let raw = self.read(Characteristic::Boost).await?;
        codec::decode_boost(&raw)
    }

    /// Start or stop boost. Turning boost off clears speed and duration.
    pub async fn set_boost_mode(&mut self, enabled: bool, speed: u16, seconds: u16) -> Result<()> {
        let value = codec::encode_boost(&BoostMode {
            enabled,
            speed,
            seconds,
        })?;
        self.write(Characteristic::Boost, &value).await
    }

    pub async fn get_automatic_cycles(&mut self) -> Result<AutomaticCycles> {
        let raw = self.read(Characteristic::AutomaticCycles).await?;
        codec::decode_automatic_cycles(&raw)
    }

    /// 0 = disabled, 1 = 30 min, 2 = 60 min, 3 = 90 min.
    pub async fn set_automatic_cycles(&mut self, setting: u8) -> Result<()> {
        let setting = AutomaticCycles::try_from(setting)?;
        let value = codec::encode_automatic_cycles(setting);
        self.write(Characteristic::AutomaticCycles, &value).await
    }

    pub async fn get_time(&mut self) -> Result<Time> {
        let raw = self.read(Characteristic::Clock).await?;
        codec::decode_time(&raw)
    }

    pub async fn set_time(&mut self, time: &Time) -> Result<()> {
        let value = codec::encode_time(time);
        self.write(Characteristic::Clock, &value).await
    }

    /// Set the device clock from local time.
    pub async fn set_time_to_now(&mut self) -> Result<()> {
        self.set_time(&Time::now()).await
    }

    pub async fn get_silent_hours(&mut self) -> Result<SilentHours> {
        let raw = self.read(Characteristic::SilentHours).await?;
        codec::decode_silent_hours(&raw)
    }

    pub async fn set_silent_hours(&mut self, hours: &SilentHours) -> Result<()> {
        let value = codec::encode_silent_hours(hours)?;
        self.write(Characteristic::SilentHours, &value).await
    }

    pub async fn get_trickle_days(&mut self) -> Result<TrickleDays> {
        let raw = self.read(Characteristic::TrickleDays).await?;
        codec::decode_trickle_days(&raw)
    }

    pub async fn set_trickle_days(&mut self, weekdays: u8, weekends: u8) -> Result<()> {
        let value = codec::encode_trickle_days(&TrickleDays { weekdays, weekends });
        self.write(Characteristic::TrickleDays, &value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Trigger;
    use crate::infrastructure::bluetooth::protocol::{
        BOOST_UUID, FAN_SPEED_LEVELS_UUID, MODE_UUID, PIN_CODE_UUID, PIN_CONFIRMATION_UUID,
        SENSOR_DATA_UUID,
    };
    use crate::infrastructure::bluetooth::transport::mock::{Call, MockTransport};

    const PIN: &str = "03155106";

    fn uuid(u: uuid::Uuid) -> CharacteristicId {
        CharacteristicId::Uuid(u)
    }

    async fn connected(mock: &MockTransport, protocol: Protocol) -> FanService<MockTransport> {
        FanService::connect(mock.clone(), protocol, PIN).await.unwrap()
    }

    #[tokio::test]
    async fn test_connect_writes_pin() {
        let mock = MockTransport::new();
        let _fan = connected(&mock, Protocol::Current).await;
        assert_eq!(
            mock.calls(),
            vec![Call::Write(
                uuid(PIN_CODE_UUID),
                3_155_106u32.to_le_bytes().to_vec()
            )]
        );
    }

    #[tokio::test]
    async fn test_legacy_connect_uses_handle() {
        let mock = MockTransport::new();
        let _fan = connected(&mock, Protocol::Legacy).await;
        assert!(matches!(
            mock.calls().as_slice(),
            [Call::Write(CharacteristicId::Handle(0x18), _)]
        ));
    }

    #[tokio::test]
    async fn test_bad_pin_disconnects_without_writing() {
        let mock = MockTransport::new();
        let result = FanService::connect(mock.clone(), Protocol::Current, "not-a-pin").await;
        assert!(matches!(result, Err(Error::InvalidArgument { field: "pin", .. })));
        assert_eq!(mock.calls(), vec![Call::Disconnect]);
    }

    #[tokio::test]
    async fn test_get_state_per_protocol() {
        let mut raw = Vec::new();
        for v in [1024u16, 84, 7, 1500] {
            raw.extend_from_slice(&v.to_le_bytes());
        }
        raw.extend_from_slice(&[0b0001_0011, 0, 0, 0]);

        let mock = MockTransport::new()
            .with_value(uuid(SENSOR_DATA_UUID), &raw)
            .with_value(CharacteristicId::Handle(0x21), &raw);

        let mut current = connected(&mock, Protocol::Current).await;
        match current.get_state().await.unwrap() {
            FanState::Current(state) => {
                assert_eq!(state.humidity, 100.0);
                assert_eq!(state.temperature, 21.0);
                assert_eq!(state.trigger, Trigger::Boost);
            }
            other => panic!("unexpected layout: {other:?}"),
        }

        let mut legacy = connected(&mock, Protocol::Legacy).await;
        match legacy.get_state().await.unwrap() {
            FanState::Legacy(state) => {
                assert_eq!(state.humidity, 1024);
                assert!(state.boost_active);
                assert_eq!(state.mode, 0b0000_1001);
            }
            other => panic!("unexpected layout: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_setter_never_reaches_transport() {
        let mock = MockTransport::new();
        let mut fan = connected(&mock, Protocol::Current).await;
        let before = mock.calls().len();

        let speeds = FanSpeedSettings {
            humidity: 2250,
            light: 2510,
            trickle: 1000,
        };
        assert!(fan.set_fan_speed_settings(&speeds).await.is_err());
        assert!(fan.set_sensors_sensitivity(4, 0).await.is_err());
        assert!(fan.set_light_sensor_settings(7, 5).await.is_err());
        assert!(fan.set_automatic_cycles(4).await.is_err());
        assert!(fan.set_boost_mode(true, 2260, 60).await.is_err());
        assert!(fan.set_mode(DeviceMode::Unknown(9)).await.is_err());
        assert!(fan.set_alias("this alias is longer than twenty").await.is_err());
        let hours = SilentHours {
            enabled: true,
            start_hour: 24,
            start_minute: 0,
            end_hour: 6,
            end_minute: 0,
        };
        assert!(fan.set_silent_hours(&hours).await.is_err());

        assert_eq!(mock.calls().len(), before);
    }

    #[tokio::test]
    async fn test_boost_off_coerces_values() {
        let mock = MockTransport::new();
        let mut fan = connected(&mock, Protocol::Current).await;
        fan.set_boost_mode(false, 1500, 30).await.unwrap();
        assert_eq!(mock.value(&uuid(BOOST_UUID)), Some(vec![0, 0, 0, 0, 0]));

        let boost = fan.get_boost_mode().await.unwrap();
        assert_eq!(boost, BoostMode::off());
    }

    #[tokio::test]
    async fn test_fan_speeds_write_then_read() {
        let mock = MockTransport::new();
        let mut fan = connected(&mock, Protocol::Current).await;
        let speeds = FanSpeedSettings::new(2250, 975, 950).unwrap();
        fan.set_fan_speed_settings(&speeds).await.unwrap();
        assert_eq!(fan.get_fan_speed_settings().await.unwrap(), speeds);

        let calls = mock.calls();
        assert_eq!(calls.last(), Some(&Call::Read(uuid(FAN_SPEED_LEVELS_UUID))));
    }

    #[tokio::test]
    async fn test_short_read_is_malformed() {
        let mock = MockTransport::new().with_value(uuid(FAN_SPEED_LEVELS_UUID), &[1, 2, 3]);
        let mut fan = connected(&mock, Protocol::Current).await;
        let err = fan.get_fan_speed_settings().await.unwrap_err();
        assert!(err.to_string().contains("expected 6 bytes, got 3"));
    }

    #[tokio::test]
    async fn test_unsupported_characteristic_has_no_io() {
        let mock = MockTransport::new();
        let mut fan = connected(&mock, Protocol::Legacy).await;
        let before = mock.calls().len();
        assert!(matches!(
            fan.get_mode().await,
            Err(Error::UnsupportedCharacteristic("mode"))
        ));
        assert_eq!(mock.calls().len(), before);
    }

    #[tokio::test]
    async fn test_unknown_mode_is_surfaced() {
        let mock = MockTransport::new().with_value(uuid(MODE_UUID), &[9]);
        let mut fan = connected(&mock, Protocol::Current).await;
        assert_eq!(fan.get_mode().await.unwrap(), DeviceMode::Unknown(9));
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let mock = MockTransport::new();
        let mut fan = connected(&mock, Protocol::Current).await;
        mock.fail_next(TransportError::Timeout(5));
        let err = fan.get_boost_mode().await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let mock = MockTransport::new();
        let mut fan = connected(&mock, Protocol::Current).await;
        fan.disconnect().await.unwrap();
        fan.disconnect().await.unwrap();
        assert!(!fan.is_connected());

        let disconnects = mock
            .calls()
            .iter()
            .filter(|c| **c == Call::Disconnect)
            .count();
        assert_eq!(disconnects, 1);
        assert!(fan.get_time().await.unwrap_err().is_transport());
    }

    #[tokio::test]
    async fn test_scan_characteristics() {
        let readable = Properties {
            read: true,
            ..Properties::default()
        };
        let write_only = Properties {
            write: true,
            ..Properties::default()
        };
        let mock = MockTransport::new()
            .with_characteristic(uuid(BOOST_UUID), readable)
            .with_characteristic(uuid(PIN_CODE_UUID), write_only)
            .with_value(uuid(BOOST_UUID), &[0, 0, 0, 0, 0]);
        let mut fan = connected(&mock, Protocol::Current).await;

        let reports = fan.scan_characteristics().await.unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].name, "boost");
        assert_eq!(reports[0].value, Some(vec![0, 0, 0, 0, 0]));
        assert_eq!(reports[1].name, "pin code");
        assert_eq!(reports[1].value, None);
    }

    #[tokio::test]
    async fn test_sensitivity_and_time_writes() {
        let mock = MockTransport::new();
        let mut fan = connected(&mock, Protocol::Legacy).await;
        fan.set_sensors_sensitivity(2, 0).await.unwrap();
        assert_eq!(
            mock.value(&CharacteristicId::Handle(0x2a)),
            Some(vec![1, 2, 0, 0])
        );

        let time = Time {
            day_of_week: 1,
            hour: 6,
            minute: 30,
            second: 0,
        };
        fan.set_time(&time).await.unwrap();
        assert_eq!(fan.get_time().await.unwrap(), time);

        fan.set_trickle_days(1, 1).await.unwrap();
        assert_eq!(
            mock.value(&CharacteristicId::Handle(0x3a)),
            Some(vec![1, 1])
        );
    }

    #[tokio::test]
    async fn test_check_auth_reads_confirmation() {
        let mock = MockTransport::new().with_value(uuid(PIN_CONFIRMATION_UUID), &[1]);
        let mut fan = connected(&mock, Protocol::Current).await;
        assert!(fan.check_auth().await.unwrap());
        assert_eq!(
            mock.calls().last(),
            Some(&Call::Read(uuid(PIN_CONFIRMATION_UUID)))
        );

        let rejected = MockTransport::new().with_value(uuid(PIN_CONFIRMATION_UUID), &[0]);
        let mut fan = connected(&rejected, Protocol::Current).await;
        assert!(!fan.check_auth().await.unwrap());
    }

    #[tokio::test]
    async fn test_disconnect_failure_after_bad_pin_keeps_auth_error() {
        let mock = MockTransport::new();
        mock.fail_next(TransportError::Timeout(5));
        mock.fail_disconnect(TransportError::Disconnected);
        let result = FanService::connect(mock.clone(), Protocol::Current, "1234").await;
        assert!(matches!(
            result,
            Err(Error::Transport(TransportError::Timeout(5)))
        ));
        assert_eq!(mock.calls().last(), Some(&Call::Disconnect));
    }

    #[tokio::test]
    async fn test_read_raw_legacy_unknown_slot() {
        let mock = MockTransport::new().with_value(CharacteristicId::Handle(0x24), &[0xde, 0xad]);
        let mut fan = connected(&mock, Protocol::Legacy).await;
        assert_eq!(
            fan.read_raw(Characteristic::Unknown24).await.unwrap(),
            vec![0xde, 0xad]
        );

        let mut current = connected(&mock, Protocol::Current).await;
        assert!(matches!(
            current.read_raw(Characteristic::Unknown24).await,
            Err(Error::UnsupportedCharacteristic("unknown 0x24"))
        ));
    }

    #[tokio::test]
    async fn test_device_strings() {
        let mock = MockTransport::new()
            .with_value(CharacteristicId::Handle(0x03), b"PAX Calima")
            .with_value(CharacteristicId::Handle(0x1c), b"Bathroom\0\0\0\0");
        let mut fan = connected(&mock, Protocol::Legacy).await;
        assert_eq!(fan.get_device_name().await.unwrap(), "PAX Calima");
        assert_eq!(fan.get_alias().await.unwrap(), "Bathroom");
    }
}
