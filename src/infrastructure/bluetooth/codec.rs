//! Characteristic Codec
//!
//! Pure translation between the fixed-width little-endian buffers the fan
//! exchanges over GATT and the records in [`crate::domain::models`].
//! Decoders reject any buffer whose length differs from the layout; encoders
//! validate their input before producing a single byte.

use crate::domain::models::{
    AutomaticCycles, BoostMode, DeviceMode, FanSpeedSettings, HeatDistributorSettings,
    LegacyFanState, LightSensorSettings, SensorData, SensorSensitivity, SilentHours, Time,
    TrickleDays, Trigger,
};
use crate::error::{Error, Result};

pub const PIN_LEN: usize = 4;
pub const ALIAS_LEN: usize = 20;
pub const SENSOR_DATA_LEN: usize = 12;
pub const FAN_SPEEDS_LEN: usize = 6;
pub const SENSITIVITY_LEN: usize = 4;
pub const LIGHT_SENSOR_LEN: usize = 2;
pub const BOOST_LEN: usize = 5;
pub const HEAT_DISTRIBUTOR_LEN: usize = 5;
pub const AUTOMATIC_CYCLES_LEN: usize = 1;
pub const TIME_LEN: usize = 4;
pub const SILENT_HOURS_LEN: usize = 5;
pub const TRICKLE_DAYS_LEN: usize = 2;
pub const MODE_LEN: usize = 1;
pub const FLAG_LEN: usize = 1;

/// Borrow `bytes` as a fixed-size array, failing if the length is off.
fn fixed<const N: usize>(characteristic: &'static str, bytes: &[u8]) -> Result<[u8; N]> {
    bytes
        .try_into()
        .map_err(|_| Error::bad_length(characteristic, N, bytes.len()))
}

fn le_u16(lo: u8, hi: u8) -> u16 {
    u16::from_le_bytes([lo, hi])
}

// --- Authentication

/// Encode a numeric pin as a 4-byte little-endian integer.
pub fn encode_pin(pin: &str) -> Result<[u8; PIN_LEN]> {
    let value: u32 = pin
        .trim()
        .parse()
        .map_err(|_| Error::invalid("pin", format!("{:?} is not a 32-bit number", pin)))?;
    Ok(value.to_le_bytes())
}

pub fn decode_pin_confirmation(bytes: &[u8]) -> Result<bool> {
    let [b] = fixed::<FLAG_LEN>("pin confirmation", bytes)?;
    Ok(b != 0)
}

// --- Strings

/// Decode a UTF-8 string characteristic, dropping NUL padding.
pub fn decode_string(characteristic: &'static str, bytes: &[u8]) -> Result<String> {
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    String::from_utf8(bytes[..end].to_vec())
        .map_err(|e| Error::malformed(characteristic, format!("invalid UTF-8: {}", e)))
}

/// Encode the fan alias into its 20-byte NUL-padded slot.
pub fn encode_alias(name: &str) -> Result<[u8; ALIAS_LEN]> {
    let raw = name.as_bytes();
    if raw.len() > ALIAS_LEN {
        return Err(Error::invalid(
            "alias",
            format!("{} bytes exceeds the {}-byte limit", raw.len(), ALIAS_LEN),
        ));
    }
    let mut buf = [0u8; ALIAS_LEN];
    buf[..raw.len()].copy_from_slice(raw);
    Ok(buf)
}

// --- Sensor data
//
// Both firmware generations share the same 12-byte layout:
//
// ```text
// [0-1]  : Humidity (u16)
// [2-3]  : Temperature (u16, quarter degrees)
// [4-5]  : Light (u16)
// [6-7]  : Fan speed (u16, rpm)
// [8]    : Status byte
//          bit 0-1: trigger code (1 trickle, 2 light, 3 humidity)
//          bit 4  : boost active
// [9-10] : Reserved (u16)
// [11]   : Reserved (u8)
// ```

struct RawSensorData {
    humidity: u16,
    temperature: u16,
    light: u16,
    rpm: u16,
    status: u8,
    reserved: u16,
    reserved2: u8,
}

fn split_sensor_data(bytes: &[u8]) -> Result<RawSensorData> {
    let b = fixed::<SENSOR_DATA_LEN>("sensor data", bytes)?;
    Ok(RawSensorData {
        humidity: le_u16(b[0], b[1]),
        temperature: le_u16(b[2], b[3]),
        light: le_u16(b[4], b[5]),
        rpm: le_u16(b[6], b[7]),
        status: b[8],
        reserved: le_u16(b[9], b[10]),
        reserved2: b[11],
    })
}

/// Temperature is reported in quarter degrees Celsius.
pub fn scale_temperature(raw: u16) -> f64 {
    f64::from(raw) / 4.0
}

/// Humidity calibration of the current firmware: `round(log2(raw) * 10, 2)`.
/// A zero reading has no logarithm and is reported as 0.
pub fn scale_humidity(raw: u16) -> f64 {
    if raw == 0 {
        return 0.0;
    }
    (f64::from(raw).log2() * 10.0 * 100.0).round() / 100.0
}

/// Decode sensor data in the legacy (handle-addressed) layout.
pub fn decode_legacy_state(bytes: &[u8]) -> Result<LegacyFanState> {
    let raw = split_sensor_data(bytes)?;
    Ok(LegacyFanState {
        humidity: raw.humidity,
        temperature: scale_temperature(raw.temperature),
        light: raw.light,
        rpm: raw.rpm,
        boost_active: raw.status & 0x10 != 0,
        mode: raw.status >> 1,
        reserved: raw.reserved,
        reserved2: raw.reserved2,
    })
}

/// Decode sensor data in the current (UUID-addressed) layout.
pub fn decode_sensor_data(bytes: &[u8]) -> Result<SensorData> {
    let raw = split_sensor_data(bytes)?;
    Ok(SensorData {
        humidity: scale_humidity(raw.humidity),
        temperature: scale_temperature(raw.temperature),
        light: raw.light,
        rpm: raw.rpm,
        trigger: Trigger::from_status(raw.status),
    })
}

// --- Fan speeds

pub fn decode_fan_speeds(bytes: &[u8]) -> Result<FanSpeedSettings> {
    let b = fixed::<FAN_SPEEDS_LEN>("fan speeds", bytes)?;
    Ok(FanSpeedSettings {
        humidity: le_u16(b[0], b[1]),
        light: le_u16(b[2], b[3]),
        trickle: le_u16(b[4], b[5]),
    })
}

pub fn encode_fan_speeds(speeds: &FanSpeedSettings) -> Result<[u8; FAN_SPEEDS_LEN]> {
    speeds.validate()?;
    let mut buf = [0u8; FAN_SPEEDS_LEN];
    buf[0..2].copy_from_slice(&speeds.humidity.to_le_bytes());
    buf[2..4].copy_from_slice(&speeds.light.to_le_bytes());
    buf[4..6].copy_from_slice(&speeds.trickle.to_le_bytes());
    Ok(buf)
}

// --- Sensitivity

pub fn decode_sensitivity(bytes: &[u8]) -> Result<SensorSensitivity> {
    let [humidity_on, humidity, light_on, light] =
        fixed::<SENSITIVITY_LEN>("sensitivity", bytes)?;
    Ok(SensorSensitivity {
        humidity_enabled: humidity_on != 0,
        humidity,
        light_enabled: light_on != 0,
        light,
    })
}

pub fn encode_sensitivity(sensitivity: &SensorSensitivity) -> Result<[u8; SENSITIVITY_LEN]> {
    sensitivity.validate()?;
    Ok([
        u8::from(sensitivity.humidity_enabled),
        sensitivity.humidity,
        u8::from(sensitivity.light_enabled),
        sensitivity.light,
    ])
}

// --- Light sensor

pub fn decode_light_sensor(bytes: &[u8]) -> Result<LightSensorSettings> {
    let [delayed_start, running_time] = fixed::<LIGHT_SENSOR_LEN>("light sensor", bytes)?;
    Ok(LightSensorSettings {
        delayed_start,
        running_time,
    })
}

pub fn encode_light_sensor(settings: &LightSensorSettings) -> Result<[u8; LIGHT_SENSOR_LEN]> {
    settings.validate()?;
    Ok([settings.delayed_start, settings.running_time])
}

// --- Boost

pub fn decode_boost(bytes: &[u8]) -> Result<BoostMode> {
    let b = fixed::<BOOST_LEN>("boost", bytes)?;
    Ok(BoostMode {
        enabled: b[0] != 0,
        speed: le_u16(b[1], b[2]),
        seconds: le_u16(b[3], b[4]),
    })
}

/// Encode a boost request. A disabled boost is always written with zero
/// speed and duration, whatever the caller passed.
pub fn encode_boost(boost: &BoostMode) -> Result<[u8; BOOST_LEN]> {
    boost.validate()?;
    let boost = boost.normalized();
    let mut buf = [0u8; BOOST_LEN];
    buf[0] = u8::from(boost.enabled);
    buf[1..3].copy_from_slice(&boost.speed.to_le_bytes());
    buf[3..5].copy_from_slice(&boost.seconds.to_le_bytes());
    Ok(buf)
}

// --- Heat distributor

pub fn decode_heat_distributor(bytes: &[u8]) -> Result<HeatDistributorSettings> {
    let b = fixed::<HEAT_DISTRIBUTOR_LEN>("heat distributor", bytes)?;
    Ok(HeatDistributorSettings {
        temperature_limit: b[0],
        fan_speed_below: le_u16(b[1], b[2]),
        fan_speed_above: le_u16(b[3], b[4]),
    })
}

// --- Automatic cycles

pub fn decode_automatic_cycles(bytes: &[u8]) -> Result<AutomaticCycles> {
    let [raw] = fixed::<AUTOMATIC_CYCLES_LEN>("automatic cycles", bytes)?;
    AutomaticCycles::try_from(raw)
        .map_err(|_| Error::malformed("automatic cycles", format!("unknown setting {}", raw)))
}

pub fn encode_automatic_cycles(setting: AutomaticCycles) -> [u8; AUTOMATIC_CYCLES_LEN] {
    [u8::from(setting)]
}

// --- Clock

pub fn decode_time(bytes: &[u8]) -> Result<Time> {
    let [day_of_week, hour, minute, second] = fixed::<TIME_LEN>("clock", bytes)?;
    Ok(Time {
        day_of_week,
        hour,
        minute,
        second,
    })
}

pub fn encode_time(time: &Time) -> [u8; TIME_LEN] {
    [time.day_of_week, time.hour, time.minute, time.second]
}

// --- Silent hours

pub fn decode_silent_hours(bytes: &[u8]) -> Result<SilentHours> {
    let [on, start_hour, start_minute, end_hour, end_minute] =
        fixed::<SILENT_HOURS_LEN>("silent hours", bytes)?;
    Ok(SilentHours {
        enabled: on != 0,
        start_hour,
        start_minute,
        end_hour,
        end_minute,
    })
}

pub fn encode_silent_hours(hours: &SilentHours) -> Result<[u8; SILENT_HOURS_LEN]> {
    hours.validate()?;
    Ok([
        u8::from(hours.enabled),
        hours.start_hour,
        hours.start_minute,
        hours.end_hour,
        hours.end_minute,
    ])
}

// --- Trickle days

pub fn decode_trickle_days(bytes: &[u8]) -> Result<TrickleDays> {
    let [weekdays, weekends] = fixed::<TRICKLE_DAYS_LEN>("trickle days", bytes)?;
    Ok(TrickleDays { weekdays, weekends })
}

pub fn encode_trickle_days(days: &TrickleDays) -> [u8; TRICKLE_DAYS_LEN] {
    [days.weekdays, days.weekends]
}

// --- Mode

pub fn decode_mode(bytes: &[u8]) -> Result<DeviceMode> {
    let [raw] = fixed::<MODE_LEN>("mode", bytes)?;
    Ok(DeviceMode::from(raw))
}

pub fn encode_mode(mode: DeviceMode) -> Result<[u8; MODE_LEN]> {
    let raw = mode
        .to_byte()
        .ok_or_else(|| Error::invalid("mode", format!("{} cannot be written", mode)))?;
    Ok([raw])
}

// --- Flags

pub fn decode_flag(characteristic: &'static str, bytes: &[u8]) -> Result<bool> {
    let [raw] = fixed::<FLAG_LEN>(characteristic, bytes)?;
    Ok(raw != 0)
}
