use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;

/// Highest fan speed the device accepts, in RPM.
pub const MAX_FAN_SPEED: u16 = 2500;
/// Fan speeds are set in steps of this many RPM.
pub const FAN_SPEED_STEP: u16 = 25;

pub const DELAYED_START_OPTIONS: [u8; 3] = [0, 5, 10];
pub const RUNNING_TIME_OPTIONS: [u8; 5] = [5, 10, 15, 30, 60];
pub const MAX_SENSITIVITY: u8 = 3;

/// Fan speeds used for each ventilation trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FanSpeedSettings {
    pub humidity: u16,
    pub light: u16,
    pub trickle: u16,
}

impl Default for FanSpeedSettings {
    fn default() -> Self {
        Self {
            humidity: 2250,
            light: 1625,
            trickle: 1000,
        }
    }
}

impl FanSpeedSettings {
    /// Build validated settings from possibly out-of-range input.
    pub fn new(humidity: i32, light: i32, trickle: i32) -> Result<Self> {
        Ok(Self {
            humidity: checked_fan_speed("humidity speed", humidity)?,
            light: checked_fan_speed("light speed", light)?,
            trickle: checked_fan_speed("trickle speed", trickle)?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        checked_fan_speed("humidity speed", i32::from(self.humidity))?;
        checked_fan_speed("light speed", i32::from(self.light))?;
        checked_fan_speed("trickle speed", i32::from(self.trickle))?;
        Ok(())
    }
}

fn checked_fan_speed(field: &'static str, value: i32) -> Result<u16> {
    if value % i32::from(FAN_SPEED_STEP) != 0 {
        return Err(Error::invalid(
            field,
            format!("{} is not a multiple of {}", value, FAN_SPEED_STEP),
        ));
    }
    if !(0..=i32::from(MAX_FAN_SPEED)).contains(&value) {
        return Err(Error::invalid(
            field,
            format!("{} is outside 0-{} rpm", value, MAX_FAN_SPEED),
        ));
    }
    u16::try_from(value).map_err(|_| Error::invalid(field, format!("{} does not fit", value)))
}

/// Sensor trigger sensitivity. A level of 0 switches the sensor off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SensorSensitivity {
    pub humidity_enabled: bool,
    pub humidity: u8,
    pub light_enabled: bool,
    pub light: u8,
}

impl SensorSensitivity {
    /// Sensitivity with each sensor enabled exactly when its level is non-zero.
    pub fn from_levels(humidity: u8, light: u8) -> Result<Self> {
        let sensitivity = Self {
            humidity_enabled: humidity != 0,
            humidity,
            light_enabled: light != 0,
            light,
        };
        sensitivity.validate()?;
        Ok(sensitivity)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, level) in [
            ("humidity sensitivity", self.humidity),
            ("light sensitivity", self.light),
        ] {
            if level > MAX_SENSITIVITY {
                return Err(Error::invalid(
                    field,
                    format!("{} is outside 0-{}", level, MAX_SENSITIVITY),
                ));
            }
        }
        Ok(())
    }
}

/// Light sensor timing, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LightSensorSettings {
    pub delayed_start: u8,
    pub running_time: u8,
}

impl LightSensorSettings {
    pub fn validate(&self) -> Result<()> {
        if !DELAYED_START_OPTIONS.contains(&self.delayed_start) {
            return Err(Error::invalid(
                "delayed start",
                format!("{} must be 0, 5 or 10 minutes", self.delayed_start),
            ));
        }
        if !RUNNING_TIME_OPTIONS.contains(&self.running_time) {
            return Err(Error::invalid(
                "running time",
                format!("{} must be 5, 10, 15, 30 or 60 minutes", self.running_time),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoostMode {
    pub enabled: bool,
    pub speed: u16,
    pub seconds: u16,
}

impl BoostMode {
    pub fn off() -> Self {
        Self {
            enabled: false,
            speed: 0,
            seconds: 0,
        }
    }

    /// The values actually written: a disabled boost always carries zero speed and duration.
    pub fn normalized(&self) -> Self {
        if self.enabled {
            *self
        } else {
            Self::off()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.speed % FAN_SPEED_STEP != 0 {
            return Err(Error::invalid(
                "boost speed",
                format!("{} is not a multiple of {}", self.speed, FAN_SPEED_STEP),
            ));
        }
        Ok(())
    }
}

/// Daily window during which the fan stays quiet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SilentHours {
    pub enabled: bool,
    pub start_hour: u8,
    pub start_minute: u8,
    pub end_hour: u8,
    pub end_minute: u8,
}

impl SilentHours {
    pub fn validate(&self) -> Result<()> {
        check_hour("starting hour", self.start_hour)?;
        check_hour("ending hour", self.end_hour)?;
        check_minute("starting minute", self.start_minute)?;
        check_minute("ending minute", self.end_minute)?;
        Ok(())
    }
}

fn check_hour(field: &'static str, hour: u8) -> Result<()> {
    if hour > 23 {
        return Err(Error::invalid(field, format!("{} is outside 0-23", hour)));
    }
    Ok(())
}

fn check_minute(field: &'static str, minute: u8) -> Result<()> {
    if minute > 59 {
        return Err(Error::invalid(field, format!("{} is outside 0-59", minute)));
    }
    Ok(())
}

/// Trickle ventilation day masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrickleDays {
    pub weekdays: u8,
    pub weekends: u8,
}

/// Device clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Time {
    pub day_of_week: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Time {
    /// Local wall-clock time, with Monday = 1 through Sunday = 7.
    pub fn now() -> Self {
        use chrono::{Datelike, Timelike};

        let now = chrono::Local::now();
        Self::from_parts(
            now.weekday().number_from_monday(),
            now.hour(),
            now.minute(),
            now.second(),
        )
    }

    fn from_parts(day_of_week: u32, hour: u32, minute: u32, second: u32) -> Self {
        // chrono keeps every component well below 256
        let byte = |v: u32| u8::try_from(v).unwrap_or(u8::MAX);
        Self {
            day_of_week: byte(day_of_week),
            hour: byte(hour),
            minute: byte(minute),
            second: byte(second),
        }
    }
}

/// Periodic full-speed airing every 12 hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AutomaticCycles {
    Disabled = 0,
    Minutes30 = 1,
    Minutes60 = 2,
    Minutes90 = 3,
}

impl AutomaticCycles {
    pub fn minutes(self) -> u16 {
        match self {
            Self::Disabled => 0,
            Self::Minutes30 => 30,
            Self::Minutes60 => 60,
            Self::Minutes90 => 90,
        }
    }
}

impl TryFrom<u8> for AutomaticCycles {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Disabled),
            1 => Ok(Self::Minutes30),
            2 => Ok(Self::Minutes60),
            3 => Ok(Self::Minutes90),
            _ => Err(Error::invalid(
                "automatic cycles",
                format!("{} is outside 0-3", value),
            )),
        }
    }
}

impl From<AutomaticCycles> for u8 {
    fn from(value: AutomaticCycles) -> Self {
        value as u8
    }
}

/// Operating mode selected on the fan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceMode {
    MultiMode,
    DraftShutterMode,
    WallSwitchExtendedRuntimeMode,
    WallSwitchNoExtendedRuntimeMode,
    HeatDistributionMode,
    /// A byte this client has no name for.
    Unknown(u8),
}

impl DeviceMode {
    /// Wire value, or `None` for an unknown mode.
    pub fn to_byte(self) -> Option<u8> {
        match self {
            Self::MultiMode => Some(0),
            Self::DraftShutterMode => Some(1),
            Self::WallSwitchExtendedRuntimeMode => Some(2),
            Self::WallSwitchNoExtendedRuntimeMode => Some(3),
            Self::HeatDistributionMode => Some(4),
            Self::Unknown(_) => None,
        }
    }

    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<u8> for DeviceMode {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::MultiMode,
            1 => Self::DraftShutterMode,
            2 => Self::WallSwitchExtendedRuntimeMode,
            3 => Self::WallSwitchNoExtendedRuntimeMode,
            4 => Self::HeatDistributionMode,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(raw) => write!(f, "Unknown({})", raw),
            known => write!(f, "{:?}", known),
        }
    }
}

/// What is currently driving the fan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trigger {
    Boost,
    Trickle,
    Light,
    Humidity,
    None,
}

impl Trigger {
    /// Classify a status byte. The boost bit (bit 4) wins over the 2-bit trigger code.
    pub fn from_status(status: u8) -> Self {
        if status & 0x10 != 0 {
            return Self::Boost;
        }
        match status & 0x03 {
            1 => Self::Trickle,
            2 => Self::Light,
            3 => Self::Humidity,
            _ => Self::None,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Boost => "Boost",
            Self::Trickle => "Trickle ventilation",
            Self::Light => "Light ventilation",
            Self::Humidity => "Humidity ventilation",
            Self::None => "No trigger",
        };
        f.write_str(label)
    }
}

/// Live sensor readout in the handle-addressed firmware layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LegacyFanState {
    /// Raw humidity reading.
    pub humidity: u16,
    /// Degrees Celsius.
    pub temperature: f64,
    pub light: u16,
    pub rpm: u16,
    pub boost_active: bool,
    /// Status byte shifted right by one.
    pub mode: u8,
    pub reserved: u16,
    pub reserved2: u8,
}

/// Live sensor readout in the UUID-addressed firmware layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorData {
    /// Calibrated humidity, `round(log2(raw) * 10, 2)`.
    pub humidity: f64,
    /// Degrees Celsius.
    pub temperature: f64,
    pub light: u16,
    pub rpm: u16,
    pub trigger: Trigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FanState {
    Legacy(LegacyFanState),
    Current(SensorData),
}

impl FanState {
    pub fn temperature(&self) -> f64 {
        match self {
            Self::Legacy(s) => s.temperature,
            Self::Current(s) => s.temperature,
        }
    }
}

/// Heat distribution thresholds. Read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeatDistributorSettings {
    pub temperature_limit: u8,
    pub fan_speed_below: u16,
    pub fan_speed_above: u16,
}

impl fmt::Display for FanSpeedSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "humidity={} light={} trickle={} rpm",
            self.humidity, self.light, self.trickle
        )
    }
}

impl fmt::Display for SensorSensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = |on: bool| if on { "on" } else { "off" };
        write!(
            f,
            "humidity={} ({}) light={} ({})",
            self.humidity,
            state(self.humidity_enabled),
            self.light,
            state(self.light_enabled)
        )
    }
}

impl fmt::Display for LightSensorSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "delayed start={} min running time={} min",
            self.delayed_start, self.running_time
        )
    }
}

impl fmt::Display for BoostMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.enabled {
            write!(f, "on speed={} rpm remaining={} s", self.speed, self.seconds)
        } else {
            f.write_str("off")
        }
    }
}

impl fmt::Display for SilentHours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:02}:{:02}-{:02}:{:02}",
            if self.enabled { "on" } else { "off" },
            self.start_hour,
            self.start_minute,
            self.end_hour,
            self.end_minute
        )
    }
}

impl fmt::Display for TrickleDays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "weekdays={} weekends={}", self.weekdays, self.weekends)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "day {} {:02}:{:02}:{:02}",
            self.day_of_week, self.hour, self.minute, self.second
        )
    }
}

impl fmt::Display for AutomaticCycles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("disabled"),
            other => write!(f, "{} min", other.minutes()),
        }
    }
}

impl fmt::Display for LegacyFanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "humidity={} temp={:.2} light={} rpm={} boost={} mode={} unknown={} unknown2={}",
            self.humidity,
            self.temperature,
            self.light,
            self.rpm,
            self.boost_active,
            self.mode,
            self.reserved,
            self.reserved2
        )
    }
}

impl fmt::Display for SensorData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "humidity={:.2} temp={:.2} light={} rpm={} mode={}",
            self.humidity, self.temperature, self.light, self.rpm, self.trigger
        )
    }
}

impl fmt::Display for FanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy(state) => fmt::Display::fmt(state, f),
            Self::Current(state) => fmt::Display::fmt(state, f),
        }
    }
}

impl fmt::Display for HeatDistributorSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "limit={} C below={} rpm above={} rpm",
            self.temperature_limit, self.fan_speed_below, self.fan_speed_above
        )
    }
}

/// A fan seen during a BLE scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannedDevice {
    pub name: String,
    pub address: String,
    pub signal_strength: Option<i16>,
}

impl fmt::Display for ScannedDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.address, self.name)?;
        if let Some(rssi) = self.signal_strength {
            write!(f, " ({} dBm)", rssi)?;
        }
        Ok(())
    }
}
