//! Calima Fan Protocol
//!
//! Logical characteristics exposed by the fan and the two ways firmware
//! versions address them: fixed ATT handles (legacy) and 128-bit UUIDs
//! (current).

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Standard Device Information characteristics (Bluetooth SIG assigned)
pub const DEVICE_NAME_UUID: Uuid = Uuid::from_u128(0x00002a00_0000_1000_8000_00805f9b34fb);
pub const MODEL_NUMBER_UUID: Uuid = Uuid::from_u128(0x00002a24_0000_1000_8000_00805f9b34fb);
pub const SERIAL_NUMBER_UUID: Uuid = Uuid::from_u128(0x00002a25_0000_1000_8000_00805f9b34fb);
pub const FIRMWARE_REVISION_UUID: Uuid = Uuid::from_u128(0x00002a26_0000_1000_8000_00805f9b34fb);
pub const HARDWARE_REVISION_UUID: Uuid = Uuid::from_u128(0x00002a27_0000_1000_8000_00805f9b34fb);
pub const SOFTWARE_REVISION_UUID: Uuid = Uuid::from_u128(0x00002a28_0000_1000_8000_00805f9b34fb);
pub const MANUFACTURER_NAME_UUID: Uuid = Uuid::from_u128(0x00002a29_0000_1000_8000_00805f9b34fb);

/// PAX vendor characteristics
pub const PIN_CODE_UUID: Uuid = Uuid::from_u128(0x4cad343a_209a_40b7_b911_4d9b3df569b2);
pub const PIN_CONFIRMATION_UUID: Uuid = Uuid::from_u128(0xd1ae6b70_ee12_4f6d_b166_d2063dcaffe1);
pub const FAN_DESCRIPTION_UUID: Uuid = Uuid::from_u128(0xb85fa07a_9382_4838_871c_81d045dcc2ff);
pub const STATUS_UUID: Uuid = Uuid::from_u128(0x25a824ad_3021_4de9_9f2f_60cf8d17bded);
pub const SENSOR_DATA_UUID: Uuid = Uuid::from_u128(0x528b80e8_c47a_4c0a_bdf1_916a7748f412);
pub const FAN_SPEED_LEVELS_UUID: Uuid = Uuid::from_u128(0x1488a757_35bc_4ec8_9a6b_9ecf1502778e);
pub const SENSITIVITY_UUID: Uuid = Uuid::from_u128(0xe782e131_6ce1_4191_a8db_f4304d7610f1);
pub const TIME_FUNCTIONS_UUID: Uuid = Uuid::from_u128(0x49c616de_02b1_4b67_b237_90f66793a6f2);
pub const HEAT_DISTRIBUTOR_UUID: Uuid = Uuid::from_u128(0xa22eae12_dba8_49f3_9c69_1721dcff1d96);
pub const BOOST_UUID: Uuid = Uuid::from_u128(0x118c949c_28c8_4139_b0b3_36657fd055a9);
pub const LED_UUID: Uuid = Uuid::from_u128(0x8b850c04_dc18_44d2_9501_7662d65ba36e);
pub const AUTOMATIC_CYCLES_UUID: Uuid = Uuid::from_u128(0xf508408a_508b_41c6_aa57_61d1fd0d5c39);
pub const CLOCK_UUID: Uuid = Uuid::from_u128(0x6dec478e_ae0b_4186_9d82_13dda03c0682);
pub const NIGHT_MODE_UUID: Uuid = Uuid::from_u128(0xb5836b55_57bd_433e_8480_46e4993c5ac0);
pub const BASIC_VENTILATION_UUID: Uuid = Uuid::from_u128(0xfaa49e09_a79c_4725_b197_bdc57c67dc32);
pub const MODE_UUID: Uuid = Uuid::from_u128(0x90cabcd1_bcda_4167_85d8_16dcd8ab6a6b);
pub const FACTORY_SETTINGS_CHANGED_UUID: Uuid =
    Uuid::from_u128(0x63b04af9_24c0_4e5d_a69c_94eb9c5707b4);
pub const RESET_UUID: Uuid = Uuid::from_u128(0xff5f7c4f_2606_4c69_b360_15aaea58ad5f);

/// A named data slot on the fan, independent of how it is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Characteristic {
    DeviceName,
    ModelNumber,
    SerialNumber,
    HardwareRevision,
    FirmwareRevision,
    SoftwareRevision,
    Manufacturer,
    PinCode,
    PinConfirmation,
    Alias,
    Status,
    SensorData,
    FanSpeeds,
    Sensitivity,
    LightSensor,
    HeatDistributor,
    Boost,
    Led,
    AutomaticCycles,
    Clock,
    SilentHours,
    TrickleDays,
    Mode,
    FactorySettingsChanged,
    Reset,
    Unknown24,
    Unknown26,
    Unknown2E,
    Unknown32,
}

impl Characteristic {
    pub const ALL: [Characteristic; 29] = [
        Self::DeviceName,
        Self::ModelNumber,
        Self::SerialNumber,
        Self::HardwareRevision,
        Self::FirmwareRevision,
        Self::SoftwareRevision,
        Self::Manufacturer,
        Self::PinCode,
        Self::PinConfirmation,
        Self::Alias,
        Self::Status,
        Self::SensorData,
        Self::FanSpeeds,
        Self::Sensitivity,
        Self::LightSensor,
        Self::HeatDistributor,
        Self::Boost,
        Self::Led,
        Self::AutomaticCycles,
        Self::Clock,
        Self::SilentHours,
        Self::TrickleDays,
        Self::Mode,
        Self::FactorySettingsChanged,
        Self::Reset,
        Self::Unknown24,
        Self::Unknown26,
        Self::Unknown2E,
        Self::Unknown32,
    ];

    /// Human-readable name used in logs, errors and characteristic dumps.
    pub fn name(self) -> &'static str {
        match self {
            Self::DeviceName => "device name",
            Self::ModelNumber => "model number",
            Self::SerialNumber => "serial number",
            Self::HardwareRevision => "hardware revision",
            Self::FirmwareRevision => "firmware revision",
            Self::SoftwareRevision => "software revision",
            Self::Manufacturer => "manufacturer name",
            Self::PinCode => "pin code",
            Self::PinConfirmation => "pin confirmation",
            Self::Alias => "fan description",
            Self::Status => "status",
            Self::SensorData => "sensor data",
            Self::FanSpeeds => "fan speeds",
            Self::Sensitivity => "sensitivity",
            Self::LightSensor => "light sensor",
            Self::HeatDistributor => "heat distributor",
            Self::Boost => "boost",
            Self::Led => "led",
            Self::AutomaticCycles => "automatic cycles",
            Self::Clock => "clock",
            Self::SilentHours => "silent hours",
            Self::TrickleDays => "trickle days",
            Self::Mode => "mode",
            Self::FactorySettingsChanged => "factory settings changed",
            Self::Reset => "reset",
            Self::Unknown24 => "unknown 0x24",
            Self::Unknown26 => "unknown 0x26",
            Self::Unknown2E => "unknown 0x2e",
            Self::Unknown32 => "unknown 0x32",
        }
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Transport-level address of a characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacteristicId {
    Handle(u16),
    Uuid(Uuid),
}

impl fmt::Display for CharacteristicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handle(handle) => write!(f, "{:#04x}", handle),
            Self::Uuid(uuid) => write!(f, "{}", uuid),
        }
    }
}

/// Firmware protocol generation, which decides both characteristic
/// addressing and the sensor data layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// UUID-addressed characteristics.
    #[default]
    Current,
    /// Fixed ATT handles.
    Legacy,
}

impl Protocol {
    /// Identifier for a characteristic, or `None` if this firmware lacks it.
    pub fn resolve(self, characteristic: Characteristic) -> Option<CharacteristicId> {
        match self {
            Self::Current => uuid_for(characteristic).map(CharacteristicId::Uuid),
            Self::Legacy => handle_for(characteristic).map(CharacteristicId::Handle),
        }
    }

    /// Reverse lookup used when naming discovered characteristics.
    pub fn identify(self, id: &CharacteristicId) -> Option<Characteristic> {
        Characteristic::ALL
            .into_iter()
            .find(|c| self.resolve(*c).as_ref() == Some(id))
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => f.write_str("current"),
            Self::Legacy => f.write_str("legacy"),
        }
    }
}

fn uuid_for(characteristic: Characteristic) -> Option<Uuid> {
    use Characteristic as C;

    let uuid = match characteristic {
        C::DeviceName => DEVICE_NAME_UUID,
        C::ModelNumber => MODEL_NUMBER_UUID,
        C::SerialNumber => SERIAL_NUMBER_UUID,
        C::HardwareRevision => HARDWARE_REVISION_UUID,
        C::FirmwareRevision => FIRMWARE_REVISION_UUID,
        C::SoftwareRevision => SOFTWARE_REVISION_UUID,
        C::Manufacturer => MANUFACTURER_NAME_UUID,
        C::PinCode => PIN_CODE_UUID,
        C::PinConfirmation => PIN_CONFIRMATION_UUID,
        C::Alias => FAN_DESCRIPTION_UUID,
        C::Status => STATUS_UUID,
        C::SensorData => SENSOR_DATA_UUID,
        C::FanSpeeds => FAN_SPEED_LEVELS_UUID,
        C::Sensitivity => SENSITIVITY_UUID,
        C::LightSensor => TIME_FUNCTIONS_UUID,
        C::HeatDistributor => HEAT_DISTRIBUTOR_UUID,
        C::Boost => BOOST_UUID,
        C::Led => LED_UUID,
        C::AutomaticCycles => AUTOMATIC_CYCLES_UUID,
        C::Clock => CLOCK_UUID,
        C::SilentHours => NIGHT_MODE_UUID,
        C::TrickleDays => BASIC_VENTILATION_UUID,
        C::Mode => MODE_UUID,
        C::FactorySettingsChanged => FACTORY_SETTINGS_CHANGED_UUID,
        C::Reset => RESET_UUID,
        C::Unknown24 | C::Unknown26 | C::Unknown2E | C::Unknown32 => return None,
    };
    Some(uuid)
}

fn handle_for(characteristic: Characteristic) -> Option<u16> {
    use Characteristic as C;

    let handle = match characteristic {
        C::DeviceName => 0x03,
        C::SerialNumber => 0x0b,
        C::ModelNumber => 0x0d,
        C::HardwareRevision => 0x0f,
        C::FirmwareRevision => 0x11,
        C::SoftwareRevision => 0x13,
        C::Manufacturer => 0x15,
        C::PinCode => 0x18,
        C::Alias => 0x1c,
        C::Status => 0x1f,
        C::SensorData => 0x21,
        C::Unknown24 => 0x24,
        C::Unknown26 => 0x26,
        C::FanSpeeds => 0x28,
        C::Sensitivity => 0x2a,
        C::LightSensor => 0x2c,
        C::Unknown2E => 0x2e,
        C::Boost => 0x30,
        C::Unknown32 => 0x32,
        C::AutomaticCycles => 0x34,
        C::Clock => 0x36,
        C::SilentHours => 0x38,
        C::TrickleDays => 0x3a,
        C::PinConfirmation
        | C::HeatDistributor
        | C::Led
        | C::Mode
        | C::FactorySettingsChanged
        | C::Reset => return None,
    };
    Some(handle)
}
