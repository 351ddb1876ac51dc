//! Error types for the fan protocol layer.

use thiserror::Error;

/// Errors raised by the codec and the device facade.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied value violates a documented constraint.
    /// Raised before any transport I/O.
    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },

    /// The device returned a buffer that does not match the characteristic layout.
    #[error("malformed {characteristic} payload: {detail}")]
    MalformedPayload {
        characteristic: &'static str,
        detail: String,
    },

    /// The selected addressing table has no identifier for this characteristic.
    #[error("characteristic {0} is not available with this protocol version")]
    UnsupportedCharacteristic(&'static str),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Error {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn bad_length(characteristic: &'static str, expected: usize, actual: usize) -> Self {
        Self::MalformedPayload {
            characteristic,
            detail: format!("expected {} bytes, got {}", expected, actual),
        }
    }

    pub(crate) fn malformed(characteristic: &'static str, detail: impl Into<String>) -> Self {
        Self::MalformedPayload {
            characteristic,
            detail: detail.into(),
        }
    }

    /// True for failures of the underlying BLE link rather than of the data.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Failures of the BLE link itself.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no Bluetooth adapter found")]
    AdapterNotFound,

    #[error("device {0} not found")]
    DeviceNotFound(String),

    #[error("characteristic {0} not found on device")]
    CharacteristicNotFound(String),

    #[error("this transport cannot address characteristic {0}")]
    UnsupportedAddressing(String),

    #[error("operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("not connected")]
    Disconnected,

    #[error(transparent)]
    Ble(#[from] btleplug::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
