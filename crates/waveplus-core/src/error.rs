//! Error types for waveplus-core.
//!
//! Every adapter operation returns [`Result`]. Errors raised inside a read
//! session never escape it: the session logs them, tears the connection
//! down and reports a [`SessionOutcome`](crate::session::SessionOutcome).
//!
//! | Error | Raised by | Effect |
//! |-------|-----------|--------|
//! | [`Error::Connect`] | `connect` | session aborted |
//! | [`Error::Discovery`] / [`Error::CharacteristicNotFound`] | `discover_characteristics` | session aborted |
//! | [`Error::Read`] | `read` | session aborted |
//! | [`Error::Decode`] | payload decoding | session aborted, no `updated` event |
//! | [`Error::Disconnect`] | `disconnect` | logged only |
//! | [`Error::NoAdapter`] / [`Error::Bluetooth`] | adapter setup, scanning | returned to the caller |

use thiserror::Error;
use uuid::Uuid;

use waveplus_types::{ParseError, PeripheralId};

/// Errors that can occur while talking to Wave Plus devices.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error from the platform stack.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// No Bluetooth adapter is available.
    #[error("No Bluetooth adapter available")]
    NoAdapter,

    /// The adapter has never reported this peripheral.
    #[error("Unknown peripheral: {0}")]
    UnknownPeripheral(PeripheralId),

    /// Connecting to the peripheral failed.
    #[error("Connection to {device_id} failed: {reason}")]
    Connect {
        /// Peripheral that was being connected.
        device_id: PeripheralId,
        /// Adapter-provided reason.
        reason: String,
    },

    /// Characteristic discovery failed.
    #[error("Characteristic discovery on {device_id} failed: {reason}")]
    Discovery {
        /// Peripheral being queried.
        device_id: PeripheralId,
        /// Adapter-provided reason.
        reason: String,
    },

    /// Discovery succeeded but did not return the wanted characteristic.
    #[error("Characteristic {uuid} not found on {device_id}")]
    CharacteristicNotFound {
        /// Peripheral being queried.
        device_id: PeripheralId,
        /// Characteristic that was requested.
        uuid: Uuid,
    },

    /// Reading the characteristic value failed.
    #[error("Read from {device_id} failed: {reason}")]
    Read {
        /// Peripheral being read.
        device_id: PeripheralId,
        /// Adapter-provided reason.
        reason: String,
    },

    /// Disconnecting failed.
    #[error("Disconnect from {device_id} failed: {reason}")]
    Disconnect {
        /// Peripheral being disconnected.
        device_id: PeripheralId,
        /// Adapter-provided reason.
        reason: String,
    },

    /// The characteristic payload could not be decoded.
    #[error("Decode failed: {0}")]
    Decode(#[from] ParseError),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a connection error.
    pub fn connect(device_id: &PeripheralId, reason: impl ToString) -> Self {
        Self::Connect {
            device_id: device_id.clone(),
            reason: reason.to_string(),
        }
    }

    /// Create a discovery error.
    pub fn discovery(device_id: &PeripheralId, reason: impl ToString) -> Self {
        Self::Discovery {
            device_id: device_id.clone(),
            reason: reason.to_string(),
        }
    }

    /// Create a read error.
    pub fn read(device_id: &PeripheralId, reason: impl ToString) -> Self {
        Self::Read {
            device_id: device_id.clone(),
            reason: reason.to_string(),
        }
    }

    /// Create a disconnect error.
    pub fn disconnect(device_id: &PeripheralId, reason: impl ToString) -> Self {
        Self::Disconnect {
            device_id: device_id.clone(),
            reason: reason.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Result type alias using waveplus-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let id = PeripheralId::new("aa:bb");

        let err = Error::connect(&id, "le-connection-abort-by-local");
        assert_eq!(
            err.to_string(),
            "Connection to aa:bb failed: le-connection-abort-by-local"
        );

        let err = Error::CharacteristicNotFound {
            device_id: id.clone(),
            uuid: waveplus_types::uuids::SENSOR_DATA,
        };
        assert!(err.to_string().contains("b42e2a68-ade7-11e4-89d3-123b93f75cba"));

        let err = Error::NoAdapter;
        assert_eq!(err.to_string(), "No Bluetooth adapter available");

        let err = Error::invalid_config("watchdog must be non-zero");
        assert!(err.to_string().contains("watchdog"));
    }

    #[test]
    fn test_parse_error_conversion() {
        let err: Error = ParseError::InvalidLength {
            expected: 20,
            actual: 3,
        }
        .into();
        assert!(matches!(err, Error::Decode(_)));
        assert!(err.to_string().contains("got 3"));
    }

    #[test]
    fn test_btleplug_error_conversion() {
        fn _assert_from_impl<T: From<btleplug::Error>>() {}
        _assert_from_impl::<Error>();

        let err: Error = btleplug::Error::NotConnected.into();
        assert!(err.to_string().starts_with("Bluetooth error"));
    }
}
