//! Platform-agnostic types for Airthings Wave Plus sensors.
//!
//! This crate holds the wire formats and data model shared by the BLE
//! engine (waveplus-core) and anything else that wants to decode Wave Plus
//! data without pulling in a Bluetooth stack.
//!
//! # Features
//!
//! - Manufacturer data decoding (company id, serial number, product id)
//! - Sensor values decoding (radon, temperature, humidity, pressure, CO2, VOC)
//! - Device and advertisement records
//! - UUID and company id constants
//!
//! # Example
//!
//! ```
//! use waveplus_types::{ManufacturerData, SensorReading};
//!
//! let adv = [0x34, 0x03, 0x39, 0x30, 0x00, 0x00, 0x01, 0x00];
//! let info = ManufacturerData::from_bytes(&adv).unwrap();
//! assert!(info.is_wave_plus());
//! assert_eq!(info.serial_number, 12345);
//!
//! assert!(SensorReading::from_bytes(&[0u8; 3]).is_err());
//! ```

pub mod error;
pub mod types;
pub mod uuid;

pub use error::{ParseError, ParseResult};
pub use types::{
    Advertisement, CharacteristicHandle, Device, MANUFACTURER_DATA_BYTES, ManufacturerData,
    PeripheralId, SENSOR_DATA_BYTES, SensorReading,
};
pub use crate::uuid as uuids;


/// Property-based tests for the Wave Plus decoders.
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Decoding random bytes never panics.
        #[test]
        fn sensor_reading_never_panics(data: Vec<u8>) {
            let _ = SensorReading::from_bytes(&data);
        }

        /// Only payloads of the exact size decode.
        #[test]
        fn sensor_reading_requires_exact_length(data in proptest::collection::vec(any::<u8>(), 0..64)) {
            let result = SensorReading::from_bytes(&data);
            prop_assert_eq!(result.is_ok(), data.len() == SENSOR_DATA_BYTES);
        }

        /// Derived values stay within the ranges the raw fields allow.
        #[test]
        fn sensor_reading_ranges(data in proptest::collection::vec(any::<u8>(), SENSOR_DATA_BYTES)) {
            let reading = SensorReading::from_bytes(&data).unwrap();
            prop_assert!((0.0..=127.5).contains(&reading.humidity));
            prop_assert!((0.0..=655.35).contains(&reading.temperature));
            prop_assert!((0.0..=1310.7).contains(&reading.pressure));
            prop_assert_eq!(reading.humidity, f64::from(data[1]) / 2.0);
        }

        /// Serial numbers survive the manufacturer data layout.
        #[test]
        fn manufacturer_serial_survives(serial: u32, product: u16) {
            let mut data = Vec::with_capacity(MANUFACTURER_DATA_BYTES);
            data.extend_from_slice(&uuids::COMPANY_ID.to_le_bytes());
            data.extend_from_slice(&serial.to_le_bytes());
            data.extend_from_slice(&product.to_le_bytes());

            let info = ManufacturerData::from_bytes(&data).unwrap();
            prop_assert!(info.is_wave_plus());
            prop_assert_eq!(info.serial_number, serial);
            prop_assert_eq!(info.product_id, product);
        }

        /// Short manufacturer buffers are always rejected.
        #[test]
        fn manufacturer_short_rejected(data in proptest::collection::vec(any::<u8>(), 0..MANUFACTURER_DATA_BYTES)) {
            prop_assert!(ManufacturerData::from_bytes(&data).is_err());
        }
    }
}
