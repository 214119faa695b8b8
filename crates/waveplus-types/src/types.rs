//! Core types for Wave Plus sensor data.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::uuid::COMPANY_ID;

/// Opaque identifier of a BLE peripheral as reported by the adapter.
///
/// On Linux/Windows this is usually derived from the MAC address, on macOS
/// it is a CoreBluetooth UUID. The value is only compared, never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct PeripheralId(String);

impl PeripheralId {
    /// Create a peripheral id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeripheralId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PeripheralId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A discovered Wave Plus device.
///
/// Built from the first qualifying advertisement and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Device {
    /// Adapter-assigned peripheral identifier.
    pub id: PeripheralId,
    /// Serial number decoded from manufacturer data.
    pub serial_number: u32,
    /// Bluetooth address as reported by the adapter.
    pub address: String,
    /// Whether the peripheral advertised itself as connectable.
    pub connectable: bool,
}

/// A single advertisement as delivered by the adapter's discovery stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Peripheral that sent the advertisement.
    pub id: PeripheralId,
    /// Bluetooth address of the peripheral.
    pub address: String,
    /// Whether the peripheral accepts connections.
    pub connectable: bool,
    /// Raw manufacturer data, starting with the little-endian company id.
    pub manufacturer_data: Option<Vec<u8>>,
    /// Received signal strength in dBm.
    pub rssi: i16,
}

/// Number of bytes in a Wave Plus manufacturer data block.
pub const MANUFACTURER_DATA_BYTES: usize = 8;

/// Decoded manufacturer data block.
///
/// Layout (little-endian): `u16 company_id | u32 serial_number | u16 product_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ManufacturerData {
    /// Bluetooth SIG company identifier.
    pub company_id: u16,
    /// Device serial number.
    pub serial_number: u32,
    /// Vendor product identifier.
    pub product_id: u16,
}

impl ManufacturerData {
    /// Decode a manufacturer data buffer.
    ///
    /// Bytes past the first eight are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InsufficientBytes`] if `data` is shorter than
    /// [`MANUFACTURER_DATA_BYTES`].
    #[must_use = "parsing returns a Result that should be handled"]
    pub fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        use bytes::Buf;

        if data.len() < MANUFACTURER_DATA_BYTES {
            return Err(ParseError::InsufficientBytes {
                expected: MANUFACTURER_DATA_BYTES,
                actual: data.len(),
            });
        }

        let mut buf = data;
        Ok(Self {
            company_id: buf.get_u16_le(),
            serial_number: buf.get_u32_le(),
            product_id: buf.get_u16_le(),
        })
    }

    /// Whether the block carries the Airthings company id.
    #[must_use]
    pub fn is_wave_plus(&self) -> bool {
        self.company_id == COMPANY_ID
    }
}

/// Handle to a discovered characteristic, passed back to the adapter to read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicHandle {
    /// UUID of the service that owns the characteristic.
    pub service: uuid::Uuid,
    /// UUID of the characteristic itself.
    pub uuid: uuid::Uuid,
}

/// Exact number of bytes in the sensor values characteristic.
pub const SENSOR_DATA_BYTES: usize = 20;

/// Becquerel per cubic metre in one picocurie per litre.
pub const BQ_M3_PER_PCI_L: f64 = 37.0;

/// One set of sensor values read from a Wave Plus.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorReading {
    /// Signal strength in dBm when the reading was taken.
    pub rssi: i16,
    /// Relative humidity in percent.
    pub humidity: f64,
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    /// Atmospheric pressure in hPa.
    pub pressure: f64,
    /// CO2 concentration in ppm.
    pub co2: f64,
    /// Volatile organic compounds in ppb.
    pub voc: f64,
    /// Short-term (24h) radon average in Bq/m³.
    pub radon_short_term_avg: u16,
    /// Long-term radon average in Bq/m³.
    pub radon_long_term_avg: u16,
}

impl SensorReading {
    /// Decode the sensor values characteristic.
    ///
    /// The byte format (little-endian) is four `u8` followed by eight `u16`:
    /// - byte 0: format version (unused)
    /// - byte 1: humidity (raw, divide by 2 for %)
    /// - bytes 2-3: unused
    /// - bytes 4-5: radon short-term average (Bq/m³)
    /// - bytes 6-7: radon long-term average (Bq/m³)
    /// - bytes 8-9: temperature (divide by 100 for °C)
    /// - bytes 10-11: pressure (divide by 50 for hPa)
    /// - bytes 12-13: CO2 (ppm)
    /// - bytes 14-15: VOC (ppb)
    /// - bytes 16-19: unused
    ///
    /// `rssi` is left at zero; the caller attaches the signal strength with
    /// [`with_rssi`](Self::with_rssi).
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidLength`] unless `data` is exactly
    /// [`SENSOR_DATA_BYTES`] long.
    #[must_use = "parsing returns a Result that should be handled"]
    pub fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        use bytes::Buf;

        if data.len() != SENSOR_DATA_BYTES {
            return Err(ParseError::InvalidLength {
                expected: SENSOR_DATA_BYTES,
                actual: data.len(),
            });
        }

        let mut buf = data;
        let _version = buf.get_u8();
        let humidity_raw = buf.get_u8();
        buf.advance(2);
        let radon_short_term_avg = buf.get_u16_le();
        let radon_long_term_avg = buf.get_u16_le();
        let temperature_raw = buf.get_u16_le();
        let pressure_raw = buf.get_u16_le();
        let co2_raw = buf.get_u16_le();
        let voc_raw = buf.get_u16_le();

        Ok(SensorReading {
            rssi: 0,
            humidity: f64::from(humidity_raw) / 2.0,
            temperature: f64::from(temperature_raw) / 100.0,
            pressure: f64::from(pressure_raw) / 50.0,
            co2: f64::from(co2_raw),
            voc: f64::from(voc_raw),
            radon_short_term_avg,
            radon_long_term_avg,
        })
    }

    /// Return a copy with the given signal strength attached.
    #[must_use]
    pub fn with_rssi(self, rssi: i16) -> Self {
        Self { rssi, ..self }
    }

    /// Short-term radon average in pCi/L.
    #[must_use]
    pub fn radon_short_term_pci_l(&self) -> f64 {
        f64::from(self.radon_short_term_avg) / BQ_M3_PER_PCI_L
    }

    /// Long-term radon average in pCi/L.
    #[must_use]
    pub fn radon_long_term_pci_l(&self) -> f64 {
        f64::from(self.radon_long_term_avg) / BQ_M3_PER_PCI_L
    }
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "radon {}/{} Bq/m³, {:.2} °C, {:.1} %RH, {:.2} hPa, CO2 {} ppm, VOC {} ppb, RSSI {} dBm",
            self.radon_short_term_avg,
            self.radon_long_term_avg,
            self.temperature,
            self.humidity,
            self.pressure,
            self.co2,
            self.voc,
            self.rssi
        )
    }
}
