//! Bluetooth identifiers for Airthings Wave Plus devices.
//!
//! The Wave Plus exposes its current sensor values through a single
//! vendor characteristic. Discovery is done by characteristic UUID alone,
//! without restricting to an enclosing service.

use uuid::{Uuid, uuid};

/// Airthings company identifier carried in BLE manufacturer data.
pub const COMPANY_ID: u16 = 0x0334;

/// Current sensor values characteristic.
pub const SENSOR_DATA: Uuid = uuid!("b42e2a68-ade7-11e4-89d3-123b93f75cba");

/// Service filter used when discovering [`SENSOR_DATA`] (empty: any service).
pub const SENSOR_DATA_SERVICES: &[Uuid] = &[];

/// Characteristic filter used when discovering sensor values.
pub const SENSOR_DATA_CHARACTERISTICS: &[Uuid] = &[SENSOR_DATA];
