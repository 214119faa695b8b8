//! Discovery and guarded read engine for Airthings Wave Plus sensors.
//!
//! This crate listens for Bluetooth Low Energy advertisements, recognises
//! Wave Plus devices by their manufacturer data, and reads each device's
//! sensor characteristic over a short-lived connection.
//!
//! # Features
//!
//! - **Discovery**: filter advertisements by company id and optional serial
//! - **Guarded reads**: at most one connect → read → disconnect session per
//!   device, bounded by a watchdog
//! - **Events**: typed `found` / `updated` notifications over a broadcast
//!   channel
//! - **Testable**: every Bluetooth call goes through the [`WaveAdapter`]
//!   trait, with a scriptable [`MockAdapter`]
//!
//! # Platform Differences
//!
//! - **macOS**: peripherals are identified by a CoreBluetooth UUID and the
//!   MAC address is hidden, so the device address falls back to that id.
//! - **Linux/Windows**: peripherals are identified by their Bluetooth
//!   address.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tokio_util::sync::CancellationToken;
//! use waveplus_core::{BtleAdapter, DeviceEvent, Scanner, ScannerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = Arc::new(BtleAdapter::first().await?);
//!     let mut scanner = Scanner::new(adapter, ScannerConfig::default())?;
//!     let mut events = scanner.subscribe();
//!
//!     let cancel = CancellationToken::new();
//!     tokio::spawn(async move { scanner.run(cancel).await });
//!
//!     while let Ok(event) = events.recv().await {
//!         if let DeviceEvent::Updated { device, reading, .. } = event {
//!             println!("{}: {reading}", device.serial_number);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod error;
pub mod events;
pub mod guard;
pub mod mock;
pub mod registry;
pub mod scan;
pub mod session;
pub mod traits;
pub mod util;

pub use waveplus_types::{types, uuids};

// Core exports
pub use adapter::BtleAdapter;
pub use error::{Error, Result};
pub use events::{DeviceEvent, EventBus, EventReceiver, EventSender};
pub use guard::{ReadGuard, SessionState, SessionToken};
pub use mock::{MockAdapter, MockAdapterBuilder, MockCall};
pub use registry::{DeviceEntry, DeviceRegistry};
pub use scan::{Scanner, ScannerConfig};
pub use session::{DEFAULT_WATCHDOG, DISCONNECT_TIMEOUT, ReadSession, SessionOutcome};
pub use traits::{AdapterEvent, AdvertisementStream, SharedAdapter, WaveAdapter};

pub use waveplus_types::{
    Advertisement, CharacteristicHandle, Device, ManufacturerData, ParseError, PeripheralId,
    SensorReading,
};
