//! Advertisement filtering and device discovery.
//!
//! The [`Scanner`] consumes the adapter's advertisement stream in arrival
//! order. A Wave Plus advertisement (company id `0x0334`, optionally with a
//! matching serial number) from an unseen peripheral registers the device
//! and publishes `found`. Every advertisement from a registered peripheral
//! then offers a read session, which is a no-op while one is in flight.
//!
//! # Example
//!
//! ```ignore
//! use waveplus_core::{BtleAdapter, Scanner, ScannerConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let adapter = std::sync::Arc::new(BtleAdapter::first().await?);
//! let mut scanner = Scanner::new(adapter, ScannerConfig::new().serial_filter(Some(12345)))?;
//! let mut rx = scanner.subscribe();
//!
//! let cancel = CancellationToken::new();
//! tokio::spawn(async move { scanner.run(cancel).await });
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{event:?}");
//! }
//! ```

use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use waveplus_types::{Advertisement, Device, ManufacturerData};

use crate::error::{Error, Result};
use crate::events::{DEFAULT_EVENT_CAPACITY, EventBus, EventReceiver};
use crate::registry::DeviceRegistry;
use crate::session::{DEFAULT_WATCHDOG, ReadSession, SessionOutcome};
use crate::traits::{AdapterEvent, SharedAdapter};

/// Options for the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerConfig {
    /// Only accept devices with this serial number.
    pub serial_filter: Option<u32>,
    /// Time budget for a single read session.
    pub watchdog: Duration,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            serial_filter: None,
            watchdog: DEFAULT_WATCHDOG,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ScannerConfig {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict discovery to one serial number.
    pub fn serial_filter(mut self, serial: Option<u32>) -> Self {
        self.serial_filter = serial;
        self
    }

    /// Set the read session time budget.
    pub fn watchdog(mut self, watchdog: Duration) -> Self {
        self.watchdog = watchdog;
        self
    }

    /// Set the event channel capacity.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Check that the options are usable.
    pub fn validate(&self) -> Result<()> {
        if self.watchdog.is_zero() {
            return Err(Error::invalid_config("watchdog must be non-zero"));
        }
        if self.event_capacity == 0 {
            return Err(Error::invalid_config("event capacity must be non-zero"));
        }
        Ok(())
    }
}

/// Discovers Wave Plus devices and triggers read sessions.
pub struct Scanner {
    adapter: SharedAdapter,
    config: ScannerConfig,
    registry: DeviceRegistry,
    events: EventBus,
    sessions: ReadSession,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("config", &self.config)
            .field("devices", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl Scanner {
    /// Create a scanner over `adapter`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` fails validation.
    pub fn new(adapter: SharedAdapter, config: ScannerConfig) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new(config.event_capacity);
        let sessions = ReadSession::new(adapter.clone(), events.clone(), config.watchdog);
        Ok(Self {
            adapter,
            config,
            registry: DeviceRegistry::new(),
            events,
            sessions,
        })
    }

    /// The scanner's options.
    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// The event bus `found` and `updated` are published on.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribe to `found` and `updated` events.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Devices registered so far.
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Handle one advertisement.
    ///
    /// Never blocks: a triggered read session runs on its own task, whose
    /// handle is returned.
    pub fn on_advertisement(
        &mut self,
        advertisement: &Advertisement,
    ) -> Option<JoinHandle<SessionOutcome>> {
        if !self.registry.contains(&advertisement.id)
            && let Some(info) = self.qualify(advertisement)
        {
            let device = Device {
                id: advertisement.id.clone(),
                serial_number: info.serial_number,
                address: advertisement.address.clone(),
                connectable: advertisement.connectable,
            };
            info!(
                device_id = %device.id,
                serial = device.serial_number,
                address = %device.address,
                rssi = advertisement.rssi,
                "found Wave Plus"
            );
            self.registry.register(device.clone());
            self.events.found(device);
        }

        let entry = self.registry.entry(&advertisement.id)?;
        self.sessions.try_start(entry, advertisement.rssi)
    }

    fn qualify(&self, advertisement: &Advertisement) -> Option<ManufacturerData> {
        let data = advertisement.manufacturer_data.as_deref()?;
        let info = ManufacturerData::from_bytes(data).ok()?;
        if !info.is_wave_plus() {
            return None;
        }
        if let Some(serial) = self.config.serial_filter
            && info.serial_number != serial
        {
            debug!(
                device_id = %advertisement.id,
                serial = info.serial_number,
                wanted = serial,
                "ignoring Wave Plus with other serial"
            );
            return None;
        }
        Some(info)
    }

    /// Scan until `cancel` fires or the adapter's stream ends.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter cannot provide an advertisement
    /// stream. Failing to start or stop the scan is only logged.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        let mut stream = self.adapter.advertisements().await?;

        match self.adapter.start_scan().await {
            Ok(()) => info!(serial_filter = ?self.config.serial_filter, "scanning for Wave Plus devices"),
            Err(e) => warn!(error = %e, "failed to start scan"),
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("scan cancelled");
                    break;
                }
                event = stream.next() => match event {
                    Some(AdapterEvent::Advertisement(advertisement)) => {
                        self.on_advertisement(&advertisement);
                    }
                    Some(AdapterEvent::Warning(message)) => {
                        warn!(warning = %message, "adapter warning");
                    }
                    None => {
                        debug!("advertisement stream ended");
                        break;
                    }
                },
            }
        }

        if let Err(e) = self.adapter.stop_scan().await {
            warn!(error = %e, "failed to stop scan");
        }
        info!(devices = self.registry.len(), "scan stopped");
        Ok(())
    }
}


#[cfg(test)]
mod proptests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use crate::mock::MockAdapter;
    use proptest::prelude::*;
    use waveplus_types::PeripheralId;

    proptest! {
        /// Only Wave Plus advertisements with the wanted serial register a
        /// device, whatever else arrives.
        #[test]
        fn only_matching_advertisements_register(
            ads in proptest::collection::vec(
                (0u8..6, prop_oneof![Just(0x0334u16), any::<u16>()], 0u32..4, -100i16..0),
                0..48,
            ),
            filter in proptest::option::of(0u32..4),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let _guard = runtime.enter();

            let adapter = Arc::new(MockAdapter::new());
            let mut scanner =
                Scanner::new(adapter, ScannerConfig::new().serial_filter(filter)).unwrap();

            let mut expected = HashSet::new();
            for (id, company, serial, rssi) in ads {
                let id = format!("dev-{id}");
                let adv = MockAdapter::advertisement_with_company(&id, company, serial, rssi);
                let qualifies = company == 0x0334 && filter.is_none_or(|wanted| wanted == serial);
                if qualifies {
                    expected.insert(id);
                }
                scanner.on_advertisement(&adv);
            }

            prop_assert_eq!(scanner.registry().len(), expected.len());
            for id in expected {
                prop_assert!(scanner.registry().contains(&PeripheralId::new(id)));
            }
        }
    }
}
