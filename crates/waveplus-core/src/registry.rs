//! Registry of discovered devices.
//!
//! Each registered device gets one [`DeviceEntry`] holding the immutable
//! [`Device`] record together with its [`ReadGuard`]. Entries live for the
//! lifetime of the registry.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use waveplus_types::{Device, PeripheralId};

use crate::guard::ReadGuard;

/// A registered device and its read guard.
#[derive(Debug)]
pub struct DeviceEntry {
    device: Device,
    guard: ReadGuard,
}

impl DeviceEntry {
    /// Create an entry with an idle guard.
    pub fn new(device: Device) -> Self {
        Self {
            device,
            guard: ReadGuard::new(),
        }
    }

    /// The device record.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// The device's read guard.
    pub fn guard(&self) -> &ReadGuard {
        &self.guard
    }
}

/// Mapping of peripheral id to registered device.
///
/// Registration is idempotent: the first record for an id wins.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<PeripheralId, Arc<DeviceEntry>>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device.
    ///
    /// Returns `true` if the device was newly inserted, `false` if its id was
    /// already known (the stored record is left unchanged).
    pub fn register(&mut self, device: Device) -> bool {
        if self.devices.contains_key(&device.id) {
            debug!(device_id = %device.id, "device already registered");
            return false;
        }
        self.devices
            .insert(device.id.clone(), Arc::new(DeviceEntry::new(device)));
        true
    }

    /// Look up a device record.
    pub fn lookup(&self, id: &PeripheralId) -> Option<&Device> {
        self.devices.get(id).map(|entry| entry.device())
    }

    /// Look up a device entry, including its guard.
    pub fn entry(&self, id: &PeripheralId) -> Option<&Arc<DeviceEntry>> {
        self.devices.get(id)
    }

    /// Whether the id is registered.
    pub fn contains(&self, id: &PeripheralId) -> bool {
        self.devices.contains_key(id)
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no device is registered.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Iterate over registered devices in no particular order.
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values().map(|entry| entry.device())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    proptest! {
        /// One entry per distinct id, holding the first record seen for it.
        #[test]
        fn first_registration_wins(records in proptest::collection::vec((0u8..8, any::<u32>()), 0..64)) {
            let mut registry = DeviceRegistry::new();
            let mut expected: HashMap<String, u32> = HashMap::new();

            for (id, serial) in records {
                let id = format!("dev-{id}");
                let inserted = registry.register(Device {
                    id: PeripheralId::new(id.clone()),
                    serial_number: serial,
                    address: String::new(),
                    connectable: true,
                });
                prop_assert_eq!(inserted, !expected.contains_key(&id));
                expected.entry(id).or_insert(serial);
            }

            prop_assert_eq!(registry.len(), expected.len());
            for (id, serial) in expected {
                let device = registry.lookup(&PeripheralId::new(id)).unwrap();
                prop_assert_eq!(device.serial_number, serial);
            }
        }
    }
}
