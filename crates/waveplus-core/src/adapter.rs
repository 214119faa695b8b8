//! [`WaveAdapter`] backed by the platform Bluetooth stack via btleplug.
//!
//! Peripherals are cached as they are discovered so later connect and read
//! calls can be addressed by [`PeripheralId`] alone.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId as BtlePeripheralId};
use futures::StreamExt;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use waveplus_types::uuids::COMPANY_ID;
use waveplus_types::{Advertisement, CharacteristicHandle, PeripheralId};

use crate::error::{Error, Result};
use crate::traits::{AdapterEvent, AdvertisementStream, WaveAdapter};
use crate::util::{display_address, format_peripheral_id};

/// RSSI reported when the stack has no signal strength (HCI "not available").
pub const RSSI_UNAVAILABLE: i16 = 127;

type PeripheralCache = Arc<RwLock<HashMap<PeripheralId, Peripheral>>>;

/// Real Bluetooth adapter.
#[derive(Clone)]
pub struct BtleAdapter {
    adapter: Adapter,
    peripherals: PeripheralCache,
}

impl std::fmt::Debug for BtleAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtleAdapter").finish_non_exhaustive()
    }
}

impl BtleAdapter {
    /// Wrap a btleplug adapter.
    pub fn new(adapter: Adapter) -> Self {
        Self {
            adapter,
            peripherals: Arc::default(),
        }
    }

    /// Use the first Bluetooth adapter on the system.
    pub async fn first() -> Result<Self> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(Error::NoAdapter)?;

        if let Ok(info) = adapter.adapter_info().await {
            info!(adapter = %info, "using Bluetooth adapter");
        }
        Ok(Self::new(adapter))
    }

    async fn peripheral(&self, id: &PeripheralId) -> Result<Peripheral> {
        self.peripherals
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownPeripheral(id.clone()))
    }
}

/// Rebuild the raw manufacturer-specific field from btleplug's map.
///
/// btleplug strips the company id and keys the payload by it; the decoder
/// expects the field as it appeared on air. The Airthings entry wins when
/// several manufacturers are present.
pub fn manufacturer_field(data: &HashMap<u16, Vec<u8>>) -> Option<Vec<u8>> {
    let (company, payload) = data
        .get_key_value(&COMPANY_ID)
        .or_else(|| data.iter().min_by_key(|(company, _)| **company))?;

    let mut field = Vec::with_capacity(payload.len() + 2);
    field.extend_from_slice(&company.to_le_bytes());
    field.extend_from_slice(payload);
    Some(field)
}

async fn advertisement_for(
    adapter: &Adapter,
    cache: &PeripheralCache,
    btle_id: &BtlePeripheralId,
    announced: Option<&HashMap<u16, Vec<u8>>>,
) -> Option<AdapterEvent> {
    let id = format_peripheral_id(btle_id);

    let peripheral = match adapter.peripheral(btle_id).await {
        Ok(peripheral) => peripheral,
        Err(e) => {
            return Some(AdapterEvent::Warning(format!(
                "peripheral {id} vanished before it could be inspected: {e}"
            )));
        }
    };
    let properties = match peripheral.properties().await {
        Ok(Some(properties)) => properties,
        Ok(None) => return None,
        Err(e) => {
            return Some(AdapterEvent::Warning(format!(
                "failed to read properties of {id}: {e}"
            )));
        }
    };
    cache.write().await.insert(id.clone(), peripheral);

    let manufacturer_data = announced
        .and_then(manufacturer_field)
        .or_else(|| manufacturer_field(&properties.manufacturer_data));

    Some(AdapterEvent::Advertisement(Advertisement {
        address: display_address(&properties.address.to_string(), &id),
        id,
        // btleplug does not expose the connectable flag.
        connectable: true,
        manufacturer_data,
        rssi: properties.rssi.unwrap_or(RSSI_UNAVAILABLE),
    }))
}

#[async_trait]
impl WaveAdapter for BtleAdapter {
    async fn start_scan(&self) -> Result<()> {
        debug!("starting BLE scan");
        self.adapter.start_scan(ScanFilter::default()).await?;
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        debug!("stopping BLE scan");
        self.adapter.stop_scan().await?;
        Ok(())
    }

    async fn advertisements(&self) -> Result<AdvertisementStream> {
        let events = self.adapter.events().await?;
        let adapter = self.adapter.clone();
        let cache = Arc::clone(&self.peripherals);

        let stream = events.filter_map(move |event| {
            let adapter = adapter.clone();
            let cache = Arc::clone(&cache);
            async move {
                match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                        advertisement_for(&adapter, &cache, &id, None).await
                    }
                    CentralEvent::ManufacturerDataAdvertisement {
                        id,
                        manufacturer_data,
                    } => advertisement_for(&adapter, &cache, &id, Some(&manufacturer_data)).await,
                    _ => None,
                }
            }
        });
        Ok(stream.boxed())
    }

    async fn connect(&self, id: &PeripheralId) -> Result<()> {
        let peripheral = self.peripheral(id).await?;
        peripheral
            .connect()
            .await
            .map_err(|e| Error::connect(id, e))
    }

    async fn disconnect(&self, id: &PeripheralId) -> Result<()> {
        let peripheral = self.peripheral(id).await?;
        peripheral
            .disconnect()
            .await
            .map_err(|e| Error::disconnect(id, e))
    }

    async fn discover_characteristics(
        &self,
        id: &PeripheralId,
        services: &[Uuid],
        characteristics: &[Uuid],
    ) -> Result<Vec<CharacteristicHandle>> {
        let peripheral = self.peripheral(id).await?;
        peripheral
            .discover_services()
            .await
            .map_err(|e| Error::discovery(id, e))?;

        let found: Vec<CharacteristicHandle> = peripheral
            .characteristics()
            .into_iter()
            .filter(|c| services.is_empty() || services.contains(&c.service_uuid))
            .filter(|c| characteristics.is_empty() || characteristics.contains(&c.uuid))
            .map(|c| CharacteristicHandle {
                service: c.service_uuid,
                uuid: c.uuid,
            })
            .collect();
        debug!(device_id = %id, count = found.len(), "characteristics discovered");
        Ok(found)
    }

    async fn read(&self, id: &PeripheralId, handle: &CharacteristicHandle) -> Result<Vec<u8>> {
        let peripheral = self.peripheral(id).await?;
        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == handle.uuid && c.service_uuid == handle.service)
            .ok_or_else(|| Error::CharacteristicNotFound {
                device_id: id.clone(),
                uuid: handle.uuid,
            })?;

        peripheral
            .read(&characteristic)
            .await
            .map_err(|e| Error::read(id, e))
    }

    async fn latest_rssi(&self, id: &PeripheralId) -> Option<i16> {
        let peripheral = self.peripheral(id).await.ok()?;
        peripheral.properties().await.ok().flatten()?.rssi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manufacturer_field_prefixes_company_id() {
        let mut data = HashMap::new();
        data.insert(COMPANY_ID, vec![0x39, 0x30, 0x00, 0x00, 0x01, 0x00]);

        let field = manufacturer_field(&data).unwrap();
        assert_eq!(field, vec![0x34, 0x03, 0x39, 0x30, 0x00, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn test_manufacturer_field_prefers_airthings() {
        let mut data = HashMap::new();
        data.insert(0x004C, vec![0x02, 0x15]);
        data.insert(COMPANY_ID, vec![0x01, 0x00, 0x00, 0x00]);
        data.insert(0x0001, vec![0xFF]);

        let field = manufacturer_field(&data).unwrap();
        assert_eq!(&field[..2], &COMPANY_ID.to_le_bytes());
    }

    #[test]
    fn test_manufacturer_field_other_vendor() {
        let mut data = HashMap::new();
        data.insert(0x004C, vec![0x02, 0x15]);
        data.insert(0x0006, vec![0x01]);

        // Lowest company id is picked for determinism.
        assert_eq!(manufacturer_field(&data), Some(vec![0x06, 0x00, 0x01]));
    }

    #[test]
    fn test_manufacturer_field_empty() {
        assert_eq!(manufacturer_field(&HashMap::new()), None);
    }
}
