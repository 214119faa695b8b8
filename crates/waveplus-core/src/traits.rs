//! Trait abstraction over the wireless adapter.
//!
//! The read engine never touches a Bluetooth stack directly. It drives a
//! [`WaveAdapter`], which is implemented by [`BtleAdapter`](crate::adapter::BtleAdapter)
//! for real hardware and by [`MockAdapter`](crate::mock::MockAdapter) for tests.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use uuid::Uuid;

use waveplus_types::{Advertisement, CharacteristicHandle, PeripheralId};

use crate::error::Result;

/// Something the adapter reports while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterEvent {
    /// An advertisement was received.
    Advertisement(Advertisement),
    /// A non-fatal condition the adapter wants logged.
    Warning(String),
}

/// Stream of adapter events, in arrival order.
pub type AdvertisementStream = BoxStream<'static, AdapterEvent>;

/// Shared, type-erased adapter handle.
pub type SharedAdapter = Arc<dyn WaveAdapter>;

/// Operations the read engine needs from a wireless adapter.
///
/// # Example
///
/// ```ignore
/// use waveplus_core::{WaveAdapter, Result};
///
/// async fn poke<A: WaveAdapter + ?Sized>(adapter: &A, id: &PeripheralId) -> Result<()> {
///     adapter.connect(id).await?;
///     adapter.disconnect(id).await
/// }
/// ```
#[async_trait]
pub trait WaveAdapter: Send + Sync {
    // --- Scanning ---

    /// Start scanning, reporting duplicate advertisements.
    async fn start_scan(&self) -> Result<()>;

    /// Stop scanning.
    async fn stop_scan(&self) -> Result<()>;

    /// Subscribe to discovery events.
    async fn advertisements(&self) -> Result<AdvertisementStream>;

    // --- Connection ---

    /// Connect to a peripheral.
    async fn connect(&self, id: &PeripheralId) -> Result<()>;

    /// Disconnect from a peripheral.
    async fn disconnect(&self, id: &PeripheralId) -> Result<()>;

    // --- GATT ---

    /// Discover characteristics, optionally restricted by service and
    /// characteristic UUIDs. An empty filter matches everything.
    async fn discover_characteristics(
        &self,
        id: &PeripheralId,
        services: &[Uuid],
        characteristics: &[Uuid],
    ) -> Result<Vec<CharacteristicHandle>>;

    /// Read a characteristic value.
    async fn read(&self, id: &PeripheralId, handle: &CharacteristicHandle) -> Result<Vec<u8>>;

    /// Latest signal strength known for the peripheral, if the adapter tracks it.
    async fn latest_rssi(&self, _id: &PeripheralId) -> Option<i16> {
        None
    }
}
