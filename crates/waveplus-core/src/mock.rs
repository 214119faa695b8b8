//! Mock adapter implementation for testing.
//!
//! This module provides a scriptable [`WaveAdapter`] so the scanner and read
//! sessions can be exercised without Bluetooth hardware.
//!
//! # Features
//!
//! - **Failure injection**: fail connect, discovery, read or disconnect
//! - **Latency simulation**: delay connect, read and disconnect to trip the
//!   watchdog or the disconnect timeout
//! - **Call log**: every adapter call is recorded in order
//! - **Advertisement feed**: push advertisements into the discovery stream

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use waveplus_types::uuids::{COMPANY_ID, SENSOR_DATA};
use waveplus_types::{Advertisement, CharacteristicHandle, PeripheralId};

use crate::error::{Error, Result};
use crate::traits::{AdapterEvent, AdvertisementStream, WaveAdapter};

/// Service UUID the mock reports for the sensor characteristic.
pub const MOCK_SERVICE: Uuid = uuid::uuid!("b42e1c08-ade7-11e4-89d3-123b93f75cba");

/// A call made against the mock adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `start_scan`
    StartScan,
    /// `stop_scan`
    StopScan,
    /// `connect`
    Connect(PeripheralId),
    /// `discover_characteristics`
    Discover(PeripheralId),
    /// `read`
    Read(PeripheralId),
    /// `disconnect`
    Disconnect(PeripheralId),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A mock wireless adapter for testing.
///
/// # Example
///
/// ```
/// use waveplus_core::{MockAdapter, WaveAdapter};
/// use waveplus_types::PeripheralId;
///
/// #[tokio::main]
/// async fn main() {
///     let adapter = MockAdapter::new();
///     let id = PeripheralId::new("dev-1");
///     adapter.connect(&id).await.unwrap();
///     assert_eq!(adapter.connect_count(&id).await, 1);
/// }
/// ```
pub struct MockAdapter {
    payload: RwLock<Vec<u8>>,
    rssi: RwLock<Option<i16>>,
    /// Simulated connect latency in milliseconds (0 = no delay).
    connect_latency_ms: AtomicU64,
    /// Simulated read latency in milliseconds (0 = no delay).
    read_latency_ms: AtomicU64,
    /// Simulated disconnect latency in milliseconds (0 = no delay).
    disconnect_latency_ms: AtomicU64,
    fail_connect: AtomicBool,
    fail_discovery: AtomicBool,
    hide_characteristic: AtomicBool,
    fail_read: AtomicBool,
    fail_disconnect: AtomicBool,
    scanning: AtomicBool,
    calls: RwLock<Vec<MockCall>>,
    event_tx: Mutex<Option<mpsc::UnboundedSender<AdapterEvent>>>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<AdapterEvent>>>,
}

impl std::fmt::Debug for MockAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockAdapter")
            .field("scanning", &self.scanning.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl MockAdapter {
    /// Create a mock adapter that succeeds at everything.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            payload: RwLock::new(Self::default_payload()),
            rssi: RwLock::new(None),
            connect_latency_ms: AtomicU64::new(0),
            read_latency_ms: AtomicU64::new(0),
            disconnect_latency_ms: AtomicU64::new(0),
            fail_connect: AtomicBool::new(false),
            fail_discovery: AtomicBool::new(false),
            hide_characteristic: AtomicBool::new(false),
            fail_read: AtomicBool::new(false),
            fail_disconnect: AtomicBool::new(false),
            scanning: AtomicBool::new(false),
            calls: RwLock::new(Vec::new()),
            event_tx: Mutex::new(Some(tx)),
            event_rx: Mutex::new(Some(rx)),
        }
    }

    /// Sensor payload returned by default: radon 10/20 Bq/m³, 21.5 °C,
    /// 45 %RH, 1013 hPa, 800 ppm CO2, 150 ppb VOC.
    pub fn default_payload() -> Vec<u8> {
        vec![
            0x01, 0x5A, 0x00, 0x00, // version, humidity, unused
            0x0A, 0x00, 0x14, 0x00, // radon short/long term
            0x66, 0x08, 0xDA, 0xC5, // temperature, pressure
            0x20, 0x03, 0x96, 0x00, // CO2, VOC
            0x00, 0x00, 0x00, 0x00, // unused
        ]
    }

    /// Build an advertisement carrying Wave Plus manufacturer data.
    pub fn wave_plus_advertisement(id: &str, serial_number: u32, rssi: i16) -> Advertisement {
        Self::advertisement_with_company(id, COMPANY_ID, serial_number, rssi)
    }

    /// Build an advertisement with arbitrary company id.
    pub fn advertisement_with_company(
        id: &str,
        company_id: u16,
        serial_number: u32,
        rssi: i16,
    ) -> Advertisement {
        let mut data = Vec::with_capacity(8);
        data.extend_from_slice(&company_id.to_le_bytes());
        data.extend_from_slice(&serial_number.to_le_bytes());
        data.extend_from_slice(&0x0001u16.to_le_bytes());
        Advertisement {
            id: PeripheralId::new(id),
            address: format!("MOCK-{id}"),
            connectable: true,
            manufacturer_data: Some(data),
            rssi,
        }
    }

    /// Set the sensor payload returned by `read`.
    pub async fn set_payload(&self, payload: Vec<u8>) {
        *self.payload.write().await = payload;
    }

    /// Set the signal strength returned by `latest_rssi`.
    pub async fn set_rssi(&self, rssi: Option<i16>) {
        *self.rssi.write().await = rssi;
    }

    /// Set simulated connect latency.
    pub fn set_connect_latency(&self, latency: Duration) {
        self.connect_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Set simulated read latency.
    pub fn set_read_latency(&self, latency: Duration) {
        self.read_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Set simulated disconnect latency.
    pub fn set_disconnect_latency(&self, latency: Duration) {
        self.disconnect_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Make `connect` fail.
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::Relaxed);
    }

    /// Make `discover_characteristics` fail.
    pub fn set_fail_discovery(&self, fail: bool) {
        self.fail_discovery.store(fail, Ordering::Relaxed);
    }

    /// Make `discover_characteristics` succeed with no characteristics.
    pub fn set_hide_characteristic(&self, hide: bool) {
        self.hide_characteristic.store(hide, Ordering::Relaxed);
    }

    /// Make `read` fail.
    pub fn set_fail_read(&self, fail: bool) {
        self.fail_read.store(fail, Ordering::Relaxed);
    }

    /// Make `disconnect` fail.
    pub fn set_fail_disconnect(&self, fail: bool) {
        self.fail_disconnect.store(fail, Ordering::Relaxed);
    }

    /// Whether a scan is running.
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Relaxed)
    }

    /// Feed an event into the discovery stream.
    pub fn push(&self, event: AdapterEvent) {
        if let Some(tx) = lock(&self.event_tx).as_ref() {
            let _ = tx.send(event);
        }
    }

    /// Feed an advertisement into the discovery stream.
    pub fn push_advertisement(&self, advertisement: Advertisement) {
        self.push(AdapterEvent::Advertisement(advertisement));
    }

    /// End the discovery stream once queued events are drained.
    pub fn close_stream(&self) {
        lock(&self.event_tx).take();
    }

    /// All calls made so far, in order.
    pub async fn calls(&self) -> Vec<MockCall> {
        self.calls.read().await.clone()
    }

    /// Number of `connect` calls for a peripheral.
    pub async fn connect_count(&self, id: &PeripheralId) -> usize {
        self.count(|call| matches!(call, MockCall::Connect(c) if c == id))
            .await
    }

    /// Number of `disconnect` calls for a peripheral.
    pub async fn disconnect_count(&self, id: &PeripheralId) -> usize {
        self.count(|call| matches!(call, MockCall::Disconnect(c) if c == id))
            .await
    }

    async fn count(&self, predicate: impl Fn(&MockCall) -> bool) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|call| predicate(call))
            .count()
    }

    async fn record(&self, call: MockCall) {
        self.calls.write().await.push(call);
    }

    async fn simulate_latency(latency_ms: &AtomicU64) {
        let latency = latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WaveAdapter for MockAdapter {
    async fn start_scan(&self) -> Result<()> {
        self.record(MockCall::StartScan).await;
        self.scanning.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        self.record(MockCall::StopScan).await;
        self.scanning.store(false, Ordering::Relaxed);
        Ok(())
    }

    async fn advertisements(&self) -> Result<AdvertisementStream> {
        let rx = lock(&self.event_rx)
            .take()
            .ok_or_else(|| Error::invalid_config("mock advertisement stream already taken"))?;

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });
        Ok(stream.boxed())
    }

    async fn connect(&self, id: &PeripheralId) -> Result<()> {
        self.record(MockCall::Connect(id.clone())).await;
        Self::simulate_latency(&self.connect_latency_ms).await;

        if self.fail_connect.load(Ordering::Relaxed) {
            return Err(Error::connect(id, "mock connect failure"));
        }
        Ok(())
    }

    async fn disconnect(&self, id: &PeripheralId) -> Result<()> {
        self.record(MockCall::Disconnect(id.clone())).await;
        Self::simulate_latency(&self.disconnect_latency_ms).await;

        if self.fail_disconnect.load(Ordering::Relaxed) {
            return Err(Error::disconnect(id, "mock disconnect failure"));
        }
        Ok(())
    }

    async fn discover_characteristics(
        &self,
        id: &PeripheralId,
        services: &[Uuid],
        characteristics: &[Uuid],
    ) -> Result<Vec<CharacteristicHandle>> {
        self.record(MockCall::Discover(id.clone())).await;

        if self.fail_discovery.load(Ordering::Relaxed) {
            return Err(Error::discovery(id, "mock discovery failure"));
        }
        if self.hide_characteristic.load(Ordering::Relaxed) {
            return Ok(Vec::new());
        }

        let handle = CharacteristicHandle {
            service: MOCK_SERVICE,
            uuid: SENSOR_DATA,
        };
        let service_ok = services.is_empty() || services.contains(&handle.service);
        let characteristic_ok =
            characteristics.is_empty() || characteristics.contains(&handle.uuid);

        Ok(if service_ok && characteristic_ok {
            vec![handle]
        } else {
            Vec::new()
        })
    }

    async fn read(&self, id: &PeripheralId, handle: &CharacteristicHandle) -> Result<Vec<u8>> {
        self.record(MockCall::Read(id.clone())).await;
        Self::simulate_latency(&self.read_latency_ms).await;

        if self.fail_read.load(Ordering::Relaxed) {
            return Err(Error::read(id, "mock read failure"));
        }
        if handle.uuid != SENSOR_DATA {
            return Err(Error::CharacteristicNotFound {
                device_id: id.clone(),
                uuid: handle.uuid,
            });
        }
        Ok(self.payload.read().await.clone())
    }

    async fn latest_rssi(&self, _id: &PeripheralId) -> Option<i16> {
        *self.rssi.read().await
    }
}

/// Builder for creating mock adapters with custom behavior.
#[derive(Debug, Default)]
pub struct MockAdapterBuilder {
    payload: Option<Vec<u8>>,
    rssi: Option<i16>,
    connect_latency: Duration,
    read_latency: Duration,
    disconnect_latency: Duration,
    fail_connect: bool,
    fail_discovery: bool,
    hide_characteristic: bool,
    fail_read: bool,
    fail_disconnect: bool,
}

impl MockAdapterBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sensor payload.
    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Set the signal strength reported at read time.
    pub fn rssi(mut self, rssi: i16) -> Self {
        self.rssi = Some(rssi);
        self
    }

    /// Set simulated connect latency.
    pub fn connect_latency(mut self, latency: Duration) -> Self {
        self.connect_latency = latency;
        self
    }

    /// Set simulated read latency.
    pub fn read_latency(mut self, latency: Duration) -> Self {
        self.read_latency = latency;
        self
    }

    /// Set simulated disconnect latency.
    pub fn disconnect_latency(mut self, latency: Duration) -> Self {
        self.disconnect_latency = latency;
        self
    }

    /// Make `connect` fail.
    pub fn fail_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Make `discover_characteristics` fail.
    pub fn fail_discovery(mut self) -> Self {
        self.fail_discovery = true;
        self
    }

    /// Make discovery return no characteristics.
    pub fn hide_characteristic(mut self) -> Self {
        self.hide_characteristic = true;
        self
    }

    /// Make `read` fail.
    pub fn fail_read(mut self) -> Self {
        self.fail_read = true;
        self
    }

    /// Make `disconnect` fail.
    pub fn fail_disconnect(mut self) -> Self {
        self.fail_disconnect = true;
        self
    }

    /// Build the mock adapter.
    pub fn build(self) -> MockAdapter {
        let mut adapter = MockAdapter::new();
        if let Some(payload) = self.payload {
            adapter.payload = RwLock::new(payload);
        }
        adapter.rssi = RwLock::new(self.rssi);
        adapter.set_connect_latency(self.connect_latency);
        adapter.set_read_latency(self.read_latency);
        adapter.set_disconnect_latency(self.disconnect_latency);
        adapter.set_fail_connect(self.fail_connect);
        adapter.set_fail_discovery(self.fail_discovery);
        adapter.set_hide_characteristic(self.hide_characteristic);
        adapter.set_fail_read(self.fail_read);
        adapter.set_fail_disconnect(self.fail_disconnect);
        adapter
    }
}
