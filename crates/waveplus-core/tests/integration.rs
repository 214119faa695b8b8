//! End-to-end tests driving the scanner over the mock adapter.
//!
//! Advertisements are pushed into the mock's discovery stream while
//! `Scanner::run` consumes it, the same way a real adapter would feed it.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use waveplus_core::{
    AdapterEvent, DeviceEvent, EventReceiver, MockAdapter, MockAdapterBuilder, PeripheralId,
    Result, Scanner, ScannerConfig,
};

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

struct Harness {
    adapter: Arc<MockAdapter>,
    events: EventReceiver,
    cancel: CancellationToken,
    scan: JoinHandle<Result<Scanner>>,
}

impl Harness {
    fn start(adapter: MockAdapter, config: ScannerConfig) -> Self {
        let adapter = Arc::new(adapter);
        let mut scanner = Scanner::new(adapter.clone(), config).unwrap();
        let events = scanner.subscribe();
        let cancel = CancellationToken::new();

        let scan = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                scanner.run(cancel).await?;
                Ok::<_, waveplus_core::Error>(scanner)
            }
        });

        Self {
            adapter,
            events,
            cancel,
            scan,
        }
    }

    fn advertise(&self, id: &str, serial: u32, rssi: i16) {
        self.adapter
            .push_advertisement(MockAdapter::wave_plus_advertisement(id, serial, rssi));
    }

    async fn next_event(&mut self) -> DeviceEvent {
        timeout(EVENT_TIMEOUT, self.events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    async fn stop(self) -> Scanner {
        self.cancel.cancel();
        self.scan.await.unwrap().unwrap()
    }
}

#[tokio::test]
async fn test_found_then_updated_end_to_end() {
    let mut harness = Harness::start(
        MockAdapterBuilder::new().rssi(-58).build(),
        ScannerConfig::default(),
    );

    harness.advertise("dev-1", 12345, -60);

    match harness.next_event().await {
        DeviceEvent::Found { device } => {
            assert_eq!(device.serial_number, 12345);
            assert_eq!(device.id, PeripheralId::new("dev-1"));
            assert_eq!(device.address, "MOCK-dev-1");
        }
        other => panic!("expected found, got {other:?}"),
    }
    match harness.next_event().await {
        DeviceEvent::Updated {
            device, reading, ..
        } => {
            assert_eq!(device.serial_number, 12345);
            assert_eq!(reading.rssi, -58);
            assert_eq!(reading.humidity, 45.0);
            assert_eq!(reading.radon_short_term_avg, 10);
            assert_eq!(reading.radon_long_term_avg, 20);
            assert_eq!(reading.temperature, 21.5);
            assert_eq!(reading.pressure, 1013.0);
            assert_eq!(reading.co2, 800.0);
            assert_eq!(reading.voc, 150.0);
        }
        other => panic!("expected updated, got {other:?}"),
    }

    let scanner = harness.stop().await;
    assert_eq!(scanner.registry().len(), 1);
}

#[tokio::test]
async fn test_duplicate_advertisements_register_once() {
    let mut harness = Harness::start(
        MockAdapterBuilder::new()
            .read_latency(Duration::from_millis(50))
            .build(),
        ScannerConfig::default(),
    );

    for _ in 0..10 {
        harness.advertise("dev-1", 12345, -60);
    }
    harness.advertise("dev-2", 777, -70);

    let mut found = Vec::new();
    let mut updated = 0;
    while updated < 2 {
        match harness.next_event().await {
            DeviceEvent::Found { device } => found.push(device.serial_number),
            DeviceEvent::Updated { .. } => updated += 1,
        }
    }
    found.sort_unstable();
    assert_eq!(found, vec![777, 12345]);

    let adapter = harness.adapter.clone();
    let scanner = harness.stop().await;
    assert_eq!(scanner.registry().len(), 2);
    // The guard held for the whole burst.
    assert_eq!(adapter.connect_count(&PeripheralId::new("dev-1")).await, 1);
}

#[tokio::test]
async fn test_serial_filter_end_to_end() {
    let mut harness = Harness::start(
        MockAdapter::new(),
        ScannerConfig::new().serial_filter(Some(12345)),
    );

    harness.advertise("other", 99999, -60);
    harness.advertise("wanted", 12345, -60);

    match harness.next_event().await {
        DeviceEvent::Found { device } => assert_eq!(device.serial_number, 12345),
        other => panic!("expected found, got {other:?}"),
    }
    assert!(matches!(
        harness.next_event().await,
        DeviceEvent::Updated { .. }
    ));

    let adapter = harness.adapter.clone();
    let scanner = harness.stop().await;
    assert!(!scanner.registry().contains(&PeripheralId::new("other")));
    assert_eq!(adapter.connect_count(&PeripheralId::new("other")).await, 0);
}

#[tokio::test]
async fn test_adapter_warning_does_not_stop_scanning() {
    let mut harness = Harness::start(MockAdapter::new(), ScannerConfig::default());

    harness
        .adapter
        .push(AdapterEvent::Warning("controller reset".to_string()));
    harness.advertise("dev-1", 12345, -60);

    assert!(matches!(
        harness.next_event().await,
        DeviceEvent::Found { .. }
    ));
    harness.stop().await;
}

#[tokio::test]
async fn test_failed_read_recovers_on_next_advertisement() {
    let mut harness = Harness::start(
        MockAdapterBuilder::new().fail_read().build(),
        ScannerConfig::default(),
    );
    let id = PeripheralId::new("dev-1");

    harness.advertise("dev-1", 12345, -60);
    assert!(matches!(
        harness.next_event().await,
        DeviceEvent::Found { .. }
    ));

    // Wait for the failed session to disconnect and release its guard.
    timeout(EVENT_TIMEOUT, async {
        while harness.adapter.disconnect_count(&id).await == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    harness.adapter.set_fail_read(false);
    harness.advertise("dev-1", 12345, -61);
    match harness.next_event().await {
        DeviceEvent::Updated { reading, .. } => assert_eq!(reading.rssi, -61),
        other => panic!("expected updated, got {other:?}"),
    }
    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_watchdog_recovers_hung_device() {
    let mut harness = Harness::start(
        MockAdapterBuilder::new()
            .connect_latency(Duration::from_secs(600))
            .build(),
        ScannerConfig::new().watchdog(Duration::from_secs(60)),
    );
    let id = PeripheralId::new("dev-1");

    harness.advertise("dev-1", 12345, -60);
    assert!(matches!(
        harness.next_event().await,
        DeviceEvent::Found { .. }
    ));

    // Past the budget the watchdog disconnects and frees the device.
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(harness.adapter.disconnect_count(&id).await, 1);
    assert!(harness.events.try_recv().is_err());

    harness.adapter.set_connect_latency(Duration::ZERO);
    harness.advertise("dev-1", 12345, -60);
    assert!(matches!(
        harness.next_event().await,
        DeviceEvent::Updated { .. }
    ));
    assert_eq!(harness.adapter.connect_count(&id).await, 2);
    harness.stop().await;
}

#[tokio::test]
async fn test_run_ends_with_stream() {
    let adapter = Arc::new(MockAdapter::new());
    let mut scanner = Scanner::new(adapter.clone(), ScannerConfig::default()).unwrap();

    adapter.push_advertisement(MockAdapter::wave_plus_advertisement("dev-1", 1, -60));
    adapter.close_stream();

    timeout(EVENT_TIMEOUT, scanner.run(CancellationToken::new()))
        .await
        .unwrap()
        .unwrap();
    assert!(!adapter.is_scanning());
    assert_eq!(scanner.registry().len(), 1);
}

#[tokio::test]
async fn test_stream_can_only_be_taken_once() {
    let adapter = Arc::new(MockAdapter::new());
    let mut first = Scanner::new(adapter.clone(), ScannerConfig::default()).unwrap();
    let mut second = Scanner::new(adapter.clone(), ScannerConfig::default()).unwrap();

    adapter.close_stream();
    first.run(CancellationToken::new()).await.unwrap();
    assert!(second.run(CancellationToken::new()).await.is_err());
}
