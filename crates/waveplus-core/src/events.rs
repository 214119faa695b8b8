//! Published notifications for discovered devices and new readings.
//!
//! Subscribers receive [`DeviceEvent`]s over a broadcast channel. Only two
//! event kinds exist: `found`, sent once per device when it is first
//! registered, and `updated`, sent after every successful read session.
//! `found` is always sent before any `updated` for the same device.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::broadcast;

use waveplus_types::{Device, SensorReading};

/// Events published to subscribers.
///
/// All events are serializable for logging and IPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceEvent {
    /// A Wave Plus was seen for the first time.
    Found {
        /// The newly registered device.
        device: Device,
    },
    /// A read session produced a new reading.
    Updated {
        /// The device that was read.
        device: Device,
        /// The decoded values.
        reading: SensorReading,
        /// When the reading was decoded.
        #[serde(with = "time::serde::rfc3339")]
        received_at: OffsetDateTime,
    },
}

impl DeviceEvent {
    /// The device this event is about.
    pub fn device(&self) -> &Device {
        match self {
            Self::Found { device } | Self::Updated { device, .. } => device,
        }
    }
}

/// Sender for device events.
pub type EventSender = broadcast::Sender<DeviceEvent>;

/// Receiver for device events.
pub type EventReceiver = broadcast::Receiver<DeviceEvent>;

/// Default broadcast channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

/// Typed publish surface for `found` / `updated` notifications.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: EventSender,
}

impl EventBus {
    /// Create a new event bus.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Publish a `found` event.
    pub fn found(&self, device: Device) {
        self.send(DeviceEvent::Found { device });
    }

    /// Publish an `updated` event stamped with the current time.
    pub fn updated(&self, device: Device, reading: SensorReading) {
        self.send(DeviceEvent::Updated {
            device,
            reading,
            received_at: OffsetDateTime::now_utc(),
        });
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn send(&self, event: DeviceEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
