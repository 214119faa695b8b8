//! Guarded connect → discover → read → disconnect sessions.
//!
//! [`ReadSession::try_start`] locks the device's [`ReadGuard`], arms a
//! watchdog and spawns the protocol as a tokio task. The session walks
//! through the [`SessionState`]s, decodes the payload and publishes an
//! `updated` event. Whatever happens, the device ends up disconnected and
//! its guard released:
//!
//! - a failed step is logged, followed by a best-effort disconnect;
//! - if the watchdog fires first the in-flight step is dropped, nothing is
//!   published, and the watchdog disconnects before releasing the guard;
//! - a session whose token went stale never touches the guard again.
//!
//! Every disconnect is bounded by [`DISCONNECT_TIMEOUT`] (or the watchdog
//! budget, if shorter). The guard is released when it elapses, even if the
//! adapter never answered.
//!
//! [`ReadGuard`]: crate::guard::ReadGuard

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use waveplus_types::uuids::{SENSOR_DATA, SENSOR_DATA_CHARACTERISTICS, SENSOR_DATA_SERVICES};
use waveplus_types::{PeripheralId, SensorReading};

use crate::error::Error;
use crate::events::EventBus;
use crate::guard::{SessionState, SessionToken};
use crate::registry::DeviceEntry;
use crate::traits::{SharedAdapter, WaveAdapter};

/// Default time budget for one read session.
pub const DEFAULT_WATCHDOG: Duration = Duration::from_secs(60);

/// Longest wait for the adapter to confirm a disconnect.
pub const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How a read session ended.
#[derive(Debug)]
pub enum SessionOutcome {
    /// A reading was decoded and published.
    Completed(SensorReading),
    /// A step failed; the session was torn down.
    Failed {
        /// The state the session was in when it failed.
        step: SessionState,
        /// What went wrong.
        error: Error,
    },
    /// The watchdog terminated the session.
    TimedOut,
    /// The session lost its guard before it could finish; its result was
    /// discarded.
    Stale,
}

impl SessionOutcome {
    /// Whether the session published a reading.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// The published reading, if any.
    pub fn reading(&self) -> Option<&SensorReading> {
        match self {
            Self::Completed(reading) => Some(reading),
            _ => None,
        }
    }
}

/// Why the protocol stopped early.
enum Abort {
    Failed { step: SessionState, error: Error },
    Stale,
}

impl Abort {
    fn at(step: SessionState) -> impl FnOnce(Error) -> Abort {
        move |error| Abort::Failed { step, error }
    }
}

fn enter(entry: &DeviceEntry, token: &SessionToken, state: SessionState) -> Result<(), Abort> {
    if entry.guard().advance(token, state) {
        debug!(device_id = %entry.device().id, epoch = token.epoch(), %state, "read session step");
        Ok(())
    } else {
        Err(Abort::Stale)
    }
}

async fn disconnect_best_effort(adapter: &dyn WaveAdapter, id: &PeripheralId, limit: Duration) {
    match timeout(limit, adapter.disconnect(id)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(device_id = %id, error = %e, "disconnect failed"),
        Err(_) => warn!(device_id = %id, ?limit, "disconnect timed out"),
    }
}

/// Starts and runs guarded read sessions.
#[derive(Clone)]
pub struct ReadSession {
    adapter: SharedAdapter,
    events: EventBus,
    watchdog: Duration,
}

impl std::fmt::Debug for ReadSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadSession")
            .field("watchdog", &self.watchdog)
            .finish_non_exhaustive()
    }
}

impl ReadSession {
    /// Create a session runner publishing to `events`.
    pub fn new(adapter: SharedAdapter, events: EventBus, watchdog: Duration) -> Self {
        Self {
            adapter,
            events,
            watchdog,
        }
    }

    /// The per-session time budget.
    pub fn watchdog(&self) -> Duration {
        self.watchdog
    }

    fn disconnect_limit(&self) -> Duration {
        DISCONNECT_TIMEOUT.min(self.watchdog)
    }

    /// Start a read session for the device unless one is already in flight.
    ///
    /// Returns immediately. `rssi` is attached to the reading unless the
    /// adapter reports a fresher value when the payload is decoded.
    /// Returns `None` (and does nothing) if the device's guard is locked.
    pub fn try_start(
        &self,
        entry: &Arc<DeviceEntry>,
        rssi: i16,
    ) -> Option<JoinHandle<SessionOutcome>> {
        let Some(token) = entry.guard().try_acquire() else {
            debug!(device_id = %entry.device().id, "read already in flight, skipping");
            return None;
        };
        debug!(
            device_id = %entry.device().id,
            epoch = token.epoch(),
            "read session started"
        );

        self.arm_watchdog(entry, &token);

        let session = self.clone();
        let entry = Arc::clone(entry);
        Some(tokio::spawn(async move {
            session.run(&entry, token, rssi).await
        }))
    }

    fn arm_watchdog(&self, entry: &Arc<DeviceEntry>, token: &SessionToken) {
        let adapter = Arc::clone(&self.adapter);
        let entry = Arc::clone(entry);
        let stopped = token.watchdog_stopped();
        let epoch = token.epoch();
        let budget = self.watchdog;
        let limit = self.disconnect_limit();

        tokio::spawn(async move {
            tokio::select! {
                _ = stopped.cancelled() => {}
                _ = sleep(budget) => {
                    if entry.guard().expire(epoch) {
                        warn!(
                            device_id = %entry.device().id,
                            epoch,
                            ?budget,
                            "read session timed out, forcing disconnect"
                        );
                        disconnect_best_effort(adapter.as_ref(), &entry.device().id, limit).await;
                        entry.guard().release_expired(epoch);
                    }
                }
            }
        });
    }

    async fn run(&self, entry: &DeviceEntry, token: SessionToken, rssi: i16) -> SessionOutcome {
        let aborted = token.aborted();
        let result = tokio::select! {
            biased;
            _ = aborted.cancelled() => {
                debug!(device_id = %entry.device().id, epoch = token.epoch(), "read session abandoned");
                return SessionOutcome::TimedOut;
            }
            result = self.protocol(entry, &token, rssi) => result,
        };

        let device = entry.device();
        let outcome = match result {
            Ok(reading) => {
                if !entry.guard().disarm(&token) {
                    return self.discard(entry, &token);
                }
                info!(device_id = %device.id, serial = device.serial_number, "{reading}");
                self.events.updated(device.clone(), reading);
                SessionOutcome::Completed(reading)
            }
            Err(Abort::Failed { step, error }) => {
                if !entry.guard().disarm(&token) {
                    return self.discard(entry, &token);
                }
                warn!(
                    device_id = %device.id,
                    serial = device.serial_number,
                    %step,
                    error = %error,
                    "read session failed"
                );
                SessionOutcome::Failed { step, error }
            }
            Err(Abort::Stale) => return self.discard(entry, &token),
        };

        self.teardown(entry, &token).await;
        outcome
    }

    async fn protocol(
        &self,
        entry: &DeviceEntry,
        token: &SessionToken,
        rssi: i16,
    ) -> Result<SensorReading, Abort> {
        let adapter = self.adapter.as_ref();
        let id = &entry.device().id;

        enter(entry, token, SessionState::Connecting)?;
        adapter
            .connect(id)
            .await
            .map_err(Abort::at(SessionState::Connecting))?;

        enter(entry, token, SessionState::DiscoveringCharacteristic)?;
        let handle = adapter
            .discover_characteristics(id, SENSOR_DATA_SERVICES, SENSOR_DATA_CHARACTERISTICS)
            .await
            .map_err(Abort::at(SessionState::DiscoveringCharacteristic))?
            .into_iter()
            .find(|handle| handle.uuid == SENSOR_DATA)
            .ok_or_else(|| Abort::Failed {
                step: SessionState::DiscoveringCharacteristic,
                error: Error::CharacteristicNotFound {
                    device_id: id.clone(),
                    uuid: SENSOR_DATA,
                },
            })?;

        enter(entry, token, SessionState::Reading)?;
        let payload = adapter
            .read(id, &handle)
            .await
            .map_err(Abort::at(SessionState::Reading))?;

        enter(entry, token, SessionState::Decoding)?;
        let reading = SensorReading::from_bytes(&payload)
            .map_err(|e| Abort::at(SessionState::Decoding)(e.into()))?;
        let rssi = adapter.latest_rssi(id).await.unwrap_or(rssi);

        Ok(reading.with_rssi(rssi))
    }

    async fn teardown(&self, entry: &DeviceEntry, token: &SessionToken) {
        let guard = entry.guard();
        guard.advance(token, SessionState::Disconnecting);
        disconnect_best_effort(
            self.adapter.as_ref(),
            &entry.device().id,
            self.disconnect_limit(),
        )
        .await;
        guard.release(token);
        debug!(device_id = %entry.device().id, epoch = token.epoch(), "read session finished");
    }

    fn discard(&self, entry: &DeviceEntry, token: &SessionToken) -> SessionOutcome {
        debug!(
            device_id = %entry.device().id,
            epoch = token.epoch(),
            "discarding result of stale read session"
        );
        SessionOutcome::Stale
    }
}
