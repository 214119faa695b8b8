//! Per-device read guard.
//!
//! A [`ReadGuard`] makes sure at most one read session runs against a device
//! at a time. Acquiring it yields a [`SessionToken`] stamped with a fresh
//! epoch; every later state change must present that token, so a session
//! whose lease was already taken away by the watchdog cannot re-lock the
//! guard, emit a reading, or disconnect a second time.
//!
//! The lease goes through three phases:
//!
//! 1. **armed** - the watchdog may expire it at any time;
//! 2. **disarmed** - the session owns the teardown, or **expired** - the
//!    watchdog aborted the session and owns the teardown;
//! 3. **released** - the guard is idle again.
//!
//! An expired lease keeps the guard locked until the watchdog has finished
//! disconnecting, so a new session never connects under a pending forced
//! disconnect.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

/// Where a read session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No session is running.
    Idle,
    /// The guard was acquired and the watchdog armed.
    Locked,
    /// Waiting for the connection.
    Connecting,
    /// Waiting for characteristic discovery.
    DiscoveringCharacteristic,
    /// Waiting for the characteristic value.
    Reading,
    /// Decoding the payload.
    Decoding,
    /// Tearing the connection down.
    Disconnecting,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Locked => "locked",
            SessionState::Connecting => "connecting",
            SessionState::DiscoveringCharacteristic => "discovering characteristic",
            SessionState::Reading => "reading",
            SessionState::Decoding => "decoding",
            SessionState::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}

/// Proof of ownership of a device's guard for one session.
#[derive(Debug, Clone)]
pub struct SessionToken {
    epoch: u64,
    abort: CancellationToken,
    watchdog: CancellationToken,
}

impl SessionToken {
    /// Epoch of the lease this token belongs to.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Cancelled when the watchdog force-terminates the session.
    pub fn aborted(&self) -> CancellationToken {
        self.abort.clone()
    }

    /// Cancelled when the watchdog is no longer needed.
    pub fn watchdog_stopped(&self) -> CancellationToken {
        self.watchdog.clone()
    }
}

#[derive(Debug)]
struct Lease {
    epoch: u64,
    armed: bool,
    expired: bool,
    abort: CancellationToken,
    watchdog: CancellationToken,
}

#[derive(Debug)]
struct GuardState {
    lease: Option<Lease>,
    state: SessionState,
}

impl GuardState {
    /// The lease with `epoch` exists and still belongs to its session.
    fn holds(&self, epoch: u64) -> bool {
        self.lease
            .as_ref()
            .is_some_and(|lease| lease.epoch == epoch && !lease.expired)
    }
}

/// Mutual-exclusion flag plus watchdog bookkeeping for one device.
#[derive(Debug)]
pub struct ReadGuard {
    inner: Mutex<GuardState>,
    next_epoch: AtomicU64,
}

impl ReadGuard {
    /// Create an idle guard.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(GuardState {
                lease: None,
                state: SessionState::Idle,
            }),
            next_epoch: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GuardState> {
        // Every critical section leaves the state consistent, so a poisoned
        // lock is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Try to lock the guard for a new session.
    ///
    /// Returns `None` when a session is already in flight.
    pub fn try_acquire(&self) -> Option<SessionToken> {
        let mut inner = self.lock();
        if inner.lease.is_some() {
            return None;
        }

        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        let token = SessionToken {
            epoch,
            abort: CancellationToken::new(),
            watchdog: CancellationToken::new(),
        };
        inner.lease = Some(Lease {
            epoch,
            armed: true,
            expired: false,
            abort: token.abort.clone(),
            watchdog: token.watchdog.clone(),
        });
        inner.state = SessionState::Locked;
        Some(token)
    }

    /// Whether a session currently holds the guard.
    pub fn is_locked(&self) -> bool {
        self.lock().lease.is_some()
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Whether `token` still owns the guard.
    pub fn is_current(&self, token: &SessionToken) -> bool {
        self.lock().holds(token.epoch)
    }

    /// Move the session to `state`.
    ///
    /// Returns `false` if the token is stale; nothing changes then.
    pub fn advance(&self, token: &SessionToken, state: SessionState) -> bool {
        let mut inner = self.lock();
        if !inner.holds(token.epoch) {
            return false;
        }
        inner.state = state;
        true
    }

    /// Take the teardown away from the watchdog.
    ///
    /// After this returns `true` the watchdog can no longer expire the lease
    /// and the session is responsible for disconnecting and releasing.
    /// Returns `false` if the watchdog already won.
    pub fn disarm(&self, token: &SessionToken) -> bool {
        let mut inner = self.lock();
        match inner.lease.as_mut() {
            Some(lease) if lease.epoch == token.epoch && !lease.expired => {
                lease.armed = false;
                lease.watchdog.cancel();
                true
            }
            _ => false,
        }
    }

    /// Release the guard at the end of a session.
    ///
    /// Returns `false` if the token is stale, in which case a newer session
    /// (or none) owns the guard and it is left alone.
    pub fn release(&self, token: &SessionToken) -> bool {
        let mut inner = self.lock();
        if !inner.holds(token.epoch) {
            return false;
        }
        if let Some(lease) = inner.lease.take() {
            lease.watchdog.cancel();
        }
        inner.state = SessionState::Idle;
        true
    }

    /// Take the lease with the given epoch away from its session on behalf of
    /// the watchdog.
    ///
    /// Succeeds only while the lease is still armed. The session is signalled
    /// through its abort token and its token goes stale immediately, but the
    /// guard stays locked until [`release_expired`](Self::release_expired).
    pub fn expire(&self, epoch: u64) -> bool {
        let mut inner = self.lock();
        let Some(lease) = inner
            .lease
            .as_mut()
            .filter(|lease| lease.epoch == epoch && lease.armed)
        else {
            return false;
        };
        lease.armed = false;
        lease.expired = true;
        lease.abort.cancel();
        lease.watchdog.cancel();
        inner.state = SessionState::Disconnecting;
        true
    }

    /// Release a lease previously taken by [`expire`](Self::expire).
    pub fn release_expired(&self, epoch: u64) -> bool {
        let mut inner = self.lock();
        let expired = inner
            .lease
            .as_ref()
            .is_some_and(|lease| lease.epoch == epoch && lease.expired);
        if !expired {
            return false;
        }
        inner.lease = None;
        inner.state = SessionState::Idle;
        true
    }
}

impl Default for ReadGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_is_exclusive() {
        let guard = ReadGuard::new();
        assert!(!guard.is_locked());
        assert_eq!(guard.state(), SessionState::Idle);

        let token = guard.try_acquire().unwrap();
        assert!(guard.is_locked());
        assert_eq!(guard.state(), SessionState::Locked);
        assert!(guard.try_acquire().is_none());

        assert!(guard.release(&token));
        assert!(!guard.is_locked());
        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn test_epochs_increase() {
        let guard = ReadGuard::new();
        let first = guard.try_acquire().unwrap();
        guard.release(&first);
        let second = guard.try_acquire().unwrap();
        assert!(second.epoch() > first.epoch());
    }

    #[test]
    fn test_stale_token_is_ignored() {
        let guard = ReadGuard::new();
        let old = guard.try_acquire().unwrap();
        assert!(guard.expire(old.epoch()));
        assert!(old.aborted().is_cancelled());
        assert!(guard.release_expired(old.epoch()));

        let new = guard.try_acquire().unwrap();
        assert!(!guard.is_current(&old));
        assert!(!guard.advance(&old, SessionState::Reading));
        assert!(!guard.disarm(&old));
        assert!(!guard.release(&old));

        // The newer session is untouched.
        assert!(guard.is_current(&new));
        assert_eq!(guard.state(), SessionState::Locked);
    }

    #[test]
    fn test_advance() {
        let guard = ReadGuard::new();
        let token = guard.try_acquire().unwrap();
        assert!(guard.advance(&token, SessionState::Connecting));
        assert_eq!(guard.state(), SessionState::Connecting);
    }

    #[test]
    fn test_disarm_blocks_expiry() {
        let guard = ReadGuard::new();
        let token = guard.try_acquire().unwrap();

        assert!(guard.disarm(&token));
        assert!(token.watchdog_stopped().is_cancelled());
        assert!(!guard.expire(token.epoch()));
        assert!(guard.is_locked());
        assert!(!token.aborted().is_cancelled());

        assert!(guard.release(&token));
        assert!(!guard.is_locked());
    }

    #[test]
    fn test_expired_lease_stays_locked_until_released() {
        let guard = ReadGuard::new();
        let token = guard.try_acquire().unwrap();
        assert!(guard.advance(&token, SessionState::Reading));

        assert!(guard.expire(token.epoch()));
        assert!(guard.is_locked());
        assert_eq!(guard.state(), SessionState::Disconnecting);
        assert!(guard.try_acquire().is_none());

        // The aborted session can no longer act on the lease.
        assert!(!guard.is_current(&token));
        assert!(!guard.advance(&token, SessionState::Decoding));
        assert!(!guard.disarm(&token));
        assert!(!guard.release(&token));
        assert!(!guard.expire(token.epoch()));

        assert!(guard.release_expired(token.epoch()));
        assert!(!guard.is_locked());
        assert_eq!(guard.state(), SessionState::Idle);
        assert!(!guard.release_expired(token.epoch()));
    }

    #[test]
    fn test_release_expired_needs_expiry() {
        let guard = ReadGuard::new();
        let token = guard.try_acquire().unwrap();
        assert!(!guard.release_expired(token.epoch()));
        assert!(guard.is_current(&token));
    }

    #[test]
    fn test_expire_after_release_is_noop() {
        let guard = ReadGuard::new();
        let token = guard.try_acquire().unwrap();
        assert!(guard.release(&token));
        assert!(!guard.expire(token.epoch()));
        assert!(!token.aborted().is_cancelled());
    }

    #[test]
    fn test_release_stops_watchdog() {
        let guard = ReadGuard::new();
        let token = guard.try_acquire().unwrap();
        assert!(!token.watchdog_stopped().is_cancelled());
        guard.release(&token);
        assert!(token.watchdog_stopped().is_cancelled());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(
            SessionState::DiscoveringCharacteristic.to_string(),
            "discovering characteristic"
        );
    }
}
