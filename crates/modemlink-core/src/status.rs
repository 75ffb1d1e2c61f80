//! Shared session status store.
//!
//! The notification router is the single writer; profiles, the bring-up
//! sequencer, and application code read. Registration is additionally kept
//! in an atomic so the hot-path check in the sequencer's wait loop never
//! takes a lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::types::{
    BringupPhase, ConnectionState, GnssFix, RegistrationStatus, SignalQuality, SocketSession,
};

/// Live status of a modem session.
#[derive(Debug)]
pub struct ModemStatus {
    registration: RwLock<RegistrationStatus>,
    registered: AtomicBool,
    connection: RwLock<ConnectionState>,
    phase: RwLock<BringupPhase>,
    signal: RwLock<Option<SignalQuality>>,
    fix: RwLock<Option<GnssFix>>,
    sockets: RwLock<Vec<SocketSession>>,
    last_fault: RwLock<Option<String>>,
    changed: Notify,
}

impl Default for ModemStatus {
    fn default() -> Self {
        Self {
            registration: RwLock::new(RegistrationStatus::NotRegistered),
            registered: AtomicBool::new(false),
            connection: RwLock::new(ConnectionState::Disconnected),
            phase: RwLock::new(BringupPhase::Handshaking),
            signal: RwLock::new(None),
            fix: RwLock::new(None),
            sockets: RwLock::new(Vec::new()),
            last_fault: RwLock::new(None),
            changed: Notify::new(),
        }
    }
}

impl ModemStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new registration status and wakes waiters.
    ///
    /// Returns `true` if the status actually changed.
    pub fn set_registration(&self, status: RegistrationStatus) -> bool {
        let changed = match self.registration.write() {
            Ok(mut reg) => {
                let changed = *reg != status;
                *reg = status;
                changed
            }
            Err(_) => false,
        };
        self.registered.store(status.is_usable(), Ordering::SeqCst);
        if changed {
            self.changed.notify_waiters();
        }
        changed
    }

    pub fn registration(&self) -> RegistrationStatus {
        self.registration
            .read()
            .map(|r| *r)
            .unwrap_or(RegistrationStatus::NotRegistered)
    }

    /// Lock-free check whether the network is usable (home or roaming).
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    /// Waits until the device is registered (home or roaming), the timeout
    /// elapses, or the session is cancelled.
    ///
    /// This wait is purely passive: no commands are issued, registration
    /// arrives via `+CEREG` notices processed by the router.
    pub async fn wait_for_registration(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.changed.notified();
            if self.is_registered() {
                return Ok(());
            }
            tokio::select! {
                _ = notified => {}
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(Error::Timeout { waited: timeout });
                }
            }
        }
    }

    pub fn set_connection_state(&self, state: ConnectionState) {
        if let Ok(mut conn) = self.connection.write() {
            *conn = state;
        }
        self.changed.notify_waiters();
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
            .read()
            .map(|c| *c)
            .unwrap_or(ConnectionState::Disconnected)
    }

    pub fn set_phase(&self, phase: BringupPhase) {
        if let Ok(mut p) = self.phase.write() {
            *p = phase;
        }
    }

    pub fn phase(&self) -> BringupPhase {
        self.phase
            .read()
            .map(|p| *p)
            .unwrap_or(BringupPhase::Handshaking)
    }

    pub fn set_signal(&self, quality: SignalQuality) {
        if let Ok(mut s) = self.signal.write() {
            *s = Some(quality);
        }
    }

    pub fn signal(&self) -> Option<SignalQuality> {
        self.signal.read().ok().and_then(|s| *s)
    }

    pub fn set_fix(&self, fix: GnssFix) {
        if let Ok(mut f) = self.fix.write() {
            *f = Some(fix);
        }
    }

    pub fn fix(&self) -> Option<GnssFix> {
        self.fix.read().ok().and_then(|f| *f)
    }

    /// Records the most recent transport fault for display.
    pub fn set_last_fault(&self, detail: impl Into<String>) {
        if let Ok(mut fault) = self.last_fault.write() {
            *fault = Some(detail.into());
        }
    }

    pub fn last_fault(&self) -> Option<String> {
        self.last_fault.read().ok().and_then(|f| f.clone())
    }

    /// Registers or replaces a device-managed socket by id.
    pub fn upsert_socket(&self, session: SocketSession) {
        if let Ok(mut sockets) = self.sockets.write() {
            if let Some(existing) = sockets
                .iter_mut()
                .find(|s| s.socket_id == session.socket_id)
            {
                *existing = session;
            } else {
                sockets.push(session);
            }
        }
    }

    pub fn socket(&self, socket_id: u32) -> Option<SocketSession> {
        self.sockets
            .read()
            .ok()
            .and_then(|s| s.iter().find(|s| s.socket_id == socket_id).cloned())
    }

    /// The id of the downlink listen socket, if one is registered.
    pub fn listen_socket_id(&self) -> Option<u32> {
        self.sockets.read().ok().and_then(|sockets| {
            sockets
                .iter()
                .find(|s| matches!(s.role, crate::types::SocketRole::DownlinkListen))
                .map(|s| s.socket_id)
        })
    }

    /// A point-in-time copy of the full status.
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            registration: self.registration(),
            connection: self.connection_state(),
            phase: self.phase(),
            signal: self.signal(),
            fix: self.fix(),
            sockets: self.sockets.read().map(|s| s.clone()).unwrap_or_default(),
            last_fault: self.last_fault(),
        }
    }
}

/// A point-in-time copy of [`ModemStatus`].
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub registration: RegistrationStatus,
    pub connection: ConnectionState,
    pub phase: BringupPhase,
    pub signal: Option<SignalQuality>,
    pub fix: Option<GnssFix>,
    pub sockets: Vec<SocketSession>,
    pub last_fault: Option<String>,
}
