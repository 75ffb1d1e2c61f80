//! Single-slot mailboxes for request/notification pairing.
//!
//! Several AT exchanges complete out of band: the command returns `OK`
//! immediately and the real result arrives later as an unsolicited line.
//! The notification router parses those lines and `put`s the result into a
//! typed mailbox; the operation that issued the command `wait`s on the same
//! mailbox. Each slot holds at most one value and a newer value overwrites
//! an unconsumed older one, so a stale result can never satisfy a fresh
//! request after a `clear`.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::types::{GnssFix, SocketDataChunk};

/// A single-slot, overwrite-on-put mailbox.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Option<T>>,
    notify: Notify,
}

// An empty mailbox needs nothing from T, so no `T: Default` bound.
impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    /// Deposits a value, replacing any unconsumed one, and wakes waiters.
    pub fn put(&self, value: T) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(value);
        }
        self.notify.notify_waiters();
    }

    /// Takes the current value, if any, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        self.slot.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Empties the slot without waking anyone. Call before issuing a command
    /// whose result will arrive here, so a stale value cannot satisfy it.
    pub fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }

    /// Waits until a value is deposited, the timeout elapses, or the session
    /// is cancelled.
    ///
    /// Returns [`Error::Timeout`] on deadline and [`Error::Cancelled`] if
    /// `cancel` fires first.
    pub async fn wait(&self, timeout: Duration, cancel: &CancellationToken) -> Result<T> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register for wakeup before checking the slot so a put between
            // the check and the await is not lost.
            let notified = self.notify.notified();
            if let Some(value) = self.take() {
                return Ok(value);
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
}

/// The full set of mailboxes a session carries, one per out-of-band
/// notification type.
#[derive(Debug, Default)]
pub struct Mailboxes {
    /// `%PINGCMD` result lines.
    pub ping: Mailbox<String>,
    /// Socket id from a `%SOCKETCMD` allocation notice.
    pub socket_alloc: Mailbox<u32>,
    /// One chunk of a `%SOCKETDATA` receive notification.
    pub socket_data: Mailbox<SocketDataChunk>,
    /// `%BOOTEV` boot completion.
    pub boot: Mailbox<()>,
    /// GNSS fix from `%IGNSSEVU`.
    pub gnss_fix: Mailbox<GnssFix>,
}

impl Mailboxes {
    pub fn new() -> Self {
        Self::default()
    }
}
