//! Error types for modemlink.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport-layer, protocol-layer, and
//! bring-up errors are all captured here.

use std::time::Duration;

use crate::types::BringupPhase;

/// The error type for all modemlink operations.
///
/// Variants cover the full range of failure modes encountered when talking
/// to a cellular modem over a serial link: physical transport failures,
/// command timeouts, explicit device rejections, malformed notifications,
/// and bring-up phase failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port open failure, USB detach).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (malformed response, unparseable notification).
    ///
    /// Malformed *unsolicited* lines are logged and dropped rather than
    /// surfaced; this variant is for responses an operation depends on.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No terminal result line arrived before the deadline.
    ///
    /// Distinct from [`CommandRejected`](Error::CommandRejected): the device
    /// said nothing, which typically means it is powered off, rebooting, or
    /// the baud rate is wrong.
    #[error("timeout: no response within {}ms", waited.as_millis())]
    Timeout {
        /// How long we waited before giving up.
        waited: Duration,
    },

    /// The device returned an explicit failure result (`ERROR`, `+CME ERROR`).
    ///
    /// Carries the device's own diagnostic text.
    #[error("command rejected by device: {0}")]
    CommandRejected(String),

    /// A network bring-up phase failed; sequencing halted at that phase.
    #[error("bring-up failed during {phase}: {reason}")]
    BringupPhase {
        /// The phase that failed.
        phase: BringupPhase,
        /// Why it failed (usually the underlying error's text).
        reason: String,
    },

    /// The requested device family identifier is not supported.
    #[error("unsupported device family: {0}")]
    UnsupportedFamily(String),

    /// An invalid parameter was passed to a modemlink API.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No connection to the device has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the device was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// A pending wait was aborted by disconnect.
    #[error("cancelled by disconnect")]
    Cancelled,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
