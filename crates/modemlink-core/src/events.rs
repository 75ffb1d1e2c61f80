//! Asynchronous modem event and traffic-log types.
//!
//! Events are emitted by the engine through a [`tokio::sync::broadcast`]
//! channel when modem state changes or a downlink datagram arrives. The
//! traffic log is a second broadcast feed carrying every line exchanged with
//! the device, for diagnostics UIs and protocol debugging.

use chrono::{DateTime, Utc};

use crate::types::{
    BringupPhase, ConnectionState, DownlinkMessage, GnssFix, RegistrationStatus, SignalQuality,
};

/// An event emitted when modem or network state changes.
///
/// Events are delivered on a best-effort basis through a bounded broadcast
/// channel; slow consumers may miss events under heavy load (e.g. a burst of
/// signal quality notifications).
#[derive(Debug, Clone)]
pub enum ModemEvent {
    /// The session's connection lifecycle state changed.
    ConnectionStateChanged {
        /// The new state.
        state: ConnectionState,
    },

    /// Network registration status changed.
    RegistrationChanged {
        /// The new registration status.
        status: RegistrationStatus,
    },

    /// A new signal quality sample arrived.
    SignalQualityUpdated {
        /// The sample, with rsrp already converted to dBm.
        quality: SignalQuality,
    },

    /// The bring-up sequencer entered a new phase.
    PhaseChanged {
        /// The phase just entered.
        phase: BringupPhase,
    },

    /// A complete downlink datagram was received and passed filtering.
    DownlinkReceived {
        /// The reassembled message.
        message: DownlinkMessage,
    },

    /// A GNSS position fix was obtained.
    LocationFix {
        /// The fix.
        fix: GnssFix,
    },

    /// The transport failed mid-session.
    TransportFault {
        /// Description of the failure.
        detail: String,
    },

    /// The session was shut down.
    Disconnected,
}

/// Origin of a traffic log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOrigin {
    /// A command line sent to the device.
    Sent,
    /// A line received from the device.
    Received,
    /// A library-generated note (phase transitions, faults).
    System,
}

impl std::fmt::Display for LogOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Sent => "TX",
            Self::Received => "RX",
            Self::System => "--",
        };
        f.write_str(s)
    }
}

/// One entry in the consumer-facing traffic log.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// When the line was sent or received.
    pub at: DateTime<Utc>,
    /// Direction of the traffic.
    pub origin: LogOrigin,
    /// The line text, without terminators.
    pub text: String,
}

impl LogEntry {
    /// A log entry for a line sent to the device.
    pub fn sent(text: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            origin: LogOrigin::Sent,
            text: text.into(),
        }
    }

    /// A log entry for a line received from the device.
    pub fn received(text: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            origin: LogOrigin::Received,
            text: text.into(),
        }
    }

    /// A library-generated log entry.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            origin: LogOrigin::System,
            text: text.into(),
        }
    }
}
