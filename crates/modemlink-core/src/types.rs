//! Common data types shared across modemlink crates.

use chrono::{DateTime, Utc};

/// Cellular network registration status, as reported by `+CEREG` notices.
///
/// The numeric codes follow 3GPP TS 27.007; `90` is a vendor extension for
/// UICC/SIM failure seen on NTN-capable devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    /// Not registered, and not currently searching (stat 0).
    NotRegistered,
    /// Registered on the home network (stat 1).
    RegisteredHome,
    /// Not registered, searching for a network (stat 2).
    Searching,
    /// Registration denied by the network (stat 3).
    Denied,
    /// Unknown state, typically out of coverage (stat 4).
    UnknownOutOfCoverage,
    /// Registered while roaming (stat 5).
    RegisteredRoaming,
    /// SIM/UICC failure (stat 90).
    SimFailure,
    /// A stat code outside the known table. Preserved rather than dropped so
    /// consumers can log it.
    Unrecognized(u16),
}

impl RegistrationStatus {
    /// Maps a raw `+CEREG` stat code to a status.
    pub fn from_stat(stat: u16) -> Self {
        match stat {
            0 => Self::NotRegistered,
            1 => Self::RegisteredHome,
            2 => Self::Searching,
            3 => Self::Denied,
            4 => Self::UnknownOutOfCoverage,
            5 => Self::RegisteredRoaming,
            90 => Self::SimFailure,
            other => Self::Unrecognized(other),
        }
    }

    /// Whether this status permits data transfer (home or roaming).
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::RegisteredHome | Self::RegisteredRoaming)
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotRegistered => "not registered",
            Self::RegisteredHome => "registered (home)",
            Self::Searching => "searching",
            Self::Denied => "denied",
            Self::UnknownOutOfCoverage => "unknown (out of coverage)",
            Self::RegisteredRoaming => "registered (roaming)",
            Self::SimFailure => "SIM failure",
            Self::Unrecognized(code) => return write!(f, "unrecognized stat {code}"),
        };
        f.write_str(s)
    }
}

/// A signal quality sample, in physical units where available.
///
/// Fields are reported as-is from the device's extended signal quality
/// notification; `rsrp` is converted to dBm by the reporting profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalQuality {
    /// Reference signal received power, dBm.
    pub rsrp: i32,
    /// Reference signal received quality, raw units.
    pub rsrq: i32,
    /// Signal to interference plus noise ratio, raw units.
    pub sinr: i32,
    /// Received signal strength indication, raw units.
    pub rssi: i32,
}

/// A UDP datagram received from the network, after any reassembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownlinkMessage {
    /// Sender IP address.
    pub source_ip: String,
    /// Sender UDP port.
    pub source_port: u16,
    /// Decoded payload bytes.
    pub payload: Vec<u8>,
    /// When the (last chunk of the) datagram arrived.
    pub received_at: DateTime<Utc>,
}

impl DownlinkMessage {
    /// The payload interpreted as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Overall connection lifecycle state of a modem session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport open.
    Disconnected,
    /// Transport open, command channel live, network not yet up.
    Connected,
    /// Bring-up sequence in progress.
    Initializing,
    /// Network up; uplink and downlink available.
    Ready,
    /// Bring-up or the session failed; see the accompanying error.
    Failed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// The phases of the network bring-up sequence, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BringupPhase {
    /// Basic `AT` handshake to confirm the command channel.
    Handshaking,
    /// Device-specific radio init plus waiting for network registration.
    CellularRegistering,
    /// Subscribing to signal quality notifications.
    SignalMonitoring,
    /// Activating the packet data context.
    PdpActivating,
    /// Opening the uplink socket.
    SocketOpening,
    /// Binding the downlink listen port.
    PortBinding,
    /// Bring-up complete; data path available.
    Ready,
    /// A phase failed; sequencing halted.
    Failed,
}

impl std::fmt::Display for BringupPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Handshaking => "handshaking",
            Self::CellularRegistering => "cellular-registering",
            Self::SignalMonitoring => "signal-monitoring",
            Self::PdpActivating => "pdp-activating",
            Self::SocketOpening => "socket-opening",
            Self::PortBinding => "port-binding",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Role of a device-managed socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketRole {
    /// Outbound datagram socket to the uplink endpoint.
    Uplink,
    /// Listening socket for inbound datagrams.
    DownlinkListen,
}

/// Lifecycle state of a device-managed socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    /// Allocated on the device but not yet activated.
    Allocated,
    /// Activated and usable for data.
    Active,
    /// Deleted or otherwise unusable.
    Closed,
}

/// A socket managed on the device side, tracked by its numeric id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketSession {
    /// Device-assigned socket identifier.
    pub socket_id: u32,
    /// What this socket is used for.
    pub role: SocketRole,
    /// Current lifecycle state.
    pub state: SocketState,
    /// Local port for listen sockets, if any.
    pub local_port: Option<u16>,
}

/// One chunk of a chunked socket-data notification.
///
/// Stateful-dialect devices deliver large datagrams in pieces; `more`
/// indicates whether further chunks of the same datagram follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketDataChunk {
    /// Socket the data arrived on.
    pub socket_id: u32,
    /// Chunk length in bytes (decoded).
    pub length: usize,
    /// Whether more chunks of this datagram remain on the device.
    pub more: bool,
    /// Hex-encoded chunk payload, exactly as reported.
    pub hex_payload: String,
    /// Sender IP address, when the notification carries one.
    pub source_ip: Option<String>,
    /// Sender UDP port, when the notification carries one.
    pub source_port: Option<u16>,
}

/// A GNSS position fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GnssFix {
    pub latitude: f64,
    pub longitude: f64,
}

/// Static identification for a supported modem family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Canonical family identifier, e.g. `"nordic_thingy91x"`.
    pub id: &'static str,
    /// Manufacturer name.
    pub manufacturer: &'static str,
    /// Human-readable model description.
    pub model: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_status_from_stat_table() {
        assert_eq!(
            RegistrationStatus::from_stat(0),
            RegistrationStatus::NotRegistered
        );
        assert_eq!(
            RegistrationStatus::from_stat(1),
            RegistrationStatus::RegisteredHome
        );
        assert_eq!(
            RegistrationStatus::from_stat(2),
            RegistrationStatus::Searching
        );
        assert_eq!(RegistrationStatus::from_stat(3), RegistrationStatus::Denied);
        assert_eq!(
            RegistrationStatus::from_stat(4),
            RegistrationStatus::UnknownOutOfCoverage
        );
        assert_eq!(
            RegistrationStatus::from_stat(5),
            RegistrationStatus::RegisteredRoaming
        );
        assert_eq!(
            RegistrationStatus::from_stat(90),
            RegistrationStatus::SimFailure
        );
        assert_eq!(
            RegistrationStatus::from_stat(42),
            RegistrationStatus::Unrecognized(42)
        );
    }

    #[test]
    fn registration_usable_only_home_and_roaming() {
        assert!(RegistrationStatus::RegisteredHome.is_usable());
        assert!(RegistrationStatus::RegisteredRoaming.is_usable());
        assert!(!RegistrationStatus::Searching.is_usable());
        assert!(!RegistrationStatus::Denied.is_usable());
        assert!(!RegistrationStatus::SimFailure.is_usable());
        assert!(!RegistrationStatus::Unrecognized(7).is_usable());
    }

    #[test]
    fn registration_status_display() {
        assert_eq!(
            RegistrationStatus::RegisteredRoaming.to_string(),
            "registered (roaming)"
        );
        assert_eq!(
            RegistrationStatus::Unrecognized(42).to_string(),
            "unrecognized stat 42"
        );
    }

    #[test]
    fn bringup_phase_display() {
        assert_eq!(BringupPhase::Handshaking.to_string(), "handshaking");
        assert_eq!(BringupPhase::PdpActivating.to_string(), "pdp-activating");
        assert_eq!(BringupPhase::Ready.to_string(), "ready");
    }

    #[test]
    fn downlink_message_text_lossy() {
        let msg = DownlinkMessage {
            source_ip: "100.127.10.16".into(),
            source_port: 8514,
            payload: b"hello".to_vec(),
            received_at: Utc::now(),
        };
        assert_eq!(msg.text(), "hello");

        let bad = DownlinkMessage {
            payload: vec![0xff, b'o', b'k'],
            ..msg
        };
        assert!(bad.text().ends_with("ok"));
    }
}
