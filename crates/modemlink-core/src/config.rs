//! Network endpoint configuration shared by all device profiles.

/// Endpoints and filters for a modem session.
///
/// Defaults target the Soracom network: uplink to the Harvest collector,
/// downlink on a well-known local port, with inbound traffic restricted to
/// the operator's management subnet.
#[derive(Debug, Clone)]
pub struct ProfileConfig {
    /// Access point name for the packet data context.
    pub apn: String,
    /// Hostname or IP the uplink socket connects/sends to.
    pub uplink_host: String,
    /// UDP port on the uplink host.
    pub uplink_port: u16,
    /// Local UDP port bound for downlink traffic.
    pub downlink_port: u16,
    /// Per-read receive buffer size, bytes.
    pub downlink_buffer: usize,
    /// Exact source IP accepted by profiles that filter on a single peer.
    pub expected_source_ip: String,
    /// Source IP prefix accepted by profiles that filter on a subnet.
    pub allowed_source_prefix: String,
    /// Address pinged to verify the packet data context is usable.
    pub ping_target: String,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            apn: "soracom.io".into(),
            uplink_host: "harvest.soracom.io".into(),
            uplink_port: 8514,
            downlink_port: 55555,
            downlink_buffer: 256,
            expected_source_ip: "100.127.10.16".into(),
            allowed_source_prefix: "100.127.".into(),
            ping_target: "100.127.100.127".into(),
        }
    }
}
