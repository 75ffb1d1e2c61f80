//! AT command builders for the Nordic AT shell dialect.
//!
//! Kept separate from the profile so the exact wire text is visible in one
//! place and trivially testable.

/// Radio init sequence, run before waiting for registration.
///
/// Level-5 `+CEREG` reporting gives registration notices with location
/// info; `%XSYSTEMMODE=1,0,1,0` selects LTE-M with GNSS.
pub const INIT_SEQUENCE: &[&str] = &[
    "AT+CFUN=0",
    "AT+CEREG=5",
    "AT+CSCON=1",
    "AT%XSYSTEMMODE=1,0,1,0",
    "AT+CFUN=1",
];

/// Subscribe to unsolicited `%CESQ` signal quality notifications.
pub const SUBSCRIBE_CESQ: &str = "AT%CESQ=1";

/// One-shot signal quality query.
pub const QUERY_CESQ: &str = "AT%CESQ";

/// Open one UDP socket (family 1 = IPv4, type 2 = datagram, role 0).
pub const OPEN_UDP_SOCKET: &str = "AT#XSOCKET=1,2,0";

pub fn configure_pdp(apn: &str) -> String {
    format!("AT+CGDCONT=1,\"IP\",\"{apn}\"")
}

pub fn bind_port(port: u16) -> String {
    format!("AT#XBIND={port}")
}

pub fn send_to(host: &str, port: u16, data: &str) -> String {
    format!("AT#XSENDTO=\"{host}\",{port},\"{data}\"")
}

pub fn recv_from(buffer_size: usize) -> String {
    format!("AT#XRECVFROM={buffer_size}")
}

/// Parse a `#XRECVFROM: <size>,"<ip>",<port>` header line.
pub fn parse_recvfrom_header(line: &str) -> Option<(usize, String, u16)> {
    let body = line.strip_prefix("#XRECVFROM:")?.trim();
    let mut parts = body.splitn(3, ',');
    let size = parts.next()?.trim().parse().ok()?;
    let ip = parts.next()?.trim().trim_matches('"').to_string();
    let port = parts.next()?.trim().parse().ok()?;
    Some((size, ip, port))
}

/// Parse a `#XSENDTO: <size>` confirmation line.
pub fn parse_sendto_size(line: &str) -> Option<usize> {
    line.strip_prefix("#XSENDTO:")?.trim().parse().ok()
}
