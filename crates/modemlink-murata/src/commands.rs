//! AT command builders for the Murata Type 1SC dialect.
//!
//! Init is five phases of configuration with two device resets in between;
//! each phase is a static command list here, sequenced by the profile.

/// Phase 1: verify the SIM and enable the boot-event notice the reset
/// handshake depends on.
pub const BOOT_NOTICE_SETUP: &[&str] = &[
    "AT+CPIN?",
    "AT%SETACFG=\"manager.urcBootEv.enabled\",\"true\"",
    "AT%SETCFG=\"SIM_INIT_SELECT_POLICY\",\"0\"",
];

/// Phase 2: radio manager and location service policy.
pub const RADIO_POLICY_SETUP: &[&str] = &[
    "AT%SETACFG=\"radiom.config.multi_rat_enable\",\"true\"",
    "AT%SETACFG=\"radiom.config.preferred_rat_list\",\"none\"",
    "AT%SETACFG=\"radiom.config.auto_preference_mode\",\"none\"",
    "AT%SETACFG=\"locsrv.operation.locsrv_enable\",\"true\"",
    "AT%SETACFG=\"locsrv.internal_gnss.auto_restart\",\"enable\"",
    "AT%SETACFG=\"modem_apps.Mode.AutoConnectMode\",\"true\"",
];

/// Phase 3: select the NB-NTN radio image and band, radio off.
///
/// The `+CSIM` exchange provisions the NTN access profile on the UICC.
pub const NTN_RAT_SETUP: &[&str] = &[
    "AT+CSIM=52,\"80C2000015D613190103820282811B0100130799F08900010001\"",
    "AT%RATIMGSEL=2",
    "AT%RATACT=\"NBNTN\",\"1\"",
    "AT%SETCFG=\"BAND\",\"256\"",
    "AT+CFUN=0",
];

/// Phase 4: GNSS fix notices on, receiver restarted. NTN needs a position
/// fix before it can point at a satellite.
pub const GNSS_SETUP: &[&str] = &[
    "AT%IGNSSEV=\"FIX\",1",
    "AT%NOTIFYEV=\"SIB31\",1",
    "AT%IGNSSACT=0",
    "AT%IGNSSACT=1",
];

/// Phase 5: registration notices on, radio up.
pub const REGISTRATION_SETUP: &[&str] = &["AT+CEREG=2", "AT+CFUN=1"];

/// Device reset. The reply may never come; the boot notice is the real
/// completion signal.
pub const RESET: &str = "ATZ";

/// Subscribe to socket event notices on all sockets.
pub const SUBSCRIBE_SOCKET_EVENTS: &str = "AT%SOCKETEV=0,1";

/// One-shot signal measurement query.
pub const QUERY_MEAS: &str = "AT%MEAS=\"8\"";

/// How many bytes one RECEIVE command may return.
pub const RECEIVE_CHUNK_SIZE: usize = 1500;

pub fn configure_pdp(apn: &str) -> String {
    format!("AT+CGDCONT=1,\"IP\",\"{apn}\"")
}

pub fn ping(target: &str) -> String {
    format!("AT%PINGCMD=0,\"{target}\",1,50,30")
}

pub fn allocate_uplink(host: &str, port: u16) -> String {
    format!("AT%SOCKETCMD=\"ALLOCATE\",1,\"UDP\",\"OPEN\",\"{host}\",{port}")
}

/// The empty field between the remote address and the local port is part of
/// the LISTEN syntax: no remote port is given for a listening socket.
pub fn allocate_listen(port: u16) -> String {
    format!("AT%SOCKETCMD=\"ALLOCATE\",1,\"UDP\",\"LISTEN\",\"0.0.0.0\",,{port}")
}

pub fn activate_socket(socket_id: u32) -> String {
    format!("AT%SOCKETCMD=\"ACTIVATE\",{socket_id}")
}

pub fn send_data(socket_id: u32, byte_len: usize, hex_payload: &str) -> String {
    format!("AT%SOCKETDATA=\"SEND\",{socket_id},{byte_len},\"{hex_payload}\"")
}

pub fn receive_data(socket_id: u32) -> String {
    format!("AT%SOCKETDATA=\"RECEIVE\",{socket_id},{RECEIVE_CHUNK_SIZE}")
}

/// Parses one measurement from a `%MEAS` report of the form
/// `RSRP = -100, RSRQ = -12, SINR = 4, RSSI = -95`.
pub fn parse_meas_field(line: &str, name: &str) -> Option<i32> {
    for part in line.split(',') {
        let mut kv = part.splitn(2, '=');
        let key = kv.next()?.trim();
        if key.eq_ignore_ascii_case(name) {
            return kv.next()?.trim().parse().ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdp_command_quotes_apn() {
        assert_eq!(
            configure_pdp("soracom.io"),
            "AT+CGDCONT=1,\"IP\",\"soracom.io\""
        );
    }

    #[test]
    fn ping_command() {
        assert_eq!(
            ping("100.127.100.127"),
            "AT%PINGCMD=0,\"100.127.100.127\",1,50,30"
        );
    }

    #[test]
    fn allocate_uplink_command() {
        assert_eq!(
            allocate_uplink("harvest.soracom.io", 8514),
            "AT%SOCKETCMD=\"ALLOCATE\",1,\"UDP\",\"OPEN\",\"harvest.soracom.io\",8514"
        );
    }

    #[test]
    fn allocate_listen_keeps_empty_remote_port_field() {
        assert_eq!(
            allocate_listen(55555),
            "AT%SOCKETCMD=\"ALLOCATE\",1,\"UDP\",\"LISTEN\",\"0.0.0.0\",,55555"
        );
    }

    #[test]
    fn send_data_command_hex() {
        assert_eq!(
            send_data(1, 2, "6869"),
            "AT%SOCKETDATA=\"SEND\",1,2,\"6869\""
        );
    }

    #[test]
    fn receive_data_command() {
        assert_eq!(receive_data(2), "AT%SOCKETDATA=\"RECEIVE\",2,1500");
    }

    #[test]
    fn meas_field_parse() {
        let line = "RSRP = -100, RSRQ = -12, SINR = 4, RSSI = -95";
        assert_eq!(parse_meas_field(line, "RSRP"), Some(-100));
        assert_eq!(parse_meas_field(line, "RSRQ"), Some(-12));
        assert_eq!(parse_meas_field(line, "SINR"), Some(4));
        assert_eq!(parse_meas_field(line, "RSSI"), Some(-95));
        assert_eq!(parse_meas_field(line, "EARFCN"), None);
        assert_eq!(parse_meas_field("garbage", "RSRP"), None);
    }
}
