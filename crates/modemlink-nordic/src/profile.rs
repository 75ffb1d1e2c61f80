//! [`DeviceProfile`] implementation for Nordic nRF91-series modems.

use async_trait::async_trait;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use modemlink_core::error::{Error, Result};
use modemlink_core::profile::{DeviceProfile, ProfileContext};
use modemlink_core::types::{
    DeviceInfo, DownlinkMessage, RegistrationStatus, SignalQuality, SocketRole, SocketSession,
    SocketState,
};

use crate::commands;

/// Ordinary configuration commands complete quickly on this family.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// The receive command blocks until data arrives or this elapses.
const RECEIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Terrestrial LTE-M registration is a matter of seconds.
const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(30);

/// The Nordic AT shell manages one UDP socket; commands address it
/// implicitly, but we track it under a fixed id for status reporting.
const UPLINK_SOCKET_ID: u32 = 1;

/// Nordic Thingy:91 X profile.
///
/// Stateless: every operation is a single command with an inline ASCII
/// payload, so there is nothing to carry between calls.
#[derive(Debug, Default)]
pub struct NordicProfile;

impl NordicProfile {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DeviceProfile for NordicProfile {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            id: "nordic_thingy91x",
            manufacturer: "Nordic Semiconductor",
            model: "Thingy:91 X",
        }
    }

    fn registration_timeout(&self) -> Duration {
        REGISTRATION_TIMEOUT
    }

    fn parse_registration_notice(&self, line: &str) -> Option<RegistrationStatus> {
        let body = line.strip_prefix("+CEREG:")?.trim();
        let fields: Vec<&str> = body.split(',').collect();
        // A +CEREG? query reply carries `<n>,<stat>` with no cell info;
        // treating its first field as a status would misread the report
        // mode. Real notices have either one field or quoted cell ids.
        if fields.len() == 2 && !body.contains('"') {
            return None;
        }
        let stat: u16 = fields.first()?.trim().parse().ok()?;
        Some(RegistrationStatus::from_stat(stat))
    }

    async fn initialize_network(&self, ctx: &ProfileContext) -> Result<()> {
        for line in commands::INIT_SEQUENCE {
            ctx.channel.execute(line, COMMAND_TIMEOUT).await?;
        }
        Ok(())
    }

    async fn subscribe_signal_quality(&self, ctx: &ProfileContext) -> Result<()> {
        ctx.channel
            .execute(commands::SUBSCRIBE_CESQ, COMMAND_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn query_signal_quality(&self, ctx: &ProfileContext) -> Result<Option<SignalQuality>> {
        // The reply is a %CESQ notification, so it normally reaches the
        // router rather than coming back here; parse defensively anyway.
        let response = ctx
            .channel
            .execute(commands::QUERY_CESQ, COMMAND_TIMEOUT)
            .await?;
        for line in &response.lines {
            if let Some(quality) = parse_cesq_line(line) {
                return Ok(Some(quality));
            }
        }
        Ok(None)
    }

    async fn activate_pdp_context(&self, ctx: &ProfileContext) -> Result<()> {
        ctx.channel
            .execute(&commands::configure_pdp(&ctx.config.apn), COMMAND_TIMEOUT)
            .await?;
        Ok(())
    }

    async fn open_uplink_socket(&self, ctx: &ProfileContext) -> Result<()> {
        ctx.channel
            .execute(commands::OPEN_UDP_SOCKET, COMMAND_TIMEOUT)
            .await?;
        ctx.status.upsert_socket(SocketSession {
            socket_id: UPLINK_SOCKET_ID,
            role: SocketRole::Uplink,
            state: SocketState::Active,
            local_port: None,
        });
        Ok(())
    }

    async fn bind_downlink_port(&self, ctx: &ProfileContext, port: u16) -> Result<()> {
        ctx.channel
            .execute(&commands::bind_port(port), COMMAND_TIMEOUT)
            .await?;
        // The shell's single socket serves both directions; once bound it
        // is the session's listen socket.
        ctx.status.upsert_socket(SocketSession {
            socket_id: UPLINK_SOCKET_ID,
            role: SocketRole::DownlinkListen,
            state: SocketState::Active,
            local_port: Some(port),
        });
        Ok(())
    }

    async fn send_uplink(&self, ctx: &ProfileContext, text: &str) -> Result<()> {
        let line = commands::send_to(&ctx.config.uplink_host, ctx.config.uplink_port, text);
        let response = ctx.channel.execute(&line, COMMAND_TIMEOUT).await?;
        if let Some(sent) = response
            .lines
            .iter()
            .find_map(|l| commands::parse_sendto_size(l))
        {
            if sent != text.len() {
                warn!(sent, expected = text.len(), "short uplink send");
            }
        }
        Ok(())
    }

    async fn receive_downlink(&self, ctx: &ProfileContext) -> Result<Option<DownlinkMessage>> {
        let line = commands::recv_from(ctx.config.downlink_buffer);
        let response = match ctx.channel.execute(&line, RECEIVE_TIMEOUT).await {
            Ok(response) => response,
            // Nothing pending: the shell either times out or errors the
            // read. Both just mean "no data right now".
            Err(Error::Timeout { .. }) | Err(Error::CommandRejected(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let Some(header_idx) = response
            .lines
            .iter()
            .position(|l| l.starts_with("#XRECVFROM:"))
        else {
            return Ok(None);
        };
        let Some((size, ip, port)) = commands::parse_recvfrom_header(&response.lines[header_idx])
        else {
            warn!(line = %response.lines[header_idx], "unparseable receive header");
            return Ok(None);
        };

        if ip != ctx.config.expected_source_ip {
            debug!(from = %ip, "dropping downlink from unexpected source");
            return Ok(None);
        }

        let payload = response
            .lines
            .get(header_idx + 1)
            .cloned()
            .unwrap_or_default();
        if payload.len() != size {
            debug!(
                announced = size,
                got = payload.len(),
                "downlink size mismatch"
            );
        }

        Ok(Some(DownlinkMessage {
            source_ip: ip,
            source_port: port,
            payload: payload.into_bytes(),
            received_at: Utc::now(),
        }))
    }
}

/// Parses `%CESQ: <rsrp>,<rsrq>,<sinr>` with raw-coded rsrp.
fn parse_cesq_line(line: &str) -> Option<SignalQuality> {
    let body = line.strip_prefix("%CESQ:")?.trim();
    let mut fields = body.split(',');
    let raw: i32 = fields.next()?.trim().parse().ok()?;
    let rsrp = modemlink_core::helpers::rsrp_raw_to_dbm(raw)?;
    let rsrq = fields.next().and_then(|f| f.trim().parse().ok()).unwrap_or(0);
    let sinr = fields.next().and_then(|f| f.trim().parse().ok()).unwrap_or(0);
    Some(SignalQuality {
        rsrp,
        rsrq,
        sinr,
        rssi: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use modemlink_core::command::CommandRunner;
    use modemlink_core::config::ProfileConfig;
    use modemlink_core::mailbox::Mailboxes;
    use modemlink_core::status::ModemStatus;
    use modemlink_test_harness::MockCommandRunner;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn ctx(runner: Arc<MockCommandRunner>) -> ProfileContext {
        ProfileContext {
            channel: runner as Arc<dyn CommandRunner>,
            status: Arc::new(ModemStatus::new()),
            mailboxes: Arc::new(Mailboxes::new()),
            cancel: CancellationToken::new(),
            config: Arc::new(ProfileConfig::default()),
        }
    }

    #[test]
    fn registration_notice_parses_stat() {
        let profile = NordicProfile::new();
        assert_eq!(
            profile.parse_registration_notice("+CEREG: 1"),
            Some(RegistrationStatus::RegisteredHome)
        );
        assert_eq!(
            profile.parse_registration_notice("+CEREG: 5,\"262A\",\"002F6A03\",7"),
            Some(RegistrationStatus::RegisteredRoaming)
        );
        assert_eq!(
            profile.parse_registration_notice("+CEREG: 90"),
            Some(RegistrationStatus::SimFailure)
        );
    }

    #[test]
    fn registration_query_reply_is_ignored() {
        let profile = NordicProfile::new();
        // `<n>,<stat>` from a +CEREG? query; first field is report mode.
        assert_eq!(profile.parse_registration_notice("+CEREG: 2,1"), None);
    }

    #[test]
    fn non_registration_lines_are_ignored() {
        let profile = NordicProfile::new();
        assert_eq!(profile.parse_registration_notice("%CESQ: 54,20,10"), None);
        assert_eq!(profile.parse_registration_notice("OK"), None);
    }

    #[tokio::test]
    async fn init_runs_full_sequence() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.expect_ok("AT+CFUN=0", &[]);
        runner.expect_ok("AT+CEREG=5", &[]);
        runner.expect_ok("AT+CSCON=1", &[]);
        runner.expect_ok("AT%XSYSTEMMODE=1,0,1,0", &[]);
        runner.expect_ok("AT+CFUN=1", &[]);

        let ctx = ctx(runner.clone());
        NordicProfile::new().initialize_network(&ctx).await.unwrap();
        assert_eq!(runner.remaining(), 0);
    }

    #[tokio::test]
    async fn init_stops_on_rejection() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.expect_ok("AT+CFUN=0", &[]);
        runner.expect_rejected("AT+CEREG=5", "ERROR");

        let ctx = ctx(runner.clone());
        let err = NordicProfile::new()
            .initialize_network(&ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CommandRejected(_)));
        assert_eq!(runner.executed_lines().len(), 2);
    }

    #[tokio::test]
    async fn send_uplink_builds_sendto() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.expect_ok(
            "AT#XSENDTO=\"harvest.soracom.io\",8514,\"hello\"",
            &["#XSENDTO: 5"],
        );

        let ctx = ctx(runner.clone());
        NordicProfile::new()
            .send_uplink(&ctx, "hello")
            .await
            .unwrap();
        assert_eq!(runner.remaining(), 0);
    }

    #[tokio::test]
    async fn receive_downlink_accepts_expected_source() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.expect_ok(
            "AT#XRECVFROM=256",
            &["#XRECVFROM: 5,\"100.127.10.16\",8514", "hello"],
        );

        let ctx = ctx(runner);
        let message = NordicProfile::new()
            .receive_downlink(&ctx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.source_ip, "100.127.10.16");
        assert_eq!(message.source_port, 8514);
        assert_eq!(message.payload, b"hello");
    }

    #[tokio::test]
    async fn receive_downlink_filters_unexpected_source() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.expect_ok(
            "AT#XRECVFROM=256",
            &["#XRECVFROM: 4,\"203.0.113.9\",4242", "evil"],
        );

        let ctx = ctx(runner);
        let message = NordicProfile::new().receive_downlink(&ctx).await.unwrap();
        assert!(message.is_none());
    }

    #[tokio::test]
    async fn receive_downlink_timeout_is_empty() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.expect_timeout("AT#XRECVFROM=256");

        let ctx = ctx(runner);
        let message = NordicProfile::new().receive_downlink(&ctx).await.unwrap();
        assert!(message.is_none());
    }

    #[tokio::test]
    async fn open_socket_records_session() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.expect_ok("AT#XSOCKET=1,2,0", &["#XSOCKET: 1,2,17"]);

        let ctx = ctx(runner);
        NordicProfile::new().open_uplink_socket(&ctx).await.unwrap();
        let socket = ctx.status.socket(UPLINK_SOCKET_ID).unwrap();
        assert_eq!(socket.state, SocketState::Active);
    }

    #[tokio::test]
    async fn bind_records_listen_socket() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.expect_ok("AT#XBIND=55555", &[]);

        let ctx = ctx(runner);
        NordicProfile::new()
            .bind_downlink_port(&ctx, 55555)
            .await
            .unwrap();
        assert_eq!(ctx.status.listen_socket_id(), Some(UPLINK_SOCKET_ID));
        let socket = ctx.status.socket(UPLINK_SOCKET_ID).unwrap();
        assert_eq!(socket.role, SocketRole::DownlinkListen);
        assert_eq!(socket.local_port, Some(55555));
    }

    #[test]
    fn cesq_line_converts_rsrp() {
        let q = parse_cesq_line("%CESQ: 54,20,10").unwrap();
        assert_eq!(q.rsrp, -87);
        assert_eq!(q.rsrq, 20);
        assert_eq!(q.sinr, 10);

        // 255 means "not measured".
        assert!(parse_cesq_line("%CESQ: 255,0,0").is_none());
    }
}
