//! [`DeviceProfile`] implementation for the Murata Type 1SC over NTN.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use modemlink_core::error::{Error, Result};
use modemlink_core::helpers::{decode_hex, encode_hex_upper};
use modemlink_core::profile::{DeviceProfile, ProfileContext};
use modemlink_core::types::{
    DeviceInfo, DownlinkMessage, RegistrationStatus, SignalQuality, SocketRole, SocketSession,
    SocketState,
};

use crate::commands;

/// Configuration commands on this family can take several seconds.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// A reset reply rarely arrives; give up on it quickly and rely on the
/// boot notice instead.
const RESET_TIMEOUT: Duration = Duration::from_secs(3);

/// How long a reboot may take before the boot notice.
const BOOT_TIMEOUT: Duration = Duration::from_secs(15);

/// Cold-start GNSS acquisition under open sky.
const GNSS_FIX_TIMEOUT: Duration = Duration::from_secs(300);

/// The ping command itself returns promptly; the result notice carries the
/// actual round trip and can lag well behind it over NTN.
const PING_COMMAND_TIMEOUT: Duration = Duration::from_secs(15);
const PING_RESULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Socket allocation and data notices.
const SOCKET_NOTICE_TIMEOUT: Duration = Duration::from_secs(5);
const DATA_NOTICE_TIMEOUT: Duration = Duration::from_secs(5);

/// NTN registration waits on a satellite pass.
const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(600);

/// Murata Type 1SC profile, NB-NTN configuration.
///
/// Tracks the device-assigned uplink socket id between open and send; the
/// listen socket id lives in session status where the router also needs it.
#[derive(Debug, Default)]
pub struct MurataProfile {
    /// 0 until the uplink socket is opened.
    uplink_socket: AtomicU32,
}

impl MurataProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the device and waits for the boot notice.
    ///
    /// The reset reply is unreliable (the device may drop the line mid
    /// reboot), so a timeout on `ATZ` itself is not an error.
    async fn reset_and_wait_boot(&self, ctx: &ProfileContext) -> Result<()> {
        ctx.mailboxes.boot.clear();
        match ctx.channel.execute(commands::RESET, RESET_TIMEOUT).await {
            Ok(_) | Err(Error::Timeout { .. }) => {}
            Err(e) => return Err(e),
        }
        ctx.mailboxes.boot.wait(BOOT_TIMEOUT, &ctx.cancel).await?;
        debug!("device rebooted");
        Ok(())
    }

    async fn run_commands(&self, ctx: &ProfileContext, lines: &[&str]) -> Result<()> {
        for line in lines {
            ctx.channel.execute(line, COMMAND_TIMEOUT).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceProfile for MurataProfile {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            id: "murata_type1sc",
            manufacturer: "Murata",
            model: "Type 1SC (NB-NTN)",
        }
    }

    fn registration_timeout(&self) -> Duration {
        REGISTRATION_TIMEOUT
    }

    fn parse_registration_notice(&self, line: &str) -> Option<RegistrationStatus> {
        let body = line.strip_prefix("+CEREG:")?.trim();
        let fields: Vec<&str> = body.split(',').collect();
        // An application can still send `AT+CEREG?` through the raw command
        // surface; its `<n>,<stat>` reply routes here on the `+` sigil and
        // leads with the report mode, not a stat. Real mode-2 notices carry
        // either a lone stat or quoted cell ids.
        if fields.len() == 2 && !body.contains('"') {
            return None;
        }
        let stat: u16 = fields.first()?.trim().parse().ok()?;
        Some(RegistrationStatus::from_stat(stat))
    }

    async fn initialize_network(&self, ctx: &ProfileContext) -> Result<()> {
        self.run_commands(ctx, commands::BOOT_NOTICE_SETUP).await?;
        self.reset_and_wait_boot(ctx).await?;

        self.run_commands(ctx, commands::RADIO_POLICY_SETUP).await?;
        self.reset_and_wait_boot(ctx).await?;

        self.run_commands(ctx, commands::NTN_RAT_SETUP).await?;

        ctx.mailboxes.gnss_fix.clear();
        self.run_commands(ctx, commands::GNSS_SETUP).await?;
        info!("waiting for GNSS fix");
        let fix = ctx
            .mailboxes
            .gnss_fix
            .wait(GNSS_FIX_TIMEOUT, &ctx.cancel)
            .await?;
        info!(
            latitude = fix.latitude,
            longitude = fix.longitude,
            "GNSS fix acquired"
        );

        self.run_commands(ctx, commands::REGISTRATION_SETUP).await
    }

    async fn subscribe_signal_quality(&self, _ctx: &ProfileContext) -> Result<()> {
        // No unsolicited signal stream on this family; signal quality is
        // available on demand through query_signal_quality.
        Ok(())
    }

    async fn query_signal_quality(&self, ctx: &ProfileContext) -> Result<Option<SignalQuality>> {
        let response = ctx
            .channel
            .execute(commands::QUERY_MEAS, COMMAND_TIMEOUT)
            .await?;
        for line in &response.lines {
            let Some(rsrp) = commands::parse_meas_field(line, "RSRP") else {
                continue;
            };
            return Ok(Some(SignalQuality {
                rsrp,
                rsrq: commands::parse_meas_field(line, "RSRQ").unwrap_or(0),
                sinr: commands::parse_meas_field(line, "SINR").unwrap_or(0),
                rssi: commands::parse_meas_field(line, "RSSI").unwrap_or(0),
            }));
        }
        Ok(None)
    }

    async fn activate_pdp_context(&self, ctx: &ProfileContext) -> Result<()> {
        ctx.channel
            .execute(&commands::configure_pdp(&ctx.config.apn), COMMAND_TIMEOUT)
            .await?;

        // The context can come up without being usable; a ping to the
        // operator's management address proves the data path end to end.
        ctx.mailboxes.ping.clear();
        ctx.channel
            .execute(
                &commands::ping(&ctx.config.ping_target),
                PING_COMMAND_TIMEOUT,
            )
            .await?;
        let result = ctx
            .mailboxes
            .ping
            .wait(PING_RESULT_TIMEOUT, &ctx.cancel)
            .await?;
        info!(result = %result, "data path verified by ping");
        Ok(())
    }

    async fn open_uplink_socket(&self, ctx: &ProfileContext) -> Result<()> {
        ctx.channel
            .execute(commands::SUBSCRIBE_SOCKET_EVENTS, COMMAND_TIMEOUT)
            .await?;

        ctx.mailboxes.socket_alloc.clear();
        ctx.channel
            .execute(
                &commands::allocate_uplink(&ctx.config.uplink_host, ctx.config.uplink_port),
                COMMAND_TIMEOUT,
            )
            .await?;
        let socket_id = match ctx
            .mailboxes
            .socket_alloc
            .wait(SOCKET_NOTICE_TIMEOUT, &ctx.cancel)
            .await
        {
            Ok(id) => id,
            // Older firmware omits the allocation notice for OPEN sockets
            // and always hands out socket 1.
            Err(Error::Timeout { .. }) => {
                warn!("no allocation notice for uplink socket, assuming socket 1");
                1
            }
            Err(e) => return Err(e),
        };

        ctx.channel
            .execute(&commands::activate_socket(socket_id), COMMAND_TIMEOUT)
            .await?;
        self.uplink_socket.store(socket_id, Ordering::SeqCst);
        ctx.status.upsert_socket(SocketSession {
            socket_id,
            role: SocketRole::Uplink,
            state: SocketState::Active,
            local_port: None,
        });
        Ok(())
    }

    async fn bind_downlink_port(&self, ctx: &ProfileContext, port: u16) -> Result<()> {
        ctx.mailboxes.socket_alloc.clear();
        ctx.channel
            .execute(&commands::allocate_listen(port), COMMAND_TIMEOUT)
            .await?;

        // Unlike the uplink open, the listen bind cannot guess: data
        // notices are matched against this id, so a wrong guess would
        // silently drop every downlink. No notice means no bind.
        let socket_id = match ctx
            .mailboxes
            .socket_alloc
            .wait(SOCKET_NOTICE_TIMEOUT, &ctx.cancel)
            .await
        {
            Ok(id) => id,
            Err(Error::Timeout { .. }) => {
                return Err(Error::Protocol(
                    "no allocation notice for listen socket".into(),
                ));
            }
            Err(e) => return Err(e),
        };

        ctx.channel
            .execute(&commands::activate_socket(socket_id), COMMAND_TIMEOUT)
            .await?;
        ctx.status.upsert_socket(SocketSession {
            socket_id,
            role: SocketRole::DownlinkListen,
            state: SocketState::Active,
            local_port: Some(port),
        });
        Ok(())
    }

    async fn send_uplink(&self, ctx: &ProfileContext, text: &str) -> Result<()> {
        let socket_id = self.uplink_socket.load(Ordering::SeqCst);
        if socket_id == 0 {
            return Err(Error::NotConnected);
        }
        let hex = encode_hex_upper(text.as_bytes());
        ctx.channel
            .execute(
                &commands::send_data(socket_id, text.len(), &hex),
                COMMAND_TIMEOUT,
            )
            .await?;
        Ok(())
    }

    async fn receive_downlink(&self, ctx: &ProfileContext) -> Result<Option<DownlinkMessage>> {
        let Some(socket_id) = ctx.status.listen_socket_id() else {
            debug!("receive trigger with no listen socket bound");
            return Ok(None);
        };

        let mut hex = String::new();
        let mut source: Option<(String, u16)> = None;
        loop {
            // Clear before issuing: the data notice can arrive interleaved
            // with the command's own reply, before we start waiting.
            ctx.mailboxes.socket_data.clear();
            ctx.channel
                .execute(&commands::receive_data(socket_id), COMMAND_TIMEOUT)
                .await?;
            let chunk = ctx
                .mailboxes
                .socket_data
                .wait(DATA_NOTICE_TIMEOUT, &ctx.cancel)
                .await?;

            if source.is_none() {
                if let Some(ip) = &chunk.source_ip {
                    if !ip.starts_with(&ctx.config.allowed_source_prefix) {
                        warn!(from = %ip, "dropping downlink from outside allowed subnet");
                        return Ok(None);
                    }
                    source = Some((ip.clone(), chunk.source_port.unwrap_or(0)));
                }
            }

            hex.push_str(&chunk.hex_payload);
            if !chunk.more {
                break;
            }
        }

        if hex.is_empty() {
            return Ok(None);
        }
        let payload = decode_hex(&hex)?;
        let (source_ip, source_port) = source.unwrap_or_default();
        Ok(Some(DownlinkMessage {
            source_ip,
            source_port,
            payload,
            received_at: Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modemlink_core::command::CommandRunner;
    use modemlink_core::config::ProfileConfig;
    use modemlink_core::mailbox::Mailboxes;
    use modemlink_core::status::ModemStatus;
    use modemlink_core::types::{GnssFix, SocketDataChunk};
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
    fn registration_notice_leads_with_stat() {
        let profile = MurataProfile::new();
        assert_eq!(
            profile.parse_registration_notice("+CEREG: 5,\"262A\",\"002F6A03\",9"),
            Some(RegistrationStatus::RegisteredRoaming)
        );
        assert_eq!(
            profile.parse_registration_notice("+CEREG: 2"),
            Some(RegistrationStatus::Searching)
        );
        assert_eq!(profile.parse_registration_notice("%BOOTEV:0"), None);
        assert_eq!(profile.parse_registration_notice("OK"), None);
    }

    #[test]
    fn registration_query_reply_is_ignored() {
        let profile = MurataProfile::new();
        // `<n>,<stat>` from a raw `AT+CEREG?`; reading the mode as a stat
        // would flip a registered session to Searching.
        assert_eq!(profile.parse_registration_notice("+CEREG: 2,5"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn init_runs_all_phases_with_resets() {
        let runner = Arc::new(MockCommandRunner::new());
        for line in commands::BOOT_NOTICE_SETUP {
            runner.expect_ok(line, &[]);
        }
        runner.expect_timeout(commands::RESET);
        for line in commands::RADIO_POLICY_SETUP {
            runner.expect_ok(line, &[]);
        }
        runner.expect_timeout(commands::RESET);
        for line in commands::NTN_RAT_SETUP {
            runner.expect_ok(line, &[]);
        }
        for line in commands::GNSS_SETUP {
            runner.expect_ok(line, &[]);
        }
        for line in commands::REGISTRATION_SETUP {
            runner.expect_ok(line, &[]);
        }

        let ctx = ctx(runner.clone());
        let mailboxes = ctx.mailboxes.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            mailboxes.boot.put(());
            tokio::time::sleep(Duration::from_millis(10)).await;
            mailboxes.boot.put(());
            tokio::time::sleep(Duration::from_millis(10)).await;
            mailboxes.gnss_fix.put(GnssFix {
                latitude: 35.6,
                longitude: 139.7,
            });
        });

        MurataProfile::new().initialize_network(&ctx).await.unwrap();
        assert_eq!(runner.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn init_fails_without_gnss_fix() {
        let runner = Arc::new(MockCommandRunner::new());
        for line in commands::BOOT_NOTICE_SETUP {
            runner.expect_ok(line, &[]);
        }
        runner.expect_timeout(commands::RESET);
        for line in commands::RADIO_POLICY_SETUP {
            runner.expect_ok(line, &[]);
        }
        runner.expect_timeout(commands::RESET);
        for line in commands::NTN_RAT_SETUP {
            runner.expect_ok(line, &[]);
        }
        for line in commands::GNSS_SETUP {
            runner.expect_ok(line, &[]);
        }

        let ctx = ctx(runner);
        let mailboxes = ctx.mailboxes.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            mailboxes.boot.put(());
            tokio::time::sleep(Duration::from_millis(10)).await;
            mailboxes.boot.put(());
            // No fix ever.
        });

        let err = MurataProfile::new()
            .initialize_network(&ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn pdp_activation_is_ping_verified() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.expect_ok("AT+CGDCONT=1,\"IP\",\"soracom.io\"", &[]);
        runner.expect_ok("AT%PINGCMD=0,\"100.127.100.127\",1,50,30", &[]);

        let ctx = ctx(runner);
        let mailboxes = ctx.mailboxes.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            mailboxes
                .ping
                .put("%PINGCMD: 0,\"100.127.100.127\",248".to_string());
        });

        MurataProfile::new().activate_pdp_context(&ctx).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn pdp_activation_fails_without_ping_result() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.expect_ok("AT+CGDCONT=1,\"IP\",\"soracom.io\"", &[]);
        runner.expect_ok("AT%PINGCMD=0,\"100.127.100.127\",1,50,30", &[]);

        let ctx = ctx(runner);
        let err = MurataProfile::new()
            .activate_pdp_context(&ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn open_uses_allocated_socket_id() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.expect_ok("AT%SOCKETEV=0,1", &[]);
        runner.expect_ok(
            "AT%SOCKETCMD=\"ALLOCATE\",1,\"UDP\",\"OPEN\",\"harvest.soracom.io\",8514",
            &[],
        );
        runner.expect_ok("AT%SOCKETCMD=\"ACTIVATE\",3", &[]);

        let ctx = ctx(runner.clone());
        let mailboxes = ctx.mailboxes.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            mailboxes.socket_alloc.put(3);
        });

        let profile = MurataProfile::new();
        profile.open_uplink_socket(&ctx).await.unwrap();
        assert_eq!(runner.remaining(), 0);
        assert_eq!(profile.uplink_socket.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn open_falls_back_to_socket_one_without_notice() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.expect_ok("AT%SOCKETEV=0,1", &[]);
        runner.expect_ok(
            "AT%SOCKETCMD=\"ALLOCATE\",1,\"UDP\",\"OPEN\",\"harvest.soracom.io\",8514",
            &[],
        );
        runner.expect_ok("AT%SOCKETCMD=\"ACTIVATE\",1", &[]);

        let ctx = ctx(runner.clone());
        let profile = MurataProfile::new();
        profile.open_uplink_socket(&ctx).await.unwrap();
        assert_eq!(profile.uplink_socket.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn bind_fails_without_allocation_notice() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.expect_ok(
            "AT%SOCKETCMD=\"ALLOCATE\",1,\"UDP\",\"LISTEN\",\"0.0.0.0\",,55555",
            &[],
        );

        let ctx = ctx(runner);
        let err = MurataProfile::new()
            .bind_downlink_port(&ctx, 55555)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(ctx.status.listen_socket_id().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn bind_registers_listen_socket() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.expect_ok(
            "AT%SOCKETCMD=\"ALLOCATE\",1,\"UDP\",\"LISTEN\",\"0.0.0.0\",,55555",
            &[],
        );
        runner.expect_ok("AT%SOCKETCMD=\"ACTIVATE\",2", &[]);

        let ctx = ctx(runner);
        let mailboxes = ctx.mailboxes.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            mailboxes.socket_alloc.put(2);
        });

        MurataProfile::new()
            .bind_downlink_port(&ctx, 55555)
            .await
            .unwrap();
        assert_eq!(ctx.status.listen_socket_id(), Some(2));
        assert_eq!(ctx.status.socket(2).unwrap().local_port, Some(55555));
    }

    #[tokio::test]
    async fn send_uplink_hex_encodes() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.expect_ok("AT%SOCKETDATA=\"SEND\",1,2,\"6869\"", &[]);

        let ctx = ctx(runner.clone());
        let profile = MurataProfile::new();
        profile.uplink_socket.store(1, Ordering::SeqCst);
        profile.send_uplink(&ctx, "hi").await.unwrap();
        assert_eq!(runner.remaining(), 0);
    }

    #[tokio::test]
    async fn send_uplink_requires_open_socket() {
        let runner = Arc::new(MockCommandRunner::new());
        let ctx = ctx(runner);
        let err = MurataProfile::new()
            .send_uplink(&ctx, "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test(start_paused = true)]
    async fn receive_reassembles_chunks() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.expect_ok("AT%SOCKETDATA=\"RECEIVE\",2,1500", &[]);
        runner.expect_ok("AT%SOCKETDATA=\"RECEIVE\",2,1500", &[]);

        let ctx = ctx(runner);
        ctx.status.upsert_socket(SocketSession {
            socket_id: 2,
            role: SocketRole::DownlinkListen,
            state: SocketState::Active,
            local_port: Some(55555),
        });

        let mailboxes = ctx.mailboxes.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            mailboxes.socket_data.put(SocketDataChunk {
                socket_id: 2,
                length: 1,
                more: true,
                hex_payload: "41".to_string(),
                source_ip: Some("100.127.10.16".to_string()),
                source_port: Some(8514),
            });
            tokio::time::sleep(Duration::from_millis(10)).await;
            mailboxes.socket_data.put(SocketDataChunk {
                socket_id: 2,
                length: 1,
                more: false,
                hex_payload: "42".to_string(),
                source_ip: None,
                source_port: None,
            });
        });

        let message = MurataProfile::new()
            .receive_downlink(&ctx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.payload, b"AB");
        assert_eq!(message.source_ip, "100.127.10.16");
        assert_eq!(message.source_port, 8514);
    }

    #[tokio::test(start_paused = true)]
    async fn receive_filters_foreign_subnet() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.expect_ok("AT%SOCKETDATA=\"RECEIVE\",2,1500", &[]);

        let ctx = ctx(runner);
        ctx.status.upsert_socket(SocketSession {
            socket_id: 2,
            role: SocketRole::DownlinkListen,
            state: SocketState::Active,
            local_port: Some(55555),
        });

        let mailboxes = ctx.mailboxes.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            mailboxes.socket_data.put(SocketDataChunk {
                socket_id: 2,
                length: 4,
                more: false,
                hex_payload: "6576696C".to_string(),
                source_ip: Some("203.0.113.9".to_string()),
                source_port: Some(4242),
            });
        });

        let message = MurataProfile::new().receive_downlink(&ctx).await.unwrap();
        assert!(message.is_none());
    }

    #[tokio::test]
    async fn receive_without_listen_socket_is_empty() {
        let runner = Arc::new(MockCommandRunner::new());
        let ctx = ctx(runner);
        let message = MurataProfile::new().receive_downlink(&ctx).await.unwrap();
        assert!(message.is_none());
    }

    #[tokio::test]
    async fn meas_query_parses_report() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.expect_ok(
            "AT%MEAS=\"8\"",
            &["RSRP = -100, RSRQ = -12, SINR = 4, RSSI = -95"],
        );

        let ctx = ctx(runner);
        let quality = MurataProfile::new()
            .query_signal_quality(&ctx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(quality.rsrp, -100);
        assert_eq!(quality.rsrq, -12);
        assert_eq!(quality.sinr, 4);
        assert_eq!(quality.rssi, -95);
    }
}
