//! End-to-end session tests for the Nordic family over a mock transport.
//!
//! The mock checks every sent line against an ordered script, so a passing
//! bring-up also proves the exact command sequence on the wire.

use std::sync::Arc;
use std::time::Duration;

use modemlink_core::config::ProfileConfig;
use modemlink_core::error::Error;
use modemlink_core::events::ModemEvent;
use modemlink_core::types::{BringupPhase, ConnectionState, RegistrationStatus};
use modemlink_engine::{IoConfig, ModemClient};
use modemlink_nordic::NordicProfile;
use modemlink_test_harness::MockTransport;

fn fast_io() -> IoConfig {
    IoConfig {
        settle_delay: Duration::from_millis(1),
        idle_read_timeout: Duration::from_millis(20),
    }
}

fn client(mock: MockTransport) -> ModemClient {
    ModemClient::connect_with_transport_and_io(
        Box::new(mock),
        Arc::new(NordicProfile::new()),
        ProfileConfig::default(),
        fast_io(),
    )
}

fn script_bringup(mock: &mut MockTransport) {
    mock.expect_command("AT", &["OK"]);
    mock.expect_command("AT+CFUN=0", &["OK"]);
    mock.expect_command("AT+CEREG=5", &["OK"]);
    mock.expect_command("AT+CSCON=1", &["OK"]);
    mock.expect_command("AT%XSYSTEMMODE=1,0,1,0", &["OK"]);
    mock.expect_command("AT+CFUN=1", &["OK"]);
    mock.expect_command("AT%CESQ=1", &["OK"]);
    mock.expect_command("AT+CGDCONT=1,\"IP\",\"soracom.io\"", &["OK"]);
    mock.expect_command("AT#XSOCKET=1,2,0", &["#XSOCKET: 0,2,17", "OK"]);
    mock.expect_command("AT#XBIND=55555", &["OK"]);
}

#[tokio::test]
async fn bringup_reaches_ready_and_sends() {
    let mut mock = MockTransport::new();
    // Registration arrives unsolicited on an idle read; the wait is
    // passive, so an early notice just means no wait at all.
    mock.push_unsolicited("+CEREG: 5,\"262A\",\"002F6A03\",7");
    script_bringup(&mut mock);
    mock.expect_command(
        "AT#XSENDTO=\"harvest.soracom.io\",8514,\"hello\"",
        &["#XSENDTO: 5", "OK"],
    );

    let client = client(mock);
    client.run_bringup().await.unwrap();

    let status = client.status();
    assert_eq!(status.connection, ConnectionState::Ready);
    assert_eq!(status.phase, BringupPhase::Ready);
    assert_eq!(status.registration, RegistrationStatus::RegisteredRoaming);

    client.send_message("hello").await.unwrap();
    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn bringup_halts_on_pdp_rejection() {
    let mut mock = MockTransport::new();
    mock.push_unsolicited("+CEREG: 1");
    mock.expect_command("AT", &["OK"]);
    mock.expect_command("AT+CFUN=0", &["OK"]);
    mock.expect_command("AT+CEREG=5", &["OK"]);
    mock.expect_command("AT+CSCON=1", &["OK"]);
    mock.expect_command("AT%XSYSTEMMODE=1,0,1,0", &["OK"]);
    mock.expect_command("AT+CFUN=1", &["OK"]);
    mock.expect_command("AT%CESQ=1", &["OK"]);
    mock.expect_command("AT+CGDCONT=1,\"IP\",\"soracom.io\"", &["+CME ERROR: 50"]);

    let client = client(mock);
    let err = client.run_bringup().await.unwrap_err();
    assert!(matches!(
        err,
        Error::BringupPhase {
            phase: BringupPhase::PdpActivating,
            ..
        }
    ));

    let status = client.status();
    assert_eq!(status.connection, ConnectionState::Failed);
    assert_eq!(status.phase, BringupPhase::Failed);

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn send_requires_ready_session() {
    let mock = MockTransport::new();
    let client = client(mock);

    // No bring-up: the command channel is live but the data path is not.
    let err = client.send_message("hello").await.unwrap_err();
    assert!(matches!(err, Error::NotConnected));

    let err = client.send_message("").await.unwrap_err();
    assert!(matches!(err, Error::InvalidParameter(_)));

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn rrc_connected_notice_drives_downlink_read() {
    let mut mock = MockTransport::new();
    mock.push_unsolicited("+CEREG: 5,\"262A\",\"002F6A03\",7");
    script_bringup(&mut mock);
    // A +CSCON connected notice interleaved with a probe command triggers
    // the session's receive loop, which issues the read as a normal
    // serialized command.
    mock.expect_command("AT", &["+CSCON: 1", "OK"]);
    mock.expect_command(
        "AT#XRECVFROM=256",
        &["#XRECVFROM: 5,\"100.127.10.16\",8514", "hello", "OK"],
    );

    let client = client(mock);
    let mut events = client.subscribe_events();
    client.run_bringup().await.unwrap();

    client.execute("AT", Duration::from_millis(500)).await.unwrap();

    let message = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Ok(ModemEvent::DownlinkReceived { message }) = events.recv().await {
                return message;
            }
        }
    })
    .await
    .expect("downlink event");

    assert_eq!(message.text(), "hello");
    assert_eq!(message.source_ip, "100.127.10.16");
    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn signal_notice_updates_status() {
    let mut mock = MockTransport::new();
    mock.push_unsolicited("+CEREG: 1");
    mock.push_unsolicited("%CESQ: 54,2,18,2");
    script_bringup(&mut mock);

    let client = client(mock);
    client.run_bringup().await.unwrap();

    let quality = client.status().signal.expect("signal sample");
    assert_eq!(quality.rsrp, -87);

    client.disconnect().await.unwrap();
}
