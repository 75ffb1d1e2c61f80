//! The modem session handle.
//!
//! [`ModemClient`] ties together the IO task, the notification router, the
//! downlink receive loop, and the bring-up sequencer. One client owns one
//! transport for its lifetime; `disconnect()` tears the whole session down,
//! waking every pending wait, and recovers the transport for closing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use modemlink_core::command::CommandRunner;
use modemlink_core::config::ProfileConfig;
use modemlink_core::error::{Error, Result};
use modemlink_core::events::{LogEntry, ModemEvent};
use modemlink_core::mailbox::Mailboxes;
use modemlink_core::profile::{DeviceProfile, ProfileContext};
use modemlink_core::status::{ModemStatus, StatusSnapshot};
use modemlink_core::transport::Transport;
use modemlink_core::types::{ConnectionState, DeviceInfo, DownlinkMessage};

use crate::io::{spawn_io_task, EngineIo, IoConfig};
use crate::router::{ReceiveTrigger, UrcRouter};
use crate::sequencer::BringupSequencer;

/// Capacity of the event broadcast channel.
const EVENT_CAPACITY: usize = 64;
/// Capacity of the traffic log broadcast channel.
const LOG_CAPACITY: usize = 256;

/// A live session with one modem.
pub struct ModemClient {
    io: Option<EngineIo>,
    profile: Arc<dyn DeviceProfile>,
    ctx: ProfileContext,
    events: broadcast::Sender<ModemEvent>,
    log: broadcast::Sender<LogEntry>,
    cancel: CancellationToken,
    router_task: Option<JoinHandle<()>>,
    receiver_task: Option<JoinHandle<()>>,
    fault_task: Option<JoinHandle<()>>,
}

impl ModemClient {
    /// Start a session over an already-open transport with default IO
    /// settings.
    pub fn connect_with_transport(
        transport: Box<dyn Transport>,
        profile: Arc<dyn DeviceProfile>,
        config: ProfileConfig,
    ) -> Self {
        Self::connect_with_transport_and_io(transport, profile, config, IoConfig::default())
    }

    /// Start a session over an already-open transport.
    ///
    /// Spawns the IO task, the notification router, and the downlink
    /// receive loop. The command channel is live immediately; the network
    /// data path requires [`run_bringup`](Self::run_bringup).
    pub fn connect_with_transport_and_io(
        transport: Box<dyn Transport>,
        profile: Arc<dyn DeviceProfile>,
        config: ProfileConfig,
        io_config: IoConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (log, _) = broadcast::channel(LOG_CAPACITY);
        let (urc_tx, urc_rx) = mpsc::unbounded_channel();
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();

        let io = spawn_io_task(transport, io_config, urc_tx, log.clone(), events.clone());
        let cancel = io.cancel.clone();

        let status = Arc::new(ModemStatus::new());
        let mailboxes = Arc::new(Mailboxes::new());
        let ctx = ProfileContext {
            channel: Arc::new(io.channel()) as Arc<dyn CommandRunner>,
            status: status.clone(),
            mailboxes: mailboxes.clone(),
            cancel: cancel.clone(),
            config: Arc::new(config),
        };

        let router = UrcRouter::new(
            profile.clone(),
            status.clone(),
            mailboxes,
            events.clone(),
            trigger_tx,
        );
        let router_task = tokio::spawn(router.run(urc_rx, cancel.clone()));

        let receiver_task = tokio::spawn(receive_loop(
            profile.clone(),
            ctx.clone(),
            trigger_rx,
            events.clone(),
            cancel.clone(),
        ));

        let fault_task = tokio::spawn(fault_watch(
            events.subscribe(),
            status.clone(),
            cancel.clone(),
        ));

        status.set_connection_state(ConnectionState::Connected);
        let _ = events.send(ModemEvent::ConnectionStateChanged {
            state: ConnectionState::Connected,
        });
        info!(device = profile.device_info().id, "modem session started");

        Self {
            io: Some(io),
            profile,
            ctx,
            events,
            log,
            cancel,
            router_task: Some(router_task),
            receiver_task: Some(receiver_task),
            fault_task: Some(fault_task),
        }
    }

    /// Which device family this session drives.
    pub fn device_info(&self) -> DeviceInfo {
        self.profile.device_info()
    }

    /// Run the full network bring-up sequence.
    pub async fn run_bringup(&self) -> Result<()> {
        let sequencer = BringupSequencer::new(
            self.profile.clone(),
            self.ctx.clone(),
            self.events.clone(),
            self.log.clone(),
        );
        sequencer.run().await
    }

    /// Send one text datagram to the uplink endpoint.
    pub async fn send_message(&self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Err(Error::InvalidParameter("empty message".into()));
        }
        if self.ctx.status.connection_state() != ConnectionState::Ready {
            return Err(Error::NotConnected);
        }
        self.profile.send_uplink(&self.ctx, text).await
    }

    /// Execute a raw AT command on the session's serialized channel.
    pub async fn execute(&self, line: &str, timeout: Duration) -> Result<String> {
        let response = self.ctx.channel.execute(line, timeout).await?;
        Ok(response.text())
    }

    /// Check the downlink listen socket for a pending message once.
    ///
    /// Downlink normally arrives through the event feed: device notices
    /// trigger reads and accepted messages surface as
    /// [`ModemEvent::DownlinkReceived`]. This entry point covers devices or
    /// deployments where an explicit poll is wanted, e.g. after a wake-up.
    /// Returns `Ok(None)` when nothing is pending or the message was
    /// filtered out by source.
    pub async fn receive_downlink(&self) -> Result<Option<DownlinkMessage>> {
        self.profile.receive_downlink(&self.ctx).await
    }

    /// A point-in-time copy of the session status.
    pub fn status(&self) -> StatusSnapshot {
        self.ctx.status.snapshot()
    }

    /// Subscribe to modem events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ModemEvent> {
        self.events.subscribe()
    }

    /// Subscribe to the traffic log.
    pub fn subscribe_log(&self) -> broadcast::Receiver<LogEntry> {
        self.log.subscribe()
    }

    /// Tear the session down.
    ///
    /// Recovers the transport from the IO task, cancels the session token
    /// (waking every pending mailbox and registration wait with
    /// [`Error::Cancelled`]), and closes the transport.
    pub async fn disconnect(mut self) -> Result<()> {
        info!("disconnecting modem session");

        // Recover the transport before cancelling: the IO task replies to
        // Shutdown only while it is still running.
        let transport = match self.io.take() {
            Some(io) => io.shutdown().await.ok(),
            None => None,
        };

        self.cancel.cancel();
        if let Some(task) = self.router_task.take() {
            let _ = task.await;
        }
        if let Some(task) = self.receiver_task.take() {
            let _ = task.await;
        }
        if let Some(task) = self.fault_task.take() {
            let _ = task.await;
        }

        self.ctx
            .status
            .set_connection_state(ConnectionState::Disconnected);
        let _ = self.events.send(ModemEvent::Disconnected);

        if let Some(mut transport) = transport {
            transport.close().await?;
        }
        Ok(())
    }
}

impl Drop for ModemClient {
    fn drop(&mut self) {
        // Belt and braces for sessions dropped without disconnect().
        self.cancel.cancel();
    }
}

/// Consumes receive triggers and issues downlink reads.
///
/// Runs outside the router so the follow-up read commands queue on the
/// normal serialized channel rather than blocking notification processing.
async fn receive_loop(
    profile: Arc<dyn DeviceProfile>,
    ctx: ProfileContext,
    mut triggers: mpsc::UnboundedReceiver<ReceiveTrigger>,
    events: broadcast::Sender<ModemEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            trigger = triggers.recv() => {
                if trigger.is_none() {
                    break;
                }
                match profile.receive_downlink(&ctx).await {
                    Ok(Some(message)) => {
                        info!(
                            from = %message.source_ip,
                            port = message.source_port,
                            bytes = message.payload.len(),
                            "downlink message received"
                        );
                        let _ = events.send(ModemEvent::DownlinkReceived { message });
                    }
                    Ok(None) => {
                        debug!("downlink check found nothing acceptable");
                    }
                    Err(Error::Cancelled) => break,
                    Err(e) => {
                        warn!(error = %e, "downlink receive failed");
                    }
                }
            }
        }
    }
    debug!("downlink receive loop stopped");
}

/// Mirrors transport faults into the status store so `status()` can report
/// the last failure after the session dies.
async fn fault_watch(
    mut events: broadcast::Receiver<ModemEvent>,
    status: Arc<ModemStatus>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Ok(ModemEvent::TransportFault { detail }) => {
                    status.set_last_fault(detail);
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}
