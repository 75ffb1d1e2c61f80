//! The phased network bring-up sequencer.
//!
//! Phases run strictly in order; a failure halts the sequence in place and
//! is reported as [`Error::BringupPhase`] naming the phase. There are no
//! automatic retries: the caller decides whether to tear down and start
//! over.
//!
//! Registration is waited for passively. The device announces registration
//! through notices processed by the router; the sequencer never polls with
//! a query command.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{info, warn};

use modemlink_core::error::{Error, Result};
use modemlink_core::events::{LogEntry, ModemEvent};
use modemlink_core::profile::{DeviceProfile, ProfileContext};
use modemlink_core::types::{BringupPhase, ConnectionState};

/// Timeout for the initial `AT` handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Drives a device profile through the bring-up phases.
pub struct BringupSequencer {
    profile: Arc<dyn DeviceProfile>,
    ctx: ProfileContext,
    events: broadcast::Sender<ModemEvent>,
    log: broadcast::Sender<LogEntry>,
}

impl BringupSequencer {
    pub fn new(
        profile: Arc<dyn DeviceProfile>,
        ctx: ProfileContext,
        events: broadcast::Sender<ModemEvent>,
        log: broadcast::Sender<LogEntry>,
    ) -> Self {
        Self {
            profile,
            ctx,
            events,
            log,
        }
    }

    /// Run the full bring-up sequence.
    pub async fn run(&self) -> Result<()> {
        self.ctx
            .status
            .set_connection_state(ConnectionState::Initializing);
        let _ = self.events.send(ModemEvent::ConnectionStateChanged {
            state: ConnectionState::Initializing,
        });

        self.enter(BringupPhase::Handshaking);
        self.step(BringupPhase::Handshaking, async {
            self.ctx.channel.execute("AT", HANDSHAKE_TIMEOUT).await?;
            Ok(())
        })
        .await?;

        self.enter(BringupPhase::CellularRegistering);
        self.step(BringupPhase::CellularRegistering, async {
            self.profile.initialize_network(&self.ctx).await?;
            info!(
                timeout_s = self.profile.registration_timeout().as_secs(),
                "waiting for network registration notice"
            );
            self.ctx
                .status
                .wait_for_registration(self.profile.registration_timeout(), &self.ctx.cancel)
                .await
        })
        .await?;

        // Signal monitoring never gates bring-up: a failed subscription is
        // logged and the sequence continues.
        self.enter(BringupPhase::SignalMonitoring);
        if let Err(e) = self.profile.subscribe_signal_quality(&self.ctx).await {
            warn!(error = %e, "signal quality subscription failed, continuing");
            let _ = self.log.send(LogEntry::system(format!(
                "signal quality subscription failed: {e}"
            )));
        }

        self.enter(BringupPhase::PdpActivating);
        self.step(BringupPhase::PdpActivating, async {
            self.profile.activate_pdp_context(&self.ctx).await
        })
        .await?;

        self.enter(BringupPhase::SocketOpening);
        self.step(BringupPhase::SocketOpening, async {
            self.profile.open_uplink_socket(&self.ctx).await
        })
        .await?;

        self.enter(BringupPhase::PortBinding);
        self.step(BringupPhase::PortBinding, async {
            self.profile
                .bind_downlink_port(&self.ctx, self.ctx.config.downlink_port)
                .await
        })
        .await?;

        self.enter(BringupPhase::Ready);
        self.ctx.status.set_connection_state(ConnectionState::Ready);
        let _ = self.events.send(ModemEvent::ConnectionStateChanged {
            state: ConnectionState::Ready,
        });
        info!("network bring-up complete");
        Ok(())
    }

    fn enter(&self, phase: BringupPhase) {
        info!(%phase, "entering bring-up phase");
        self.ctx.status.set_phase(phase);
        let _ = self.events.send(ModemEvent::PhaseChanged { phase });
        let _ = self
            .log
            .send(LogEntry::system(format!("bring-up: {phase}")));
    }

    async fn step<F>(&self, phase: BringupPhase, fut: F) -> Result<()>
    where
        F: std::future::Future<Output = Result<()>>,
    {
        match fut.await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.ctx.status.set_phase(BringupPhase::Failed);
                self.ctx
                    .status
                    .set_connection_state(ConnectionState::Failed);
                let _ = self.events.send(ModemEvent::PhaseChanged {
                    phase: BringupPhase::Failed,
                });
                let _ = self.events.send(ModemEvent::ConnectionStateChanged {
                    state: ConnectionState::Failed,
                });
                Err(Error::BringupPhase {
                    phase,
                    reason: e.to_string(),
                })
            }
        }
    }
}
