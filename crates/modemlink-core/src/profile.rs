//! The unified device profile trait.
//!
//! [`DeviceProfile`] is the seam between the family-agnostic engine and a
//! modem family's AT dialect. The engine drives bring-up and the data path
//! through this trait; each backend crate implements it with its family's
//! actual wire commands.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::command::CommandRunner;
use crate::config::ProfileConfig;
use crate::error::Result;
use crate::mailbox::Mailboxes;
use crate::status::ModemStatus;
use crate::types::{DeviceInfo, DownlinkMessage, RegistrationStatus, SignalQuality};

/// Everything a profile operation needs from the running session.
///
/// Cheap to clone; all members are shared handles.
#[derive(Clone)]
pub struct ProfileContext {
    /// Serialized command execution.
    pub channel: Arc<dyn CommandRunner>,
    /// Shared session status.
    pub status: Arc<ModemStatus>,
    /// Out-of-band notification mailboxes.
    pub mailboxes: Arc<Mailboxes>,
    /// Cancelled when the session disconnects; aborts pending waits.
    pub cancel: CancellationToken,
    /// Network endpoints and filters.
    pub config: Arc<ProfileConfig>,
}

impl std::fmt::Debug for ProfileContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileContext")
            .field("cancel", &self.cancel.is_cancelled())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// One modem family's AT dialect behind a uniform async interface.
///
/// Implementations must be stateless where the family allows it; families
/// that track device-side state (socket ids, chunk reassembly) keep it in
/// interior mutability so the engine can hold the profile behind an `Arc`.
#[async_trait]
pub trait DeviceProfile: Send + Sync {
    /// Static identification for this family.
    fn device_info(&self) -> DeviceInfo;

    /// How long [`ModemStatus::wait_for_registration`] should wait for this
    /// family. Terrestrial families register in seconds; NTN families may
    /// legitimately take minutes.
    fn registration_timeout(&self) -> Duration;

    /// Parses a registration notice line if this family recognizes it.
    ///
    /// Returns `None` for lines that are not registration notices, and for
    /// query replies that merely echo configuration.
    fn parse_registration_notice(&self, line: &str) -> Option<RegistrationStatus>;

    /// Family-specific radio configuration, up to (but not including)
    /// waiting for network registration.
    async fn initialize_network(&self, ctx: &ProfileContext) -> Result<()>;

    /// Subscribes to unsolicited signal quality notifications.
    async fn subscribe_signal_quality(&self, ctx: &ProfileContext) -> Result<()>;

    /// Synchronously queries current signal quality.
    ///
    /// Returns `Ok(None)` when the family reports signal quality only via
    /// notifications.
    async fn query_signal_quality(&self, ctx: &ProfileContext) -> Result<Option<SignalQuality>>;

    /// Activates the packet data context, verifying it is actually usable
    /// where the family supports that.
    async fn activate_pdp_context(&self, ctx: &ProfileContext) -> Result<()>;

    /// Opens the uplink datagram socket toward the configured endpoint.
    async fn open_uplink_socket(&self, ctx: &ProfileContext) -> Result<()>;

    /// Binds the local downlink listen port.
    async fn bind_downlink_port(&self, ctx: &ProfileContext, port: u16) -> Result<()>;

    /// Sends one text datagram to the uplink endpoint.
    async fn send_uplink(&self, ctx: &ProfileContext, text: &str) -> Result<()>;

    /// Retrieves one pending downlink datagram, reassembling chunks where
    /// the family delivers data in pieces.
    ///
    /// Returns `Ok(None)` when nothing (acceptable) is pending, including
    /// datagrams dropped by source filtering.
    async fn receive_downlink(&self, ctx: &ProfileContext) -> Result<Option<DownlinkMessage>>;
}
