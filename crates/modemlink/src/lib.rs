//! # modemlink -- Async Cellular Modem Control
//!
//! `modemlink` is an asynchronous Rust library for driving cellular IoT
//! modems over a serial AT command channel. It handles the parts every AT
//! modem integration ends up reinventing: serializing commands onto a
//! half-duplex line, demultiplexing unsolicited notifications out of the
//! response stream, sequencing the multi-phase network bring-up, and moving
//! UDP datagrams up and down once the network is live.
//!
//! ## Quick Start
//!
//! ```no_run
//! use modemlink::{connect, DeviceFamily, ModemEvent, ProfileConfig};
//!
//! #[tokio::main]
//! async fn main() -> modemlink::Result<()> {
//!     let client = connect(
//!         "/dev/ttyUSB0",
//!         115_200,
//!         DeviceFamily::Nordic,
//!         ProfileConfig::default(),
//!     )
//!     .await?;
//!
//!     let mut events = client.subscribe_events();
//!     client.run_bringup().await?;
//!     client.send_message("hello from the field").await?;
//!
//!     while let Ok(event) = events.recv().await {
//!         if let ModemEvent::DownlinkReceived { message } = event {
//!             println!("downlink: {}", message.text());
//!             break;
//!         }
//!     }
//!     client.disconnect().await
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate                 | Purpose                                         |
//! |-----------------------|-------------------------------------------------|
//! | `modemlink-core`      | Traits ([`DeviceProfile`], [`Transport`]), types, errors |
//! | `modemlink-transport` | Serial transport implementation                 |
//! | `modemlink-engine`    | Command IO task, notification router, bring-up sequencer |
//! | `modemlink-nordic`    | Nordic nRF91 AT shell dialect (stateless ASCII) |
//! | `modemlink-murata`    | Murata Type 1SC NTN dialect (stateful, hex payloads) |
//! | **`modemlink`**       | This facade crate -- re-exports everything      |
//!
//! Both device backends implement the [`DeviceProfile`] trait, so
//! application code works with `dyn DeviceProfile` and stays
//! family-agnostic.
//!
//! ## Feature Flags
//!
//! Each device backend is gated behind a feature flag:
//!
//! | Feature  | Enables                          | Default |
//! |----------|----------------------------------|---------|
//! | `nordic` | [`nordic`] module                | yes     |
//! | `murata` | [`murata`] module                | yes     |
//! | `full`   | All device backends              | no      |

use std::str::FromStr;
use std::sync::Arc;

pub use modemlink_core::*;

pub use modemlink_engine::ModemClient;
pub use modemlink_transport::SerialTransport;

/// Engine internals, for integrations that assemble their own session.
pub mod engine {
    pub use modemlink_engine::*;
}

/// Serial transport configuration.
pub mod transport {
    pub use modemlink_transport::*;
}

/// Nordic nRF91 AT shell backend.
///
/// Provides [`NordicProfile`](nordic::NordicProfile) for the Thingy:91 X
/// and similar devices running the serial LTE modem application.
#[cfg(feature = "nordic")]
pub mod nordic {
    pub use modemlink_nordic::*;
}

/// Murata Type 1SC NTN backend.
///
/// Provides [`MurataProfile`](murata::MurataProfile) for the Type 1SC in
/// NB-NTN configuration, with its stateful socket model and hex-encoded
/// payloads.
#[cfg(feature = "murata")]
pub mod murata {
    pub use modemlink_murata::*;
}

/// The supported modem families.
///
/// Closed by construction: adding a family means adding a variant here and
/// a backend crate behind it, so an unknown family can never get half-way
/// through bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFamily {
    /// Nordic nRF91 series (Thingy:91 X).
    Nordic,
    /// Murata Type 1SC, NB-NTN configuration.
    Murata,
}

impl std::fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Nordic => "nordic",
            Self::Murata => "murata",
        };
        f.write_str(s)
    }
}

impl FromStr for DeviceFamily {
    type Err = Error;

    /// Accepts the canonical family id plus common aliases, case
    /// insensitively.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nordic" | "nordic_thingy91x" | "thingy91x" | "thingy" => Ok(Self::Nordic),
            "murata" | "murata_type1sc" | "type1sc" => Ok(Self::Murata),
            other => Err(Error::UnsupportedFamily(format!(
                "{other} (supported: nordic, murata)"
            ))),
        }
    }
}

/// Builds the device profile for a family.
///
/// Fails with [`Error::UnsupportedFamily`] when the family's backend was
/// disabled at build time.
pub fn create_profile(family: DeviceFamily) -> Result<Arc<dyn DeviceProfile>> {
    match family {
        #[cfg(feature = "nordic")]
        DeviceFamily::Nordic => Ok(Arc::new(nordic::NordicProfile::new())),
        #[cfg(not(feature = "nordic"))]
        DeviceFamily::Nordic => Err(Error::UnsupportedFamily(
            "nordic backend not enabled".into(),
        )),
        #[cfg(feature = "murata")]
        DeviceFamily::Murata => Ok(Arc::new(murata::MurataProfile::new())),
        #[cfg(not(feature = "murata"))]
        DeviceFamily::Murata => Err(Error::UnsupportedFamily(
            "murata backend not enabled".into(),
        )),
    }
}

/// Returns identification for every family whose backend is enabled.
pub fn supported_families() -> Vec<DeviceInfo> {
    let mut families = Vec::new();

    #[cfg(feature = "nordic")]
    families.push(nordic::NordicProfile::new().device_info());

    #[cfg(feature = "murata")]
    families.push(murata::MurataProfile::new().device_info());

    families
}

/// Opens a serial port and starts a modem session on it.
///
/// The command channel is live on return; call
/// [`run_bringup`](ModemClient::run_bringup) to bring the network up.
pub async fn connect(
    port: &str,
    baud_rate: u32,
    family: DeviceFamily,
    config: ProfileConfig,
) -> Result<ModemClient> {
    let transport = SerialTransport::open(port, baud_rate).await?;
    let profile = create_profile(family)?;
    Ok(ModemClient::connect_with_transport(
        Box::new(transport),
        profile,
        config,
    ))
}
