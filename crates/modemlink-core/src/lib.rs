//! modemlink-core: Core traits, types, and error definitions for modemlink.
//!
//! This crate defines the device-family-agnostic abstractions that all
//! modemlink backends implement. Applications depend on these types without
//! pulling in any specific modem driver.
//!
//! # Key types
//!
//! - [`DeviceProfile`] -- the unified trait for a modem family's AT dialect
//! - [`Transport`] -- byte-level communication channel
//! - [`CommandRunner`] -- serialized AT command execution
//! - [`ModemEvent`] / [`LogEntry`] -- asynchronous notifications and the
//!   consumer-facing traffic log
//! - [`Error`] / [`Result`] -- error handling

pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod helpers;
pub mod mailbox;
pub mod profile;
pub mod status;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use modemlink_core::*`.
pub use command::{CommandResponse, CommandRunner};
pub use config::ProfileConfig;
pub use error::{Error, Result};
pub use events::{LogEntry, LogOrigin, ModemEvent};
pub use helpers::{decode_hex, encode_hex_upper, rsrp_raw_to_dbm};
pub use mailbox::{Mailbox, Mailboxes};
pub use profile::{DeviceProfile, ProfileContext};
pub use status::{ModemStatus, StatusSnapshot};
pub use transport::Transport;
pub use types::*;
