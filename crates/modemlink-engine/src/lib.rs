//! modemlink-engine: the family-agnostic half of a modem session.
//!
//! One tokio task owns the transport exclusively and processes all AT
//! command/response exchanges; unsolicited notification lines are demuxed
//! onto a separate stream and routed to status, mailboxes, and the event
//! feed. On top of that sit the bring-up sequencer and the [`ModemClient`]
//! session handle.
//!
//! Layering:
//!
//! - [`io`] -- the IO task (line framing, terminal detection, settle delay)
//! - [`channel`] -- cloneable [`CommandChannel`] handle over the IO task
//! - [`router`] -- unsolicited line classification and routing
//! - [`sequencer`] -- the phased network bring-up state machine
//! - [`client`] -- ties the above together into one session

pub mod channel;
pub mod client;
pub mod io;
pub mod protocol;
pub mod router;
pub mod sequencer;

pub use channel::CommandChannel;
pub use client::ModemClient;
pub use io::{spawn_io_task, EngineIo, IoConfig};
pub use router::UrcRouter;
pub use sequencer::BringupSequencer;
