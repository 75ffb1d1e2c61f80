//! Transport implementations for modemlink.
//!
//! This crate provides concrete implementations of the
//! [`Transport`](modemlink_core::Transport) trait from `modemlink-core`:
//!
//! - [`SerialTransport`]: USB virtual COM ports and RS-232 serial connections
//!
//! # Example
//!
//! ```no_run
//! use modemlink_transport::SerialTransport;
//! use modemlink_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> modemlink_core::Result<()> {
//! // Connect to a modem's AT command port
//! let mut transport = SerialTransport::open("/dev/ttyUSB0", 115200).await?;
//!
//! // Probe the command channel
//! transport.send(b"AT\r\n").await?;
//!
//! // Receive response
//! let mut buf = [0u8; 256];
//! let n = transport.receive(&mut buf, Duration::from_secs(1)).await?;
//! # Ok(())
//! # }
//! ```

pub mod serial;

pub use serial::{DataBits, FlowControl, Parity, SerialConfig, SerialTransport, StopBits};
