//! Test harness for modemlink.
//!
//! Provides two levels of test double:
//!
//! - [`MockTransport`]: byte-level, for testing the command engine's line
//!   framing, terminal detection, and unsolicited-line routing
//! - [`MockCommandRunner`]: line-level, for testing device profiles and the
//!   bring-up sequencer without an engine underneath

pub mod mock_runner;
pub mod mock_serial;

pub use mock_runner::MockCommandRunner;
pub use mock_serial::MockTransport;
