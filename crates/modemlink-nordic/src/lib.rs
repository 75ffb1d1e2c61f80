//! modemlink-nordic: device profile for Nordic nRF91-series modems
//! (Thingy:91 X and similar) running the serial LTE modem AT shell.
//!
//! This family is the simple one: every data-path operation is a single
//! command with an inline ASCII payload, and the device manages no socket
//! state beyond one open UDP socket plus one bound port.

pub mod commands;
pub mod profile;

pub use profile::NordicProfile;
