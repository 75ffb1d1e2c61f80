//! modemlink-murata: device profile for the Murata Type 1SC modem in
//! non-terrestrial (NTN) configuration.
//!
//! This family is the stateful one: sockets are allocated and activated by
//! id, payloads travel hex-encoded, large datagrams arrive in chunks, and
//! several operations complete out of band via unsolicited notices. Boot,
//! GNSS fix, ping verification, and socket allocation all pair a command
//! with a later notification through the session mailboxes.

pub mod commands;
pub mod profile;

pub use profile::MurataProfile;
