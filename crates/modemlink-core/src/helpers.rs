//! Small wire-format helpers shared by device profiles.

use crate::error::{Error, Result};

/// Encodes bytes as uppercase hex, the form stateful-dialect modems expect
/// in socket-data commands.
pub fn encode_hex_upper(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for b in data {
        out.push(char::from_digit((b >> 4) as u32, 16).unwrap_or('0').to_ascii_uppercase());
        out.push(char::from_digit((b & 0x0f) as u32, 16).unwrap_or('0').to_ascii_uppercase());
    }
    out
}

/// Decodes a hex string (either case) into bytes.
///
/// Returns [`Error::Protocol`] on odd length or a non-hex digit.
pub fn decode_hex(hex: &str) -> Result<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return Err(Error::Protocol(format!(
            "odd-length hex payload ({} chars)",
            hex.len()
        )));
    }
    let bytes = hex.as_bytes();
    let mut out = Vec::with_capacity(hex.len() / 2);
    for pair in bytes.chunks_exact(2) {
        let hi = (pair[0] as char)
            .to_digit(16)
            .ok_or_else(|| Error::Protocol(format!("invalid hex digit {:?}", pair[0] as char)))?;
        let lo = (pair[1] as char)
            .to_digit(16)
            .ok_or_else(|| Error::Protocol(format!("invalid hex digit {:?}", pair[1] as char)))?;
        out.push(((hi << 4) | lo) as u8);
    }
    Ok(out)
}

/// Converts a raw 3GPP rsrp index to dBm.
///
/// The index is offset by 141 (TS 36.133); 255 means "not known or not
/// detectable" and maps to `None`.
pub fn rsrp_raw_to_dbm(raw: i32) -> Option<i32> {
    if raw == 255 {
        None
    } else {
        Some(raw - 141)
    }
}
