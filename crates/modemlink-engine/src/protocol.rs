//! Line framing and classification for the AT command protocol.
//!
//! The modem speaks `\r\n`-terminated ASCII lines. Every received line is
//! either part of a command response (including the `OK`/`ERROR` terminals)
//! or an unsolicited result code (URC). URCs are recognized by their sigil:
//! lines starting with `+` or `%` are notifications, with the exception of
//! `+CME ERROR:`/`+CMS ERROR:`, which are failure terminals despite the
//! sigil. Lines starting with `#` are data responses (Nordic AT shell).

use bytes::BytesMut;

/// How a received line participates in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// An unsolicited notification; routed to the event stream.
    Urc,
    /// The `OK` terminal; the in-flight command succeeded.
    SuccessTerminal,
    /// `ERROR` / `+CME ERROR:` / `+CMS ERROR:`; the command failed.
    FailureTerminal,
    /// Any other line; accumulated into the in-flight command's response.
    Response,
}

/// Classify one complete, trimmed line.
pub fn classify(line: &str) -> LineKind {
    if line == "OK" {
        return LineKind::SuccessTerminal;
    }
    if line == "ERROR"
        || line.starts_with("ERROR:")
        || line.starts_with("+CME ERROR:")
        || line.starts_with("+CMS ERROR:")
    {
        return LineKind::FailureTerminal;
    }
    if line.starts_with('+') || line.starts_with('%') {
        return LineKind::Urc;
    }
    LineKind::Response
}

/// Remove and return the next complete line from the receive buffer.
///
/// Handles both `\r\n` and bare `\n` terminators, skips empty lines, and
/// leaves any trailing partial line in place for the next read. Non-UTF-8
/// bytes are replaced rather than dropped.
pub fn take_line(buf: &mut BytesMut) -> Option<String> {
    loop {
        let pos = buf.iter().position(|&b| b == b'\n')?;
        let raw = buf.split_to(pos + 1);
        let line = String::from_utf8_lossy(&raw[..pos]);
        let line = line.trim_end_matches('\r').trim();
        if !line.is_empty() {
            return Some(line.to_string());
        }
    }
}

/// One field of a comma-separated notification body, tracking whether it
/// was double-quoted on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub text: String,
    pub quoted: bool,
}

/// Split a notification body on commas, honoring double quotes.
///
/// Quotes are stripped from the field text. Empty fields are preserved
/// (some commands use consecutive commas for defaulted parameters).
pub fn split_fields(body: &str) -> Vec<Field> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;

    for ch in body.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            ',' if !in_quotes => {
                fields.push(Field {
                    text: current.trim().to_string(),
                    quoted,
                });
                current.clear();
                quoted = false;
            }
            _ => current.push(ch),
        }
    }
    fields.push(Field {
        text: current.trim().to_string(),
        quoted,
    });
    fields
}
