//! Serialized AT command execution.
//!
//! Device profiles are written against [`CommandRunner`] rather than a
//! concrete command engine, so they can be unit-tested with a scripted
//! runner from the test harness.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// The accumulated response to one AT command.
///
/// Contains every non-terminal response line the device emitted between the
/// command and its terminal `OK`, in arrival order. Unsolicited notifications
/// that arrived during the exchange are routed elsewhere and never appear
/// here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResponse {
    /// Response lines, without terminators. Empty for commands that reply
    /// with a bare `OK`.
    pub lines: Vec<String>,
}

impl CommandResponse {
    /// All response lines joined for logging.
    pub fn text(&self) -> String {
        self.lines.join(" | ")
    }

    /// The first response line, if any.
    pub fn first_line(&self) -> Option<&str> {
        self.lines.first().map(String::as_str)
    }
}

/// Serialized execution of AT command lines.
///
/// Implementations guarantee that at most one command is in flight at a
/// time: a second caller waits until the first command reaches its terminal
/// result (plus the inter-command settle delay) before its line is written.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Execute one command line and wait for its terminal result.
    ///
    /// `line` is the bare command without terminators; the runner appends
    /// the line ending. Returns the accumulated response on `OK`, or
    /// [`Error::CommandRejected`](crate::error::Error::CommandRejected) on
    /// an error terminal, or
    /// [`Error::Timeout`](crate::error::Error::Timeout) if no terminal
    /// arrives within `timeout`.
    async fn execute(&self, line: &str, timeout: Duration) -> Result<CommandResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_text_joins_lines() {
        let resp = CommandResponse {
            lines: vec!["%PINGCMD: 0,100.127.100.127,512".into(), "READY".into()],
        };
        assert_eq!(resp.text(), "%PINGCMD: 0,100.127.100.127,512 | READY");
    }

    #[test]
    fn response_first_line() {
        let resp = CommandResponse {
            lines: vec!["#XSOCKET: 0,2,17".into()],
        };
        assert_eq!(resp.first_line(), Some("#XSOCKET: 0,2,17"));
        assert_eq!(CommandResponse::default().first_line(), None);
    }
}
