//! Mock transport for deterministic testing of the command engine.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/response pairs. This lets you test AT command framing, terminal
//! result detection, and unsolicited notification routing without real
//! hardware.
//!
//! # Example
//!
//! ```
//! use modemlink_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! // Pre-load: when the engine sends this command, return this response.
//! mock.expect_command("AT", &["OK"]);
//! mock.expect_command("AT+CEREG=2", &["OK"]);
//! // Deliver an unsolicited line on a later idle read.
//! mock.push_unsolicited("+CEREG: 5,\"262A\",\"002F6A03\",7");
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;

use modemlink_core::error::{Error, Result};
use modemlink_core::transport::Transport;

/// A pre-loaded request/response pair for the mock transport.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// The bytes to return when the matching request is received.
    response: Vec<u8>,
}

/// A mock [`Transport`] for testing the engine without hardware.
///
/// Expectations are consumed in order. When `send()` is called, the sent
/// data is recorded and matched against the next expectation. The
/// corresponding response is then returned by subsequent `receive()` calls.
///
/// Unsolicited lines queued with [`push_unsolicited`](Self::push_unsolicited)
/// are delivered by `receive()` whenever no command response is pending,
/// which is how the engine's idle reads pick up notifications.
///
/// If no expectation matches or the queue is exhausted, an error is returned.
#[derive(Debug)]
pub struct MockTransport {
    /// Ordered queue of expected request/response pairs.
    expectations: VecDeque<Expectation>,
    /// The response data pending for the next `receive()` call.
    pending_response: Option<Vec<u8>>,
    /// Cursor into the pending response (how many bytes have been read so far).
    response_cursor: usize,
    /// Unsolicited lines delivered when no response is pending.
    unsolicited: VecDeque<Vec<u8>>,
    /// Whether the transport is "connected".
    connected: bool,
    /// Log of all bytes sent through this transport.
    sent_log: Vec<Vec<u8>>,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            expectations: VecDeque::new(),
            pending_response: None,
            response_cursor: 0,
            unsolicited: VecDeque::new(),
            connected: true,
            sent_log: Vec::new(),
        }
    }

    /// Add an expected request/response pair at the byte level.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Add an expected AT command and its response lines.
    ///
    /// `command` is the bare line; the `\r\n` terminator the engine appends
    /// is added here, and each response line is framed with `\r\n`.
    pub fn expect_command(&mut self, command: &str, response_lines: &[&str]) {
        let request = format!("{command}\r\n");
        let mut response = String::new();
        for line in response_lines {
            response.push_str(line);
            response.push_str("\r\n");
        }
        self.expect(request.as_bytes(), response.as_bytes());
    }

    /// Queue an unsolicited line, delivered on a `receive()` call when no
    /// command response is pending.
    pub fn push_unsolicited(&mut self, line: &str) {
        self.unsolicited.push_back(format!("{line}\r\n").into_bytes());
    }

    /// Return a reference to all data that has been sent through this transport.
    ///
    /// Each element is the byte slice from one `send()` call.
    pub fn sent_data(&self) -> &[Vec<u8>] {
        &self.sent_log
    }

    /// All sent data reinterpreted as trimmed command lines.
    pub fn sent_lines(&self) -> Vec<String> {
        self.sent_log
            .iter()
            .map(|d| String::from_utf8_lossy(d).trim_end().to_string())
            .collect()
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }

    /// Set the connected state of the mock transport.
    ///
    /// When set to `false`, subsequent `send()` and `receive()` calls will
    /// return [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        // Record what was sent.
        self.sent_log.push(data.to_vec());

        // Match against the next expectation.
        if let Some(expectation) = self.expectations.pop_front() {
            if data != expectation.request.as_slice() {
                return Err(Error::Protocol(format!(
                    "unexpected send data: expected {:?}, got {:?}",
                    String::from_utf8_lossy(&expectation.request),
                    String::from_utf8_lossy(data)
                )));
            }
            self.pending_response = Some(expectation.response);
            self.response_cursor = 0;
            Ok(())
        } else {
            Err(Error::Protocol(
                "no more expectations in mock transport".into(),
            ))
        }
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        if let Some(ref response) = self.pending_response {
            let remaining = &response[self.response_cursor..];
            if remaining.is_empty() {
                self.pending_response = None;
                self.response_cursor = 0;
                return Err(Error::Timeout { waited: timeout });
            }
            let n = remaining.len().min(buf.len());
            buf[..n].copy_from_slice(&remaining[..n]);
            self.response_cursor += n;
            if self.response_cursor >= response.len() {
                // All response bytes consumed; clear for next exchange.
                self.pending_response = None;
                self.response_cursor = 0;
            }
            return Ok(n);
        }

        if let Some(line) = self.unsolicited.pop_front() {
            let n = line.len().min(buf.len());
            buf[..n].copy_from_slice(&line[..n]);
            if n < line.len() {
                // Buffer too small; keep the tail for the next read.
                self.unsolicited.push_front(line[n..].to_vec());
            }
            return Ok(n);
        }

        Err(Error::Timeout { waited: timeout })
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        self.pending_response = None;
        self.response_cursor = 0;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modemlink_core::transport::Transport;

    #[tokio::test]
    async fn mock_transport_basic_send_receive() {
        let mut mock = MockTransport::new();
        mock.expect_command("AT", &["OK"]);

        mock.send(b"AT\r\n").await.unwrap();

        let mut buf = [0u8; 64];
        let n = mock
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();

        assert_eq!(&buf[..n], b"OK\r\n");
    }

    #[tokio::test]
    async fn mock_transport_tracks_sent_lines() {
        let mut mock = MockTransport::new();
        mock.expect_command("AT", &["OK"]);
        mock.expect_command("AT+CFUN=1", &["OK"]);

        mock.send(b"AT\r\n").await.unwrap();
        mock.send(b"AT+CFUN=1\r\n").await.unwrap();

        assert_eq!(mock.sent_lines(), vec!["AT", "AT+CFUN=1"]);
    }

    #[tokio::test]
    async fn mock_transport_wrong_data_errors() {
        let mut mock = MockTransport::new();
        mock.expect_command("AT", &["OK"]);

        let result = mock.send(b"ATZ\r\n").await;
        assert!(matches!(result.unwrap_err(), Error::Protocol(_)));
    }

    #[tokio::test]
    async fn mock_transport_no_expectations_errors() {
        let mut mock = MockTransport::new();

        let result = mock.send(b"AT\r\n").await;
        assert!(matches!(result.unwrap_err(), Error::Protocol(_)));
    }

    #[tokio::test]
    async fn mock_transport_idle_receive_times_out() {
        let mut mock = MockTransport::new();
        let mut buf = [0u8; 64];

        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result.unwrap_err(), Error::Timeout { .. }));
    }

    #[tokio::test]
    async fn mock_transport_delivers_unsolicited_when_idle() {
        let mut mock = MockTransport::new();
        mock.push_unsolicited("+CEREG: 5");

        let mut buf = [0u8; 64];
        let n = mock
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"+CEREG: 5\r\n");

        // Queue drained; back to timeout.
        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result.unwrap_err(), Error::Timeout { .. }));
    }

    #[tokio::test]
    async fn mock_transport_response_takes_priority_over_unsolicited() {
        let mut mock = MockTransport::new();
        mock.expect_command("AT", &["OK"]);
        mock.push_unsolicited("%CESQ: 54,2,18,2");

        mock.send(b"AT\r\n").await.unwrap();

        let mut buf = [0u8; 64];
        let n = mock
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"OK\r\n");

        let n = mock
            .receive(&mut buf, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"%CESQ: 54,2,18,2\r\n");
    }

    #[tokio::test]
    async fn mock_transport_disconnect() {
        let mut mock = MockTransport::new();
        assert!(mock.is_connected());

        mock.close().await.unwrap();
        assert!(!mock.is_connected());

        let result = mock.send(b"AT\r\n").await;
        assert!(matches!(result.unwrap_err(), Error::NotConnected));
    }

    #[tokio::test]
    async fn mock_transport_set_connected() {
        let mut mock = MockTransport::new();
        mock.set_connected(false);
        assert!(!mock.is_connected());

        let mut buf = [0u8; 8];
        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result.unwrap_err(), Error::NotConnected));
    }

    #[tokio::test]
    async fn mock_transport_remaining_expectations() {
        let mut mock = MockTransport::new();
        mock.expect_command("AT", &["OK"]);
        mock.expect_command("ATZ", &["OK"]);
        assert_eq!(mock.remaining_expectations(), 2);

        mock.send(b"AT\r\n").await.unwrap();
        assert_eq!(mock.remaining_expectations(), 1);
    }

    #[tokio::test]
    async fn mock_transport_partial_receive() {
        let mut mock = MockTransport::new();
        mock.expect_command("AT+CGMI", &["Nordic Semiconductor ASA", "OK"]);

        mock.send(b"AT+CGMI\r\n").await.unwrap();

        // Read with a buffer smaller than the response.
        let mut collected = Vec::new();
        let mut buf = [0u8; 8];
        loop {
            match mock.receive(&mut buf, Duration::from_millis(10)).await {
                Ok(n) => collected.extend_from_slice(&buf[..n]),
                Err(_) => break,
            }
        }
        assert_eq!(collected, b"Nordic Semiconductor ASA\r\nOK\r\n");
    }
}
