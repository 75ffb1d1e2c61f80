//! IO task for the AT command engine.
//!
//! One tokio task owns the transport exclusively and processes all
//! command/response exchanges, unsolicited line demultiplexing, and graceful
//! shutdown. Command serialization falls out of the single consumer: at most
//! one `Execute` request is in flight at a time, and the inter-command
//! settle delay runs inside the task before the next request is dequeued.

use std::time::Duration;

use bytes::BytesMut;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use modemlink_core::command::CommandResponse;
use modemlink_core::error::{Error, Result};
use modemlink_core::events::{LogEntry, ModemEvent};
use modemlink_core::transport::Transport;

use crate::channel::CommandChannel;
use crate::protocol::{self, LineKind};

/// Configuration for the IO task.
#[derive(Debug, Clone)]
pub struct IoConfig {
    /// Delay enforced after every terminal result before the next command
    /// is written (ITU-T V.250 inter-command spacing).
    pub settle_delay: Duration,
    /// How long one idle read waits before yielding back to the loop.
    pub idle_read_timeout: Duration,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(100),
            idle_read_timeout: Duration::from_millis(100),
        }
    }
}

/// A request sent from session methods to the IO task.
pub enum Request {
    /// Execute one command line and reply with the accumulated response.
    Execute {
        line: String,
        timeout: Duration,
        reply: oneshot::Sender<Result<CommandResponse>>,
    },
    /// Graceful shutdown; returns the transport for recovery.
    Shutdown {
        reply: oneshot::Sender<Box<dyn Transport>>,
    },
}

/// Handle to the IO task. Stored inside the session.
pub struct EngineIo {
    /// Request channel into the IO task.
    pub tx: mpsc::Sender<Request>,
    /// Cancellation token for the whole session.
    pub cancel: CancellationToken,
    /// Join handle for the IO task.
    pub task: JoinHandle<()>,
}

impl EngineIo {
    /// A cloneable command handle over this IO task.
    pub fn channel(&self) -> CommandChannel {
        CommandChannel::new(self.tx.clone())
    }

    /// Shut down the IO task and recover the transport.
    pub async fn shutdown(self) -> Result<Box<dyn Transport>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self.tx.send(Request::Shutdown { reply: reply_tx }).await;
        let transport = reply_rx.await.map_err(|_| Error::NotConnected)?;
        let _ = self.task.await;
        Ok(transport)
    }
}

/// Spawn the IO task. Returns the handle for sending commands.
///
/// Received lines classified as unsolicited are forwarded on `urc_tx`;
/// every line in either direction is mirrored to `log_tx`. A transport
/// fault mid-session emits [`ModemEvent::TransportFault`] and cancels the
/// session token.
pub fn spawn_io_task(
    transport: Box<dyn Transport>,
    config: IoConfig,
    urc_tx: mpsc::UnboundedSender<String>,
    log_tx: broadcast::Sender<LogEntry>,
    event_tx: broadcast::Sender<ModemEvent>,
) -> EngineIo {
    let (tx, rx) = mpsc::channel::<Request>(32);
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    let task = tokio::spawn(io_loop(
        transport,
        config,
        urc_tx,
        log_tx,
        event_tx,
        rx,
        cancel_clone,
    ));

    EngineIo { tx, cancel, task }
}

/// Maximum receive buffer size before reset to prevent unbounded growth.
/// AT lines are typically under 200 bytes; 8192 is generous headroom.
const MAX_BUF: usize = 8192;

/// The main IO loop. Runs as a spawned Tokio task.
///
/// Uses `tokio::select! { biased; }` to prioritize:
/// 1. Cancellation
/// 2. Command dispatch
/// 3. Idle unsolicited line reading
async fn io_loop(
    mut transport: Box<dyn Transport>,
    config: IoConfig,
    urc_tx: mpsc::UnboundedSender<String>,
    log_tx: broadcast::Sender<LogEntry>,
    event_tx: broadcast::Sender<ModemEvent>,
    mut rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
) {
    // Persists across commands: a partial line read during one exchange is
    // completed by bytes arriving during the next read.
    let mut line_buf = BytesMut::with_capacity(512);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("engine IO task cancelled");
                break;
            }

            req = rx.recv() => {
                match req {
                    Some(Request::Shutdown { reply }) => {
                        debug!("IO task shutdown requested");
                        let _ = reply.send(transport);
                        return;
                    }
                    Some(Request::Execute { line, timeout, reply }) => {
                        let result = execute_command(
                            &mut *transport,
                            &line,
                            timeout,
                            &config,
                            &mut line_buf,
                            &urc_tx,
                            &log_tx,
                        )
                        .await;

                        let fatal = matches!(
                            result,
                            Err(Error::ConnectionLost | Error::NotConnected | Error::Io(_))
                        );
                        if fatal {
                            report_fault(&result, &log_tx, &event_tx);
                        }
                        let _ = reply.send(result);
                        if fatal {
                            cancel.cancel();
                            break;
                        }
                    }
                    None => {
                        debug!("request channel closed, exiting IO task");
                        break;
                    }
                }
            }

            // Idle: read unsolicited lines from the modem. Yields `false`
            // when the transport is dead and the session must end.
            healthy = async {
                let mut buf = [0u8; 256];
                match transport.receive(&mut buf, config.idle_read_timeout).await {
                    Ok(n) if n > 0 => {
                        line_buf.extend_from_slice(&buf[..n]);
                        if line_buf.len() > MAX_BUF {
                            tracing::warn!(len = line_buf.len(), "idle buffer overflow, resetting");
                            line_buf.clear();
                            return true;
                        }
                        while let Some(line) = protocol::take_line(&mut line_buf) {
                            let _ = log_tx.send(LogEntry::received(&line));
                            match protocol::classify(&line) {
                                LineKind::Urc => {
                                    let _ = urc_tx.send(line);
                                }
                                other => {
                                    debug!(?other, line, "stray line outside command exchange");
                                }
                            }
                        }
                        true
                    }
                    Ok(_) => true,
                    Err(Error::Timeout { .. }) => {
                        // Nothing pending. Yield briefly so the loop can
                        // check for commands or cancellation.
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        true
                    }
                    Err(e) => {
                        report_fault::<()>(&Err(e), &log_tx, &event_tx);
                        false
                    }
                }
            } => {
                // Same as a fatal error inside a command exchange: the
                // token wakes every pending wait and the loop must not
                // spin on a dead port.
                if !healthy {
                    cancel.cancel();
                    break;
                }
            }
        }

        if cancel.is_cancelled() {
            break;
        }

        // Transports that flag themselves dead end the session too.
        if !transport.is_connected() {
            cancel.cancel();
            break;
        }
    }
}

fn report_fault<T>(
    result: &Result<T>,
    log_tx: &broadcast::Sender<LogEntry>,
    event_tx: &broadcast::Sender<ModemEvent>,
) {
    if let Err(e) = result {
        tracing::error!(error = %e, "transport fault, shutting down session");
        let _ = log_tx.send(LogEntry::system(format!("transport fault: {e}")));
        let _ = event_tx.send(ModemEvent::TransportFault {
            detail: e.to_string(),
        });
    }
}

/// Execute one command line on the transport.
///
/// Writes the line with `\r\n`, then reads until a terminal result arrives
/// or the deadline passes. Unsolicited lines that interleave with the
/// response are forwarded to the URC stream and never appear in the
/// response. After any terminal, the settle delay runs before returning so
/// the next command cannot be written into the modem's busy window.
async fn execute_command(
    transport: &mut dyn Transport,
    line: &str,
    timeout: Duration,
    config: &IoConfig,
    line_buf: &mut BytesMut,
    urc_tx: &mpsc::UnboundedSender<String>,
    log_tx: &broadcast::Sender<LogEntry>,
) -> Result<CommandResponse> {
    let _ = log_tx.send(LogEntry::sent(line));

    let mut framed = BytesMut::with_capacity(line.len() + 2);
    framed.extend_from_slice(line.as_bytes());
    framed.extend_from_slice(b"\r\n");
    transport.send(&framed).await?;

    let deadline = tokio::time::Instant::now() + timeout;
    let mut response = CommandResponse::default();
    let mut recv_buf = [0u8; 256];

    loop {
        while let Some(received) = protocol::take_line(line_buf) {
            let _ = log_tx.send(LogEntry::received(&received));
            match protocol::classify(&received) {
                LineKind::Urc => {
                    let _ = urc_tx.send(received);
                }
                LineKind::SuccessTerminal => {
                    tokio::time::sleep(config.settle_delay).await;
                    return Ok(response);
                }
                LineKind::FailureTerminal => {
                    tokio::time::sleep(config.settle_delay).await;
                    let detail = if response.lines.is_empty() {
                        received
                    } else {
                        format!("{} | {}", response.text(), received)
                    };
                    return Err(Error::CommandRejected(detail));
                }
                LineKind::Response => {
                    response.lines.push(received);
                }
            }
        }

        let now = tokio::time::Instant::now();
        if now >= deadline {
            return Err(Error::Timeout { waited: timeout });
        }

        match transport.receive(&mut recv_buf, deadline - now).await {
            Ok(n) => {
                line_buf.extend_from_slice(&recv_buf[..n]);
                if line_buf.len() > MAX_BUF {
                    tracing::warn!(len = line_buf.len(), "response buffer overflow, resetting");
                    line_buf.clear();
                    return Err(Error::Protocol("response buffer overflow".into()));
                }
            }
            Err(Error::Timeout { .. }) => {
                return Err(Error::Timeout { waited: timeout });
            }
            Err(e) => return Err(e),
        }
    }
}
