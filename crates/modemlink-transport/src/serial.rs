//! Serial transport for the AT command link.
//!
//! Cellular IoT modems enumerate as USB CDC-ACM ports (both the nRF91
//! series running serial-LTE-modem firmware and the Murata Type 1SC
//! evaluation kits speak 115200 8N1). [`SerialTransport`] wraps such a port
//! behind the [`Transport`] trait.
//!
//! A port that faults is flagged dead: after an EOF or a read/write error
//! the handle is dropped and `is_connected()` reports `false`, so the
//! session engine can tell a vanished USB device from a quiet modem.

use async_trait::async_trait;
use modemlink_core::error::{Error, Result};
use modemlink_core::transport::Transport;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};

pub use tokio_serial::{DataBits, FlowControl, Parity, StopBits};

/// Serial line parameters. Defaults to 115200 8N1 with no flow control,
/// which every supported modem uses.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    /// CDC-ACM ignores flow control; some dev kits route RTS/CTS.
    pub flow_control: FlowControl,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
        }
    }
}

/// One modem's serial port.
#[derive(Debug)]
pub struct SerialTransport {
    /// `None` once the port has been closed or has faulted.
    port: Option<SerialStream>,
    port_name: String,
}

impl SerialTransport {
    /// Open a port at the given baud rate with 8N1 defaults.
    pub async fn open(port: &str, baud_rate: u32) -> Result<Self> {
        let config = SerialConfig {
            baud_rate,
            ..Default::default()
        };
        Self::open_with_config(port, config).await
    }

    /// Open a port with explicit line parameters.
    pub async fn open_with_config(port: &str, config: SerialConfig) -> Result<Self> {
        tracing::debug!(
            port = %port,
            baud_rate = config.baud_rate,
            "opening serial port"
        );

        let mut stream = tokio_serial::new(port, config.baud_rate)
            .data_bits(config.data_bits)
            .stop_bits(config.stop_bits)
            .parity(config.parity)
            .flow_control(config.flow_control)
            .open_native_async()
            .map_err(|e| {
                tracing::error!(port = %port, error = %e, "failed to open serial port");
                Error::Transport(format!("failed to open serial port {}: {}", port, e))
            })?;

        // De-assert DTR and RTS immediately. Dev kits commonly wire DTR to
        // the modem's reset or sleep line, and the OS asserts it on open;
        // left high it can reboot the modem mid-session.
        if let Err(e) = stream.write_data_terminal_ready(false) {
            tracing::warn!(port = %port, error = %e, "failed to de-assert DTR");
        }
        if let Err(e) = stream.write_request_to_send(false) {
            tracing::warn!(port = %port, error = %e, "failed to de-assert RTS");
        }

        tracing::info!(port = %port, baud_rate = config.baud_rate, "serial port open");

        Ok(Self {
            port: Some(stream),
            port_name: port.to_string(),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Drops the port handle so `is_connected()` reports the fault.
    fn mark_dead(&mut self) {
        self.port = None;
    }
}

/// Maps a port I/O error to the transport error taxonomy. BrokenPipe and
/// NotConnected are what an unplugged CDC-ACM device reports.
fn map_io_error(e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::NotConnected => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        let write = async {
            port.write_all(data).await?;
            // AT exchanges are request/response; the line must go out now,
            // not sit in a kernel buffer.
            port.flush().await
        };

        if let Err(e) = write.await {
            tracing::error!(port = %self.port_name, error = %e, "serial write failed");
            self.mark_dead();
            return Err(map_io_error(e));
        }
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        match tokio::time::timeout(timeout, port.read(buf)).await {
            // EOF: an unplugged USB port reads zero bytes forever. Telling
            // it apart from "no data yet" (which is the timeout arm) is
            // what keeps the engine from spinning on a dead device.
            Ok(Ok(0)) if !buf.is_empty() => {
                tracing::error!(port = %self.port_name, "serial port EOF");
                self.mark_dead();
                Err(Error::ConnectionLost)
            }
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e)) => {
                tracing::error!(port = %self.port_name, error = %e, "serial read failed");
                self.mark_dead();
                Err(map_io_error(e))
            }
            Err(_) => Err(Error::Timeout { waited: timeout }),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut port) = self.port.take() {
            tracing::debug!(port = %self.port_name, "closing serial port");
            if let Err(e) = port.flush().await {
                tracing::warn!(port = %self.port_name, error = %e, "flush on close failed");
            }
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }
}
