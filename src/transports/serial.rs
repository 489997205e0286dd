//! Serial port transport backed by `tokio-serial`

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, info, trace};

use crate::transport::ByteSource;
use crate::error::is_transient_io;
use crate::{FrameError, LinkError, Result};

/// Serial link to a Modbus-RTU sensor (8N1).
pub struct SerialTransport {
    /// Open stream, `None` after close
    stream: Option<SerialStream>,

    /// Device path, kept for diagnostics
    port: String,
}

impl SerialTransport {
    /// Open `port` at `baud_rate`, 8 data bits, no parity, one stop bit.
    pub fn open(port: &str, baud_rate: u32) -> Result<Self> {
        info!("Opening serial port {} at {} baud", port, baud_rate);

        let stream = tokio_serial::new(port, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .open_native_async()
            .map_err(|e| {
                LinkError::connection_failed_with_source(
                    format!("cannot open serial port {}", port),
                    Box::new(e),
                )
            })?;

        Ok(Self { stream: Some(stream), port: port.to_string() })
    }

    /// List serial ports visible to the operating system.
    pub fn available_ports() -> Result<Vec<String>> {
        let ports = tokio_serial::available_ports().map_err(|e| {
            LinkError::connection_failed_with_source("cannot enumerate serial ports", Box::new(e))
        })?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    fn stream(&mut self) -> Result<&mut SerialStream, FrameError> {
        let port = &self.port;
        self.stream
            .as_mut()
            .ok_or_else(|| FrameError::transport_closed(format!("serial port {} is closed", port)))
    }
}

/// Map a bounded read to the `ByteSource` contract; `None` means the wait elapsed.
fn read_outcome(result: Option<std::io::Result<usize>>) -> Result<usize, FrameError> {
    match result {
        None => Ok(0),
        Some(Ok(0)) => Err(FrameError::transport_closed("serial port reached end of stream")),
        Some(Ok(n)) => Ok(n),
        Some(Err(e)) if is_transient_io(e.kind()) => {
            trace!("Transient serial read error: {}", e);
            Ok(0)
        }
        Some(Err(e)) => Err(e.into()),
    }
}

#[async_trait::async_trait]
impl ByteSource for SerialTransport {
    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, FrameError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let stream = self.stream()?;
        let result = tokio::time::timeout(timeout, stream.read(buf)).await.ok();
        read_outcome(result)
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), FrameError> {
        let stream = self.stream()?;
        stream.write_all(bytes).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), FrameError> {
        if self.stream.take().is_some() {
            debug!("Closed serial port {}", self.port);
        }
        Ok(())
    }
}
