//! Resilient polling of a Modbus-RTU sensor over a serial link.
//!
//! Sensorlink sends a fixed read command to one sensor, finds the response
//! in a possibly noisy byte stream, validates it with the Modbus CRC16 and
//! keeps the decoded values in a bounded rolling history.
//!
//! # Features
//!
//! - **Resynchronization**: garbage and half frames are skipped, never fatal
//! - **Bounded waits**: every read has a deadline, every loop is cancellable
//! - **Shared history**: readers copy a consistent snapshot at any time
//! - **Replay**: captured byte dumps drive the same loop as live hardware
//!
//! ## Example (serial port)
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use sensorlink::{SensorConfig, SensorLink, UpdateRate};
//!
//! #[tokio::main]
//! async fn main() -> sensorlink::Result<()> {
//!     let config = SensorConfig { port: "/dev/ttyUSB0".into(), ..SensorConfig::default() };
//!     let connection = SensorLink::open(&config)?;
//!     let mut samples = connection.subscribe(UpdateRate::Max(2));
//!
//!     while let Some(sample) = samples.next().await {
//!         println!("{:.2} A", sample.scaled(connection.scale()));
//!     }
//!     Ok(())
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

pub mod buffer;
pub mod codec;
pub mod config;
pub mod connection;
pub mod crc;
pub mod driver;
mod error;
pub mod poller;
pub mod resync;
pub mod sink;
pub mod stream;
pub mod transport;
pub mod transports;
pub mod types;

#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;

pub use buffer::{RollingBuffer, SampleHistory};
pub use codec::{CommandFrame, FrameLayout, ReadRequest};
pub use config::SensorConfig;
pub use connection::SensorConnection;
pub use driver::{DriverOptions, PollSummary};
pub use error::*;
pub use sink::{ErrorEvent, ErrorSink, FnSink};
pub use transport::ByteSource;
pub use transports::{ReplayTransport, SerialTransport};
pub use types::*;

/// Entry point for sensor connections.
///
/// Every constructor spawns the poll loop on the current tokio runtime and
/// returns immediately; samples show up in the connection's history as they
/// arrive.
pub struct SensorLink;

impl SensorLink {
    /// Open the configured serial port and start polling.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the port cannot
    /// be opened.
    pub fn open(config: &SensorConfig) -> Result<SensorConnection> {
        config.validate()?;
        let transport = SerialTransport::open(&config.port, config.baud_rate)?;
        Self::attach(transport, config)
    }

    /// Replay a captured byte dump through the poll loop.
    ///
    /// The capture is read as one continuous line recording. Once it is
    /// drained the transport reports itself closed, which ends the loop with
    /// [`FrameError::TransportClosed`].
    pub fn replay<P: AsRef<Path>>(path: P, config: &SensorConfig) -> Result<SensorConnection> {
        let transport =
            ReplayTransport::from_capture(path)?.on_exhausted(transports::ExhaustedBehavior::Close);
        Self::attach(transport, config)
    }

    /// Start polling over an already open transport.
    ///
    /// Frame errors are logged and otherwise ignored; use
    /// [`attach_with`](Self::attach_with) to observe them.
    pub fn attach<S: ByteSource>(transport: S, config: &SensorConfig) -> Result<SensorConnection> {
        Self::attach_with(transport, config, Arc::new(()), config.driver_options())
    }

    /// Start polling with an error sink and explicit loop options.
    pub fn attach_with<S: ByteSource>(
        transport: S,
        config: &SensorConfig,
        sink: Arc<dyn ErrorSink>,
        options: DriverOptions,
    ) -> Result<SensorConnection> {
        SensorConnection::start(transport, config, sink, options)
    }
}
