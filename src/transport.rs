//! Byte source trait for sensor links

use std::time::Duration;

use crate::FrameError;

/// Bidirectional byte channel to a sensor.
///
/// Transports abstract over the physical link (serial port, recorded
/// capture, test script). They never frame anything themselves; framing is
/// the resynchronizer's job.
#[async_trait::async_trait]
pub trait ByteSource: Send + 'static {
    /// Read up to `buf.len()` bytes, waiting at most `timeout`.
    ///
    /// Returns:
    /// - `Ok(n)` with `n > 0` - bytes were copied into `buf[..n]`
    /// - `Ok(0)` - the timeout elapsed with nothing to read
    /// - `Err(FrameError::TransportClosed)` - the link is gone for good
    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, FrameError>;

    /// Write a complete command frame.
    async fn write(&mut self, bytes: &[u8]) -> Result<(), FrameError>;

    /// Release the underlying link. Further reads and writes fail.
    async fn close(&mut self) -> Result<(), FrameError>;
}

#[async_trait::async_trait]
impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, FrameError> {
        (**self).read(buf, timeout).await
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), FrameError> {
        (**self).write(bytes).await
    }

    async fn close(&mut self) -> Result<(), FrameError> {
        (**self).close().await
    }
}
