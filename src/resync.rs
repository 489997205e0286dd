//! Frame recovery from an undelimited byte stream
//!
//! Responses carry no delimiter besides their first byte (the device
//! address) and their fixed length. The resynchronizer never assumes the
//! stream is aligned: every call scans for a start byte, collects exactly
//! one frame's worth of bytes, and hands them to the codec.
//!
//! Nothing is carried between calls. A partial frame is dropped in full and
//! the next call starts scanning from wherever the stream is. A start byte
//! that happens to sit inside a payload produces a false start, which the
//! address or CRC check rejects; the following call realigns.

use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

use crate::codec::{self, DEFAULT_DATA_OFFSET, FrameLayout};
use crate::transport::ByteSource;
use crate::types::DecodedSample;
use crate::FrameError;

/// Default bound on the start byte scan.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default bound on collecting the rest of a frame.
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_millis(250);

/// Wait bounds for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResyncTiming {
    /// Total time allowed to find a start byte
    pub scan_timeout: Duration,
    /// Total time allowed for the bytes after the start byte
    pub frame_timeout: Duration,
}

impl Default for ResyncTiming {
    fn default() -> Self {
        Self { scan_timeout: DEFAULT_SCAN_TIMEOUT, frame_timeout: DEFAULT_FRAME_TIMEOUT }
    }
}

/// Recovers validated frames from a noisy byte stream.
#[derive(Debug, Clone, Copy)]
pub struct Resynchronizer {
    layout: FrameLayout,
    timing: ResyncTiming,
}

impl Resynchronizer {
    pub fn new(layout: FrameLayout, timing: ResyncTiming) -> Self {
        Self { layout, timing }
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    pub fn timing(&self) -> ResyncTiming {
        self.timing
    }

    /// Pull one validated frame out of `source`.
    pub async fn next_frame<S>(&self, source: &mut S) -> Result<DecodedSample, FrameError>
    where
        S: ByteSource + ?Sized,
    {
        let start_byte = self.layout.start_byte();
        let frame_len = self.layout.frame_len();

        let discarded = self.scan_for_start(source, start_byte).await?;
        if discarded > 0 {
            trace!(discarded, "Skipped bytes before start byte");
        }

        let mut frame = vec![0u8; frame_len];
        frame[0] = start_byte;
        let filled = read_within(source, &mut frame[1..], self.timing.frame_timeout).await?;
        if filled + 1 < frame_len {
            frame.truncate(filled + 1);
            return Err(FrameError::IncompleteFrame {
                expected: frame_len,
                received: frame.len(),
                bytes: frame,
            });
        }

        trace!(frame = %codec::hex(&frame), "Collected candidate frame");
        codec::validate_frame(&frame, &self.layout)
    }

    /// Consume bytes one at a time until `start_byte` shows up.
    ///
    /// Returns the number of bytes discarded on the way.
    async fn scan_for_start<S>(&self, source: &mut S, start_byte: u8) -> Result<usize, FrameError>
    where
        S: ByteSource + ?Sized,
    {
        let deadline = Instant::now() + self.timing.scan_timeout;
        let mut byte = [0u8; 1];
        let mut discarded = 0usize;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(FrameError::Timeout { waited: self.timing.scan_timeout, discarded });
            }

            if source.read(&mut byte, remaining).await? == 0 {
                continue;
            }
            if byte[0] == start_byte {
                return Ok(discarded);
            }
            discarded += 1;
        }
    }
}

/// Contract form of [`Resynchronizer::next_frame`] for the standard
/// response shape (data at byte 3).
pub async fn next_frame<S>(
    source: &mut S,
    expected_len: usize,
    start_byte: u8,
    timing: ResyncTiming,
) -> Result<DecodedSample, FrameError>
where
    S: ByteSource + ?Sized,
{
    // A length that cannot hold the data field can never be satisfied.
    let layout = FrameLayout::new(start_byte, expected_len, DEFAULT_DATA_OFFSET).map_err(|_| {
        FrameError::IncompleteFrame { expected: expected_len, received: 0, bytes: Vec::new() }
    })?;
    Resynchronizer::new(layout, timing).next_frame(source).await
}

/// Fill `buf` from `source` within `timeout`, returning how many bytes arrived.
async fn read_within<S>(source: &mut S, buf: &mut [u8], timeout: Duration) -> Result<usize, FrameError>
where
    S: ByteSource + ?Sized,
{
    let deadline = Instant::now() + timeout;
    let mut filled = 0;

    while filled < buf.len() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        filled += source.read(&mut buf[filled..], remaining).await?;
    }

    Ok(filled)
}
