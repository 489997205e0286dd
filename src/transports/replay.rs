//! Replay transport for captured or scripted byte streams

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, trace};

use crate::transport::ByteSource;
use crate::{FrameError, LinkError, Result};

/// One burst of bytes in a replay script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayChunk {
    pub bytes: Vec<u8>,
    /// Silence on the line before the burst becomes readable
    pub delay: Duration,
}

impl ReplayChunk {
    pub fn immediate(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: bytes.into(), delay: Duration::ZERO }
    }

    pub fn with_delay(bytes: impl Into<Vec<u8>>, delay: Duration) -> Self {
        Self { bytes: bytes.into(), delay }
    }
}

/// When scripted bytes become readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayMode {
    /// Chunks flow one after another regardless of writes
    FreeRunning,
    /// Each written command releases the next chunk, like a device answering
    OnCommand,
}

/// What happens once the script has been fully consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustedBehavior {
    /// The line goes quiet; reads time out
    Idle,
    /// The link reports `TransportClosed`
    Close,
}

/// Shared record of every frame written to a replay transport.
#[derive(Debug, Clone, Default)]
pub struct WriteLog {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl WriteLog {
    fn record(&self, bytes: &[u8]) {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).push(bytes.to_vec());
    }

    /// All frames written so far, in write order.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Deterministic transport that plays back scripted chunks.
pub struct ReplayTransport {
    /// Chunks not yet released
    script: VecDeque<ReplayChunk>,

    /// Released bytes waiting to be read
    ready: VecDeque<u8>,

    /// Silence still owed before `ready` may be read
    pending_delay: Duration,

    mode: ReplayMode,
    exhausted: ExhaustedBehavior,
    writes: WriteLog,
    closed: bool,
}

impl ReplayTransport {
    /// Free-running transport over the given chunks.
    pub fn new(chunks: Vec<ReplayChunk>) -> Self {
        Self {
            script: chunks.into(),
            ready: VecDeque::new(),
            pending_delay: Duration::ZERO,
            mode: ReplayMode::FreeRunning,
            exhausted: ExhaustedBehavior::Idle,
            writes: WriteLog::default(),
            closed: false,
        }
    }

    /// Free-running transport over one contiguous byte stream.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(vec![ReplayChunk::immediate(bytes)])
    }

    /// Transport that answers each command with the next response.
    pub fn responding(responses: Vec<ReplayChunk>) -> Self {
        Self::new(responses).with_mode(ReplayMode::OnCommand)
    }

    /// Load a raw capture of the sensor line from disk.
    pub fn from_capture<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            std::fs::read(path).map_err(|e| LinkError::file_error(path.to_path_buf(), e))?;
        info!("Loaded capture {} ({} bytes)", path.display(), bytes.len());
        Ok(Self::from_bytes(bytes))
    }

    pub fn with_mode(mut self, mode: ReplayMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn on_exhausted(mut self, behavior: ExhaustedBehavior) -> Self {
        self.exhausted = behavior;
        self
    }

    /// Handle to the frames written to this transport.
    pub fn write_log(&self) -> WriteLog {
        self.writes.clone()
    }

    /// Bytes still to be delivered, released or not.
    pub fn remaining(&self) -> usize {
        self.ready.len() + self.script.iter().map(|c| c.bytes.len()).sum::<usize>()
    }

    fn release_next(&mut self) -> bool {
        match self.script.pop_front() {
            Some(chunk) => {
                trace!("Releasing {} replay bytes after {:?}", chunk.bytes.len(), chunk.delay);
                self.pending_delay += chunk.delay;
                self.ready.extend(chunk.bytes);
                true
            }
            None => false,
        }
    }

    async fn idle(&self, timeout: Duration) -> Result<usize, FrameError> {
        if self.exhausted == ExhaustedBehavior::Close && self.script.is_empty() {
            return Err(FrameError::transport_closed("replay script exhausted"));
        }
        tokio::time::sleep(timeout).await;
        Ok(0)
    }
}

#[async_trait::async_trait]
impl ByteSource for ReplayTransport {
    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, FrameError> {
        if self.closed {
            return Err(FrameError::transport_closed("replay transport closed"));
        }
        if buf.is_empty() {
            return Ok(0);
        }

        if self.ready.is_empty() && self.mode == ReplayMode::FreeRunning {
            self.release_next();
        }
        if self.ready.is_empty() {
            return self.idle(timeout).await;
        }

        if self.pending_delay > timeout {
            tokio::time::sleep(timeout).await;
            self.pending_delay -= timeout;
            return Ok(0);
        }
        if !self.pending_delay.is_zero() {
            tokio::time::sleep(self.pending_delay).await;
            self.pending_delay = Duration::ZERO;
        }

        let n = buf.len().min(self.ready.len());
        for (slot, byte) in buf.iter_mut().zip(self.ready.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), FrameError> {
        if self.closed {
            return Err(FrameError::transport_closed("replay transport closed"));
        }
        self.writes.record(bytes);
        if self.mode == ReplayMode::OnCommand {
            self.release_next();
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), FrameError> {
        if !self.closed {
            debug!("Closing replay transport ({} bytes unread)", self.remaining());
            self.closed = true;
        }
        Ok(())
    }
}
