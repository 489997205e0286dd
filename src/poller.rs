//! One poll cycle: send the command, wait for a frame, stamp the sample

use tokio::time::Instant;
use tracing::debug;

use crate::codec::{self, CommandFrame};
use crate::resync::Resynchronizer;
use crate::transport::ByteSource;
use crate::types::Sample;
use crate::FrameError;

/// Runs request/response cycles against one sensor.
pub struct Poller<S> {
    source: S,
    command: CommandFrame,
    resync: Resynchronizer,
    started: Instant,
    sequence: u64,
}

impl<S: ByteSource> Poller<S> {
    pub fn new(source: S, command: CommandFrame, resync: Resynchronizer) -> Self {
        Self { source, command, resync, started: Instant::now(), sequence: 0 }
    }

    /// Send the command and wait for one validated response.
    ///
    /// Frame failures are returned as-is; the caller decides whether to retry.
    pub async fn poll_once(&mut self) -> Result<Sample, FrameError> {
        self.source.write(self.command.as_bytes()).await?;
        debug!(command = %codec::hex(self.command.as_bytes()), "Command sent");

        let decoded = self.resync.next_frame(&mut self.source).await?;
        self.sequence += 1;
        let sample = decoded.stamp(self.sequence, self.started.elapsed());

        debug!(sequence = sample.sequence, value = sample.value, "Valid frame received");
        Ok(sample)
    }

    /// Number of samples produced so far.
    pub fn samples(&self) -> u64 {
        self.sequence
    }

    pub fn command(&self) -> &CommandFrame {
        &self.command
    }

    /// Close the transport.
    pub async fn close(&mut self) -> Result<(), FrameError> {
        self.source.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{FrameLayout, READ_HOLDING_REGISTERS, ReadRequest, encode_response};
    use crate::resync::ResyncTiming;
    use crate::transports::{ReplayChunk, ReplayTransport};
    use std::time::Duration;

    fn poller(transport: ReplayTransport) -> Poller<ReplayTransport> {
        let timing = ResyncTiming {
            scan_timeout: Duration::from_millis(30),
            frame_timeout: Duration::from_millis(15),
        };
        Poller::new(
            transport,
            ReadRequest::default().encode(),
            Resynchronizer::new(FrameLayout::default(), timing),
        )
    }

    fn response(value: u16) -> ReplayChunk {
        ReplayChunk::immediate(encode_response(
            &FrameLayout::default(),
            READ_HOLDING_REGISTERS,
            value,
        ))
    }

    #[tokio::test]
    async fn each_cycle_sends_command_and_stamps_sample() {
        let transport = ReplayTransport::responding(vec![response(10), response(20)]);
        let log = transport.write_log();
        let mut poller = poller(transport);
        assert_eq!(poller.command(), &ReadRequest::default().encode());

        let first = poller.poll_once().await.unwrap();
        let second = poller.poll_once().await.unwrap();

        assert_eq!((first.sequence, first.value), (1, 10));
        assert_eq!((second.sequence, second.value), (2, 20));
        assert!(second.elapsed >= first.elapsed);
        assert_eq!(log.len(), 2);
        assert_eq!(log.frames()[0], ReadRequest::default().encode().as_bytes().to_vec());
    }

    #[tokio::test]
    async fn failed_cycle_does_not_advance_sequence() {
        let transport = ReplayTransport::responding(vec![
            ReplayChunk::immediate(vec![0x01, 0x03]),
            response(30),
        ]);
        let mut poller = poller(transport);

        assert!(matches!(poller.poll_once().await, Err(FrameError::IncompleteFrame { .. })));
        assert_eq!(poller.samples(), 0);
        assert_eq!(poller.poll_once().await.unwrap().sequence, 1);
    }

    #[tokio::test]
    async fn closed_transport_is_fatal() {
        let mut poller = poller(ReplayTransport::responding(vec![response(1)]));
        poller.close().await.unwrap();
        let err = poller.poll_once().await.unwrap_err();
        assert!(err.is_fatal());
    }
}
