//! Running sensor connection
//!
//! A [`SensorConnection`] owns the background poll task and gives readers
//! access to its output: the shared history, the newest sample, and
//! optionally throttled streams.

use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::buffer::{RollingBuffer, SampleHistory};
use crate::config::SensorConfig;
use crate::driver::{Driver, DriverOptions, PollOutcome, PollSummary};
use crate::poller::Poller;
use crate::resync::Resynchronizer;
use crate::sink::ErrorSink;
use crate::stream::ThrottleExt;
use crate::transport::ByteSource;
use crate::types::{Sample, UpdateRate};
use crate::{LinkError, Result};

/// Handle to a running poll loop.
pub struct SensorConnection {
    /// Newest sample watch receiver
    samples: watch::Receiver<Option<Sample>>,

    history: SampleHistory,

    /// Nominal poll frequency, used to normalise subscription rates
    poll_hz: f64,

    scale: f64,

    cancel: CancellationToken,

    /// Taken by `join`/`shutdown`
    task: Option<JoinHandle<PollOutcome>>,
}

impl SensorConnection {
    /// Build the poll pipeline around `source` and spawn it.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn start<S: ByteSource>(
        source: S,
        config: &SensorConfig,
        sink: Arc<dyn ErrorSink>,
        options: DriverOptions,
    ) -> Result<Self> {
        config.validate()?;

        let resync = Resynchronizer::new(config.layout()?, config.resync_timing());
        let poller = Poller::new(source, config.command(), resync);
        let history = RollingBuffer::shared(config.history_capacity);

        let channels = Driver::spawn(poller, Arc::clone(&history), sink, options);

        info!(
            command = %crate::codec::hex(config.command().as_bytes()),
            capacity = config.history_capacity,
            "Sensor connection started ({:.1}Hz)",
            config.poll_hz()
        );

        Ok(Self {
            samples: channels.samples,
            history,
            poll_hz: config.poll_hz(),
            scale: config.scale,
            cancel: channels.cancel,
            task: Some(channels.task),
        })
    }

    /// Stream of new samples.
    ///
    /// The newest sample (if any) is yielded first. The stream ends when
    /// the poll loop stops.
    pub fn subscribe(&self, rate: UpdateRate) -> impl Stream<Item = Sample> + 'static {
        let samples = WatchStream::new(self.samples.clone()).filter_map(|opt| async move { opt });

        match rate.throttle_interval(self.poll_hz) {
            None => samples.boxed(),
            Some(period) => samples.throttle(period).boxed(),
        }
    }

    /// Copy of the history, oldest first.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.history.snapshot()
    }

    /// Samples still in the history whose sequence is above `sequence`,
    /// oldest first.
    ///
    /// Pairs with [`subscribe`](Self::subscribe) for consumers that must see
    /// every sample: the stream says something changed, this says what.
    pub fn samples_after(&self, sequence: u64) -> Vec<Sample> {
        self.history.snapshot().into_iter().filter(|s| s.sequence > sequence).collect()
    }

    /// Shared history handle; stays readable after the connection is gone.
    pub fn history(&self) -> SampleHistory {
        Arc::clone(&self.history)
    }

    pub fn latest(&self) -> Option<Sample> {
        *self.samples.borrow()
    }

    pub fn poll_hz(&self) -> f64 {
        self.poll_hz
    }

    /// Engineering units per raw count.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Token that stops the poll loop when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stop the poll loop and wait for it to close the transport.
    pub async fn shutdown(mut self) -> Result<PollSummary> {
        debug!("Shutting down sensor connection");
        self.cancel.cancel();
        self.wait().await
    }

    /// Wait for the poll loop to end on its own (sample limit, transport
    /// loss, or an external cancel through the token).
    pub async fn join(mut self) -> Result<PollSummary> {
        self.wait().await
    }

    async fn wait(&mut self) -> Result<PollSummary> {
        let task = self
            .task
            .take()
            .ok_or_else(|| LinkError::Task { details: "poll task already joined".to_string() })?;

        match task.await {
            Ok(Ok(summary)) => Ok(summary),
            Ok(Err(e)) => Err(e.into()),
            Err(e) => Err(LinkError::Task { details: e.to_string() }),
        }
    }
}

impl Drop for SensorConnection {
    fn drop(&mut self) {
        debug!("Dropping sensor connection");
        self.cancel.cancel();
    }
}
