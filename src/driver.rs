//! Driver spawns and manages the poll loop task

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::buffer::SampleHistory;
use crate::poller::Poller;
use crate::sink::{ErrorEvent, ErrorSink};
use crate::transport::ByteSource;
use crate::types::Sample;
use crate::FrameError;

/// Loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverOptions {
    /// Pause between the end of one cycle and the start of the next
    pub poll_interval: Duration,
    /// Stop after this many samples
    pub max_samples: Option<u64>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self { poll_interval: Duration::from_millis(100), max_samples: None }
    }
}

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub cycles: u64,
    pub samples: u64,
    pub errors: u64,
}

/// Outcome of the poll task: a summary on orderly exit, the fatal error otherwise.
pub type PollOutcome = Result<PollSummary, FrameError>;

/// Result of spawning the driver task
pub struct DriverChannels {
    /// Receiver for the most recent sample
    pub samples: watch::Receiver<Option<Sample>>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    /// Handle to the poll task
    pub task: JoinHandle<PollOutcome>,
}

/// Driver spawns and manages the poll loop
///
/// The spawned task owns the [`Poller`] and is the only writer to the
/// sample history.
pub struct Driver;

impl Driver {
    /// Spawn the poll loop for the given poller
    pub fn spawn<S>(
        poller: Poller<S>,
        history: SampleHistory,
        sink: Arc<dyn ErrorSink>,
        options: DriverOptions,
    ) -> DriverChannels
    where
        S: ByteSource,
    {
        let (sample_tx, sample_rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();

        let task = tokio::spawn(async move {
            Self::poll_task(poller, history, sample_tx, sink, options, cancel_task).await
        });

        DriverChannels { samples: sample_rx, cancel, task }
    }

    /// Poll loop - runs cycles until cancelled or the transport is lost
    async fn poll_task<S>(
        mut poller: Poller<S>,
        history: SampleHistory,
        sample_tx: watch::Sender<Option<Sample>>,
        sink: Arc<dyn ErrorSink>,
        options: DriverOptions,
        cancel: CancellationToken,
    ) -> PollOutcome
    where
        S: ByteSource,
    {
        info!(interval = ?options.poll_interval, "Poll task started");
        let mut summary = PollSummary::default();
        let mut consecutive = 0u32;

        let outcome = loop {
            if cancel.is_cancelled() {
                info!("Poll task cancelled");
                break Ok(summary);
            }

            // Dropping an in-flight cycle on cancellation stores nothing
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Poll task cancelled during read");
                    break Ok(summary);
                }
                result = poller.poll_once() => result,
            };
            summary.cycles += 1;

            match result {
                Ok(sample) => {
                    consecutive = 0;
                    summary.samples += 1;
                    history.push(sample);
                    sample_tx.send_replace(Some(sample));
                    trace!("Sample {}: value={}", sample.sequence, sample.value);

                    if options.max_samples.is_some_and(|max| summary.samples >= max) {
                        info!("Sample limit reached");
                        break Ok(summary);
                    }
                }
                Err(e) => {
                    consecutive = consecutive.saturating_add(1);
                    summary.errors += 1;
                    let fatal = e.is_fatal();
                    let event = ErrorEvent { cycle: summary.cycles, consecutive, error: Arc::new(e) };

                    if fatal {
                        error!(cycle = event.cycle, "Transport lost: {}", event.error);
                    } else {
                        warn!(
                            cycle = event.cycle,
                            consecutive,
                            kind = event.error.kind(),
                            "Poll failed: {}",
                            event.error
                        );
                    }
                    sink.report(&event);

                    if fatal {
                        break Err(Arc::try_unwrap(event.error).unwrap_or_else(|shared| {
                            FrameError::transport_closed(shared.to_string())
                        }));
                    }
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Poll task cancelled during pacing delay");
                    break Ok(summary);
                }
                _ = tokio::time::sleep(options.poll_interval) => {}
            }
        };

        if let Err(e) = poller.close().await {
            debug!("Error while closing transport: {}", e);
        }

        info!(
            "Poll task ended ({} cycles, {} samples, {} errors)",
            summary.cycles, summary.samples, summary.errors
        );
        outcome
    }
}
