//! Rate limiting for sample streams

use futures::{Stream, ready};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval};

/// Adds [`throttle`](ThrottleExt::throttle) to every stream.
pub trait ThrottleExt: Stream {
    /// Emit at most one item per `period`.
    ///
    /// Latest wins: items arriving within one period collapse into the
    /// newest of them. The final item before the source ends is still
    /// delivered.
    fn throttle(self, period: Duration) -> Throttle<Self>
    where
        Self: Sized,
    {
        Throttle::new(self, period)
    }
}

impl<T: Stream> ThrottleExt for T {}

pin_project! {
    /// Stream returned by [`ThrottleExt::throttle`].
    pub struct Throttle<S: Stream> {
        #[pin]
        source: S,
        ticks: Interval,
        newest: Option<S::Item>,
        source_done: bool,
    }
}

impl<S: Stream> Throttle<S> {
    pub fn new(source: S, period: Duration) -> Self {
        let mut ticks = interval(period);
        // A late consumer gets one item, not a burst of catch-up ticks
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self { source, ticks, newest: None, source_done: false }
    }
}

impl<S: Stream> Stream for Throttle<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        while !*this.source_done {
            match this.source.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => *this.newest = Some(item),
                Poll::Ready(None) => *this.source_done = true,
                Poll::Pending => break,
            }
        }

        if this.newest.is_none() {
            return if *this.source_done { Poll::Ready(None) } else { Poll::Pending };
        }

        ready!(this.ticks.poll_tick(cx));
        Poll::Ready(this.newest.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use futures::channel::mpsc;

    #[tokio::test]
    async fn burst_collapses_to_latest() {
        let out: Vec<u32> =
            futures::stream::iter(0..10).throttle(Duration::from_millis(10)).collect().await;
        assert_eq!(out, vec![9]);
    }

    #[tokio::test]
    async fn empty_source_ends() {
        let out: Vec<u32> =
            futures::stream::iter(Vec::<u32>::new()).throttle(Duration::from_millis(10)).collect().await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn waits_for_late_items() {
        let (tx, rx) = mpsc::unbounded();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.unbounded_send(1u32);
            tokio::time::sleep(Duration::from_millis(40)).await;
            let _ = tx.unbounded_send(2u32);
        });

        let out: Vec<u32> = rx.throttle(Duration::from_millis(5)).collect().await;
        assert_eq!(out, vec![1, 2]);
    }

    #[tokio::test]
    async fn spaces_emissions_by_period() {
        let (tx, rx) = mpsc::unbounded();
        tokio::spawn(async move {
            for i in 0..20u32 {
                let _ = tx.unbounded_send(i);
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        });

        let start = tokio::time::Instant::now();
        let out: Vec<u32> = rx.throttle(Duration::from_millis(15)).collect().await;
        assert!(out.len() < 20);
        assert_eq!(out.last(), Some(&19));
        assert!(out.windows(2).all(|w| w[0] < w[1]));
        assert!(start.elapsed() >= Duration::from_millis(15));
    }
}
