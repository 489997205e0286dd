//! Update rate control for sample streams

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often a subscriber wants to hear about new samples.
///
/// The poll loop produces at most one sample per poll interval, so any
/// requested rate at or above that is the same as [`UpdateRate::Native`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UpdateRate {
    /// One update per stored sample
    Native,

    /// At most this many updates per second; `Max(0)` means no limit
    Max(u32),
}

impl UpdateRate {
    /// Collapse rates the poll loop can never exceed into `Native`.
    pub fn normalize(self, poll_hz: f64) -> Self {
        match self {
            UpdateRate::Max(hz) if hz > 0 && f64::from(hz) < poll_hz => self,
            _ => UpdateRate::Native,
        }
    }

    /// Minimum spacing between updates, or `None` when unthrottled.
    pub fn throttle_interval(self, poll_hz: f64) -> Option<Duration> {
        match self.normalize(poll_hz) {
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(f64::from(hz).recip())),
            UpdateRate::Native => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faster_than_poll_rate_is_native() {
        assert_eq!(UpdateRate::Max(20).normalize(10.0), UpdateRate::Native);
        assert_eq!(UpdateRate::Max(10).normalize(10.0), UpdateRate::Native);
        assert_eq!(UpdateRate::Max(2).normalize(10.0), UpdateRate::Max(2));
    }

    #[test]
    fn unpaced_loop_still_throttles() {
        assert_eq!(UpdateRate::Max(5).normalize(f64::INFINITY), UpdateRate::Max(5));
        assert_eq!(UpdateRate::Native.normalize(f64::INFINITY), UpdateRate::Native);
    }

    #[test]
    fn zero_hz_means_unthrottled() {
        assert_eq!(UpdateRate::Max(0).throttle_interval(10.0), None);
    }

    #[test]
    fn interval_from_hz() {
        assert_eq!(UpdateRate::Max(4).throttle_interval(10.0), Some(Duration::from_millis(250)));
        assert_eq!(UpdateRate::Native.throttle_interval(10.0), None);
    }
}
