//! Decoded measurement values

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A 16-bit measurement extracted from a validated response frame.
///
/// Only [`crate::codec::validate_frame`] produces these; the arrival time is
/// attached later by whoever consumes the frame (see [`DecodedSample::stamp`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecodedSample {
    value: u16,
}

impl DecodedSample {
    pub(crate) fn new(value: u16) -> Self {
        Self { value }
    }

    /// Reconstruct the value from the big-endian register bytes.
    pub(crate) fn from_be_bytes(msb: u8, lsb: u8) -> Self {
        Self::new(u16::from_be_bytes([msb, lsb]))
    }

    /// Raw register value.
    pub fn value(self) -> u16 {
        self.value
    }

    /// Attach an arrival position and time.
    pub fn stamp(self, sequence: u64, elapsed: Duration) -> Sample {
        Sample { sequence, elapsed, value: self.value }
    }
}

/// A decoded measurement with its arrival stamp.
///
/// `sequence` counts successful polls starting at 1; `elapsed` is measured
/// from the moment polling started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub sequence: u64,
    pub elapsed: Duration,
    pub value: u16,
}

impl Sample {
    /// Value converted to engineering units with a linear factor.
    ///
    /// The reference current sensor reports 0.02 A per count.
    pub fn scaled(&self, scale: f64) -> f64 {
        f64::from(self.value) * scale
    }

    /// Elapsed time in fractional seconds.
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}
