//! Fixtures shared by unit tests, integration tests and benches
//!
//! Frames here always use the default layout (address 1, 7 bytes, value at
//! offset 3) unless a layout is passed explicitly.

use std::time::Duration;

use crate::codec::{FrameLayout, READ_HOLDING_REGISTERS, encode_response};
use crate::config::{SensorConfig, TimingConfig};
use crate::transports::ReplayChunk;

/// Valid response frame carrying `value`.
pub fn response_frame(value: u16) -> Vec<u8> {
    encode_response(&FrameLayout::default(), READ_HOLDING_REGISTERS, value)
}

/// Response frame released without delay.
pub fn response_chunk(value: u16) -> ReplayChunk {
    ReplayChunk::immediate(response_frame(value))
}

/// Response frame whose data byte is flipped after the CRC was computed.
pub fn corrupted_frame(value: u16) -> Vec<u8> {
    let mut frame = response_frame(value);
    frame[3] ^= 0x80;
    frame
}

/// Noise that never contains the default start byte (0x01).
pub fn garbage(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| match seed.wrapping_add((i as u8).wrapping_mul(37)) {
            0x01 => 0x02,
            b => b,
        })
        .collect()
}

/// Line recording with `noise` garbage bytes before every frame.
pub fn noisy_stream(values: &[u16], noise: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    for (i, &value) in values.iter().enumerate() {
        bytes.extend(garbage(noise, i as u8));
        bytes.extend(response_frame(value));
    }
    bytes
}

/// Default configuration with short timeouts so failing tests finish fast.
pub fn fast_config() -> SensorConfig {
    SensorConfig {
        timing: TimingConfig { scan_timeout_ms: 40, frame_timeout_ms: 20, poll_interval_ms: 1 },
        history_capacity: 16,
        ..SensorConfig::default()
    }
}

/// Upper bound for waiting on something a fast-config loop should do.
pub const SETTLE: Duration = Duration::from_secs(2);

/// Install a test subscriber once; later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::validate_frame;

    #[test]
    fn garbage_never_contains_start_byte() {
        for seed in 0..=255u8 {
            assert!(!garbage(64, seed).contains(&0x01));
        }
    }

    #[test]
    fn fixtures_validate_as_expected() {
        let layout = FrameLayout::default();
        assert_eq!(validate_frame(&response_frame(200), &layout).unwrap().value(), 200);
        assert!(validate_frame(&corrupted_frame(200), &layout).is_err());
        assert_eq!(noisy_stream(&[1, 2], 3).len(), 2 * (3 + 7));
        fast_config().validate().unwrap();
    }
}
