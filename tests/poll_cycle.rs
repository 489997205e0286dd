//! End-to-end poll loop tests over scripted transports

use futures::StreamExt;
use sensorlink::codec::{FrameLayout, READ_HOLDING_REGISTERS, ReadRequest, encode_response};
use sensorlink::config::TimingConfig;
use sensorlink::transports::{ReplayChunk, ReplayTransport};
use sensorlink::{
    DriverOptions, ErrorEvent, FrameError, LinkError, SensorConfig, SensorLink, UpdateRate,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn config() -> SensorConfig {
    SensorConfig {
        timing: TimingConfig { scan_timeout_ms: 40, frame_timeout_ms: 20, poll_interval_ms: 1 },
        history_capacity: 8,
        ..SensorConfig::default()
    }
}

fn frame(value: u16) -> Vec<u8> {
    encode_response(&FrameLayout::default(), READ_HOLDING_REGISTERS, value)
}

fn options(max_samples: u64) -> DriverOptions {
    DriverOptions { poll_interval: Duration::from_millis(1), max_samples: Some(max_samples) }
}

#[tokio::test]
async fn reference_frame_decodes_to_200() {
    let transport = ReplayTransport::responding(vec![ReplayChunk::immediate(vec![
        0x01, 0x03, 0x02, 0x00, 0xC8, 0xB9, 0xD2,
    ])]);
    let log = transport.write_log();

    let connection =
        SensorLink::attach_with(transport, &config(), Arc::new(()), options(1)).unwrap();
    let history = connection.history();
    connection.join().await.unwrap();

    assert_eq!(history.latest().map(|s| s.value), Some(200));
    assert_eq!(log.frames(), vec![vec![0x01, 0x03, 0x00, 0x56, 0x00, 0x01, 0x64, 0x1A]]);
    assert_eq!(ReadRequest::default().encode().as_bytes(), log.frames()[0].as_slice());
}

#[tokio::test]
async fn recovers_frames_from_noisy_line() {
    // [garbage][frame][garbage][frame] with the second frame split mid-way
    let mut first = vec![0xFF, 0x00, 0x7E];
    first.extend(frame(111));
    first.extend([0x55, 0xAA]);
    let second = frame(222);

    let transport = ReplayTransport::new(vec![
        ReplayChunk::immediate(first),
        ReplayChunk::with_delay(second[..3].to_vec(), Duration::from_millis(5)),
        ReplayChunk::with_delay(second[3..].to_vec(), Duration::from_millis(5)),
    ]);

    let connection =
        SensorLink::attach_with(transport, &config(), Arc::new(()), options(2)).unwrap();
    let history = connection.history();
    let summary = connection.join().await.unwrap();

    assert_eq!(summary.samples, 2);
    let values: Vec<u16> = history.snapshot().iter().map(|s| s.value).collect();
    assert_eq!(values, vec![111, 222]);
}

#[tokio::test]
async fn errors_reach_sink_and_loop_continues() {
    let mut bad_crc = frame(5);
    bad_crc.swap(5, 6);

    let transport = ReplayTransport::responding(vec![
        ReplayChunk::immediate(frame(1)),
        ReplayChunk::immediate(bad_crc),
        ReplayChunk::immediate(vec![0x01, 0x03, 0x02]),
        ReplayChunk::immediate(frame(2)),
    ]);
    let (tx, mut rx) = mpsc::unbounded_channel::<ErrorEvent>();

    let connection =
        SensorLink::attach_with(transport, &config(), Arc::new(tx), options(2)).unwrap();
    let history = connection.history();
    let summary = connection.join().await.unwrap();

    assert_eq!(summary.samples, 2);
    assert!(summary.errors >= 2);
    let values: Vec<u16> = history.snapshot().iter().map(|s| s.value).collect();
    assert_eq!(values, vec![1, 2]);

    let first = rx.recv().await.unwrap();
    assert!(matches!(*first.error, FrameError::ChecksumMismatch { .. }));
    assert_eq!(first.consecutive, 1);
    let second = rx.recv().await.unwrap();
    assert!(matches!(*second.error, FrameError::IncompleteFrame { received: 3, .. }));
    assert_eq!(second.consecutive, 2);
}

#[tokio::test]
async fn history_keeps_newest_samples() {
    let transport = ReplayTransport::responding(
        (1..=20).map(|v| ReplayChunk::immediate(frame(v))).collect(),
    );
    let connection =
        SensorLink::attach_with(transport, &config(), Arc::new(()), options(20)).unwrap();
    let history = connection.history();
    connection.join().await.unwrap();

    let samples = history.snapshot();
    assert_eq!(samples.len(), 8);
    assert_eq!(samples.iter().map(|s| s.value).collect::<Vec<_>>(), (13..=20).collect::<Vec<_>>());
    assert!(samples.windows(2).all(|w| w[0].sequence + 1 == w[1].sequence));
    assert!(samples.windows(2).all(|w| w[0].elapsed <= w[1].elapsed));
}

#[tokio::test]
async fn throttled_subscription_ends_with_latest() {
    let chunks = (1..=30)
        .map(|v| ReplayChunk::with_delay(frame(v), Duration::from_millis(2)))
        .collect();
    let connection = SensorLink::attach_with(
        ReplayTransport::responding(chunks),
        &config(),
        Arc::new(()),
        options(30),
    )
    .unwrap();

    let values: Vec<u16> =
        connection.subscribe(UpdateRate::Max(20)).map(|s| s.value).collect().await;
    assert!(!values.is_empty());
    assert!(values.len() < 30);
    assert_eq!(values.last(), Some(&30));
}

#[tokio::test]
async fn silent_line_times_out_until_cancelled() {
    let (tx, mut rx) = mpsc::unbounded_channel::<ErrorEvent>();
    let connection = SensorLink::attach_with(
        ReplayTransport::new(Vec::new()),
        &config(),
        Arc::new(tx),
        DriverOptions { poll_interval: Duration::from_millis(1), max_samples: None },
    )
    .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    assert!(matches!(*event.error, FrameError::Timeout { discarded: 0, .. }));

    let summary = connection.shutdown().await.unwrap();
    assert_eq!(summary.samples, 0);
    assert!(summary.errors >= 1);
}

#[tokio::test]
async fn replay_capture_runs_until_exhausted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("line.bin");
    let mut capture = vec![0x42, 0x00];
    for v in [10, 20, 30] {
        capture.extend(frame(v));
        capture.push(0xEE);
    }
    std::fs::write(&path, &capture).unwrap();

    let connection = SensorLink::replay(&path, &config()).unwrap();
    let history = connection.history();
    let err = connection.join().await.unwrap_err();

    assert!(matches!(err, LinkError::Frame(FrameError::TransportClosed { .. })));
    let values: Vec<u16> = history.snapshot().iter().map(|s| s.value).collect();
    assert_eq!(values, vec![10, 20, 30]);
}

#[tokio::test]
async fn missing_capture_is_file_error() {
    let result = SensorLink::replay("/nonexistent/capture.bin", &config());
    assert!(matches!(result, Err(LinkError::File { .. })));
}
