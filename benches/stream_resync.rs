//! Benchmarks for resynchronization over noisy byte streams
//!
//! Measures how fast the scanner recovers frames when garbage precedes
//! every response. Uses the replay transport, so no hardware is needed.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use sensorlink::codec::FrameLayout;
use sensorlink::resync::{ResyncTiming, Resynchronizer};
use sensorlink::test_utils::noisy_stream;
use sensorlink::transports::ReplayTransport;
use std::hint::black_box;
use std::time::Duration;

const FRAMES: usize = 100;

fn bench_resync(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let resync = Resynchronizer::new(
        FrameLayout::default(),
        ResyncTiming {
            scan_timeout: Duration::from_millis(100),
            frame_timeout: Duration::from_millis(50),
        },
    );
    let values: Vec<u16> = (0..FRAMES as u16).collect();

    let mut group = c.benchmark_group("resync_frames");
    for noise in [0usize, 8, 64] {
        let stream = noisy_stream(&values, noise);
        group.throughput(Throughput::Bytes(stream.len() as u64));
        group.bench_with_input(BenchmarkId::new("noise", noise), &stream, |b, stream| {
            b.iter(|| {
                runtime.block_on(async {
                    let mut transport = ReplayTransport::from_bytes(stream.clone());
                    for _ in 0..FRAMES {
                        black_box(resync.next_frame(&mut transport).await.unwrap());
                    }
                })
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_resync);
criterion_main!(benches);
