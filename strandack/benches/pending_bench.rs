// StrandAck client-core benchmarks using criterion.
//
// Measures:
//   - Frame envelope encode / inbound ack decode
//   - Pending table insert + ack churn
//   - Pending table teardown drain

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use strandack::frame::{Ack, Frame, Inbound};
use strandack::pending::{PendingEntry, PendingTable};
use strandack::retry::{RetryPolicy, RetryScheduler};

// ---------------------------------------------------------------------------
// Wire codec
// ---------------------------------------------------------------------------

fn bench_frame_encode(c: &mut Criterion) {
    let sizes: &[usize] = &[16, 256, 4096];

    let mut group = c.benchmark_group("frame_encode");
    for &size in sizes {
        let frame = Frame::with_payload(42, Some(3), "x".repeat(size));
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{size}B")),
            &frame,
            |b, f| {
                b.iter(|| {
                    black_box(f.encode().unwrap());
                });
            },
        );
    }
    group.finish();
}

fn bench_ack_decode(c: &mut Criterion) {
    let raw = Ack::for_client(123_456, 7).encode().unwrap();
    c.bench_function("ack_decode", |b| {
        b.iter(|| {
            black_box(Inbound::decode(black_box(&raw)).unwrap());
        });
    });

    c.bench_function("malformed_decode", |b| {
        b.iter(|| {
            black_box(Inbound::decode(black_box("{\"frameId\": oops")).is_err());
        });
    });
}

// ---------------------------------------------------------------------------
// Pending table
// ---------------------------------------------------------------------------

fn bench_pending_churn(c: &mut Criterion) {
    // Worker threads reap the cancelled timer tasks between iterations.
    let rt = tokio::runtime::Runtime::new().unwrap();
    let _guard = rt.enter();

    c.bench_function("pending_insert_ack_1000", |b| {
        let (mut scheduler, _expiries) = RetryScheduler::new(RetryPolicy::default());
        b.iter(|| {
            let mut table = PendingTable::new();
            for id in 0..1000 {
                let retry = scheduler.arm(id, 0);
                table.insert(PendingEntry::new(Frame::new(id, None), retry)).unwrap();
            }
            for id in 0..1000 {
                black_box(table.cancel_and_remove(id));
            }
            black_box(table.len());
        });
    });

    c.bench_function("pending_drain_1000", |b| {
        let (mut scheduler, _expiries) = RetryScheduler::new(RetryPolicy::default());
        b.iter(|| {
            let mut table = PendingTable::new();
            for id in 0..1000 {
                let retry = scheduler.arm(id, 0);
                table.insert(PendingEntry::new(Frame::new(id, None), retry)).unwrap();
            }
            black_box(table.drain_all().count());
        });
    });
}

// ---------------------------------------------------------------------------
// Criterion harness
// ---------------------------------------------------------------------------

criterion_group! {
    name = pending_benches;
    config = Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(5));
    targets =
        bench_frame_encode,
        bench_ack_decode,
        bench_pending_churn
}

criterion_main!(pending_benches);
