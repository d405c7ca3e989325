use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use orderbook::clock::NANOS_PER_SECOND;
use orderbook::{
    Message, MessageKind, OrderId, SecuritySnapshot, Session, SessionConfig, Side, Symbol,
};

fn add(id: u64, locate: u16, ts: u64) -> Message {
    Message::AddOrder {
        locate,
        timestamp: ts,
        order_id: OrderId(id),
        side: if id % 2 == 0 { Side::Buy } else { Side::Sell },
        qty: 100,
        price: 1_000_000 + (id % 500) as u32,
        attributed: false,
    }
}

/// Add, partial execute, cancel, replace and delete in a repeating pattern.
fn synthetic_stream(n: usize) -> Vec<Vec<u8>> {
    let mut out = Vec::with_capacity(n);
    for i in 0..n as u64 {
        let ts = 4 * 3_600 * NANOS_PER_SECOND + i * 1_000;
        let locate = (i % 64) as u16 + 1;
        let msg = match i % 5 {
            0 | 1 => add(i, locate, ts),
            2 => Message::OrderExecuted {
                locate,
                timestamp: ts,
                order_id: OrderId(i - 2),
                qty: 40,
            },
            3 => Message::OrderReplace {
                locate,
                old_order_id: OrderId(i - 3),
                new_order_id: OrderId(i + 1_000_000),
                qty: 80,
                price: 1_000_100,
            },
            _ => Message::OrderCancel {
                order_id: OrderId(i - 4),
                qty: 30,
            },
        };
        out.push(msg.encode());
    }
    out
}

fn primed_session() -> Session {
    let mut s = Session::new(SessionConfig::default());
    for locate in 1..=64u16 {
        s.register_security(locate, Symbol::new(&format!("SYM{locate}")));
    }
    s
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let kinds = [
        MessageKind::AddOrder,
        MessageKind::OrderExecuted,
        MessageKind::OrderReplace,
    ];
    let frames = synthetic_stream(5);

    for (kind, bytes) in kinds.iter().zip([&frames[0], &frames[2], &frames[3]]) {
        group.bench_with_input(BenchmarkId::new("message", kind.label()), bytes, |b, bytes| {
            b.iter(|| black_box(Message::decode(*kind, black_box(bytes))))
        });
    }
    group.finish();
}

fn bench_handle(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_handle");

    for &n in [1_000usize, 10_000, 100_000].iter() {
        let stream = synthetic_stream(n);
        group.bench_with_input(BenchmarkId::new("mixed_stream", n), &stream, |b, stream| {
            b.iter_batched(
                primed_session,
                |mut s| {
                    let mut sink: Vec<SecuritySnapshot> = Vec::new();
                    for frame in stream {
                        let _ = s.handle_raw(frame);
                        s.poll_snapshots(&mut sink);
                    }
                    black_box(s.book().len())
                },
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    c.bench_function("hourly_snapshot_64_locates", |b| {
        b.iter_batched(
            || {
                let mut s = primed_session();
                for frame in synthetic_stream(10_000) {
                    let _ = s.handle_raw(&frame);
                }
                s
            },
            |mut s| {
                let mut sink: Vec<SecuritySnapshot> = Vec::new();
                black_box(s.finish(&mut sink));
                sink
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_decode, bench_handle, bench_snapshot);
criterion_main!(benches);
