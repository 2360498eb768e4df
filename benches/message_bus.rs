//! Message bus throughput benchmarks.

use std::hint::black_box;
use std::sync::Arc;

use chipclaw::bus::{BoundedQueue, InboundMessage, MessageBus, OutboundMessage};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_queue(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("bounded_queue");

    for batch in [10usize, 100] {
        group.bench_with_input(BenchmarkId::new("put_get", batch), &batch, |b, &batch| {
            b.to_async(&rt).iter(|| async move {
                let queue = BoundedQueue::new(batch);
                for i in 0..batch {
                    queue.put(i).await.unwrap();
                }
                for _ in 0..batch {
                    black_box(queue.get().await);
                }
            });
        });
    }
    group.finish();
}

fn bench_inbound(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let bus = Arc::new(MessageBus::new());

    c.bench_function("bus_inbound_roundtrip", |b| {
        b.to_async(&rt).iter(|| {
            let bus = bus.clone();
            async move {
                bus.publish_inbound(InboundMessage::new(
                    "uart",
                    "uart_user",
                    "uart_default",
                    "read sensor 3",
                ))
                .await
                .unwrap();
                black_box(bus.consume_inbound().await);
            }
        });
    });
}

fn bench_outbound(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let bus = Arc::new(MessageBus::new());

    c.bench_function("bus_outbound_roundtrip", |b| {
        b.to_async(&rt).iter(|| {
            let bus = bus.clone();
            async move {
                bus.publish_outbound(OutboundMessage::new("mqtt", "room1", "vent closed"))
                    .await
                    .unwrap();
                black_box(bus.consume_outbound().await);
            }
        });
    });
}

criterion_group!(benches, bench_queue, bench_inbound, bench_outbound);
criterion_main!(benches);
