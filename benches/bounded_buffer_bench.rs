use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use foundation_simulations::bounded_buffer::{BoundedBuffer, Item};
use std::sync::Arc;
use std::thread;

const ITEMS: u64 = 10_000;

/// Benchmark produce/consume pairs on one thread, so neither side parks.
fn bench_uncontended_round_trip(c: &mut Criterion) {
    let buffer = BoundedBuffer::<Item>::new(1).expect("valid capacity");
    c.bench_function("buffer_produce_consume_uncontended", |b| {
        b.iter(|| {
            buffer.produce(black_box(Item(1))).expect("should produce");
            black_box(buffer.consume().expect("should consume"));
        });
    });
}

/// Benchmark a producer thread against a consumer thread across capacities.
fn bench_producer_consumer_threads(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_producer_consumer");
    group.throughput(Throughput::Elements(ITEMS));

    for capacity in [1_usize, 8, 64] {
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| {
                    let buffer =
                        Arc::new(BoundedBuffer::<Item>::new(capacity).expect("valid capacity"));

                    let producer_buffer = Arc::clone(&buffer);
                    let producer = thread::spawn(move || {
                        for serial in 0..ITEMS {
                            producer_buffer.produce(Item(serial)).expect("should produce");
                        }
                    });

                    for _ in 0..ITEMS {
                        black_box(buffer.consume().expect("should consume"));
                    }
                    producer.join().unwrap();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_uncontended_round_trip,
    bench_producer_consumer_threads
);
criterion_main!(benches);
