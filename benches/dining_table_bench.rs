use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use foundation_simulations::dining_table::DiningTable;
use std::sync::Arc;
use std::thread;

const MEALS_PER_PHILOSOPHER: usize = 1_000;

/// Benchmark every philosopher eating back to back with no think time.
fn bench_contended_meals(c: &mut Criterion) {
    let mut group = c.benchmark_group("dining_contended_meals");

    for philosophers in [2_usize, 5, 16] {
        group.throughput(Throughput::Elements((philosophers * MEALS_PER_PHILOSOPHER) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(philosophers),
            &philosophers,
            |b, &philosophers| {
                b.iter(|| {
                    let table = Arc::new(DiningTable::new(philosophers).expect("valid table"));
                    let handles: Vec<_> = (0..philosophers)
                        .map(|id| {
                            let table = Arc::clone(&table);
                            thread::spawn(move || {
                                for _ in 0..MEALS_PER_PHILOSOPHER {
                                    table.pick_up_forks(id).expect("table is open");
                                    table.put_down_forks(id);
                                }
                            })
                        })
                        .collect();

                    for handle in handles {
                        handle.join().unwrap();
                    }
                    black_box(table.total_meals());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_contended_meals);
criterion_main!(benches);
