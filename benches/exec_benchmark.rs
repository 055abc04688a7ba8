use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fast::exec::{call, for_each};
use futures::FutureExt;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

fn bench_for_each_regimes(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("for_each");

    // sequential, single wave, streaming
    for (label, batch) in [("sequential", 1usize), ("single_wave", 0), ("streaming", 8)] {
        group.bench_with_input(BenchmarkId::new(label, 64), &batch, |b, &batch| {
            b.iter(|| {
                let result: Result<(), ()> = rt.block_on(for_each(64, batch, |i| async move {
                    black_box(i);
                    Ok(())
                }));
                black_box(result)
            });
        });
    }

    group.bench_function("streaming_early_exit", |b| {
        b.iter(|| {
            let result = rt.block_on(for_each(10_000, 8, |i| async move {
                if i == 100 {
                    Err(i)
                } else {
                    Ok(())
                }
            }));
            black_box(result)
        });
    });

    group.finish();
}

fn bench_call(c: &mut Criterion) {
    let rt = runtime();

    c.bench_function("call_4", |b| {
        b.iter(|| {
            let result = rt.block_on(call(
                (0..4).map(|i| async move { black_box(i); Ok::<(), ()>(()) }.boxed()),
            ));
            black_box(result)
        });
    });
}

fn bench_utilities(c: &mut Criterion) {
    c.bench_function("clock_time", |b| b.iter(|| black_box(fast::clock::time())));
    c.bench_function("chrono_now", |b| b.iter(|| black_box(chrono::Local::now())));
    c.bench_function("rand_id_16", |b| b.iter(|| black_box(fast::random::rand_id(16))));
}

criterion_group!(benches, bench_for_each_regimes, bench_call, bench_utilities);
criterion_main!(benches);
