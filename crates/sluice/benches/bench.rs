use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use sluice::{BatchOptions, PoolConfig, WorkerContext, WorkerPool, run_batch};
use std::time::Instant;
use tokio::runtime::Builder;

const TOTAL_JOBS: u64 = 10_000;

fn worker_counts() -> Vec<usize> {
    let mut counts = vec![1, 2, 4, 8];
    let cpus = num_cpus::get();
    if !counts.contains(&cpus) {
        counts.push(cpus);
    }
    counts
}

async fn checksum(_ctx: WorkerContext, n: u64) -> Result<u64, String> {
    Ok(black_box(n.wrapping_mul(0x9E37_79B9_7F4A_7C15).rotate_left(17)))
}

async fn yielding(_ctx: WorkerContext, n: u64) -> Result<u64, String> {
    tokio::task::yield_now().await;
    Ok(black_box(n))
}

fn bench_batch(c: &mut Criterion) {
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();

    for (name, yield_each_job) in [("batch/checksum", false), ("batch/yield", true)] {
        let mut group = c.benchmark_group(name);
        group.throughput(Throughput::Elements(TOTAL_JOBS));

        for workers in worker_counts() {
            group.bench_function(format!("elems/{TOTAL_JOBS}/workers/{workers}"), |b| {
                b.to_async(&rt).iter_custom(|iters| async move {
                    let config = PoolConfig::with_workers(workers)
                        .queue_capacity(1024)
                        .result_capacity(1024);
                    let start = Instant::now();
                    for _ in 0..iters {
                        let options = BatchOptions::new(config.clone());
                        let outcome = if yield_each_job {
                            run_batch(yielding, 0..TOTAL_JOBS, options).await
                        } else {
                            run_batch(checksum, 0..TOTAL_JOBS, options).await
                        };
                        let outcome = outcome.unwrap();
                        assert_eq!(outcome.results.len() as u64, TOTAL_JOBS);
                        black_box(outcome);
                    }
                    start.elapsed()
                });
            });
        }

        group.finish();
    }
}

/// Submission throughput with a small queue: measures how quickly producers
/// are released under backpressure.
fn bench_backpressure(c: &mut Criterion) {
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();
    let mut group = c.benchmark_group("submit/backpressure");
    group.throughput(Throughput::Elements(TOTAL_JOBS));

    for queue_capacity in [1, 16, 256] {
        group.bench_function(format!("elems/{TOTAL_JOBS}/queue/{queue_capacity}"), |b| {
            b.to_async(&rt).iter_custom(|iters| async move {
                let start = Instant::now();
                for _ in 0..iters {
                    let config = PoolConfig::with_workers(4)
                        .queue_capacity(queue_capacity)
                        .result_capacity(queue_capacity);
                    let pool = WorkerPool::new(config, checksum).unwrap();
                    let results = pool.take_results().unwrap();
                    let consumer = tokio::spawn(results.collect_ordered());
                    pool.start().unwrap();
                    for n in 0..TOTAL_JOBS {
                        pool.submit(n).await.unwrap();
                    }
                    let report = pool.close_and_wait().await.unwrap();
                    assert_eq!(consumer.await.unwrap().len() as u64, report.submitted);
                }
                start.elapsed()
            });
        });
    }

    group.finish();
}

criterion_group!(pool_benches, bench_batch, bench_backpressure);
criterion_main!(pool_benches);
