//! Benchmarks for burst ring performance.
//!
//! Compares nexus-ring against crossbeam-queue's ArrayQueue.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use crossbeam_queue::ArrayQueue;
use nexus_ring::Ring;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

const CAPACITY: usize = 1024;

// ============================================================================
// Single-operation latency (no contention)
// ============================================================================

fn bench_push_pop_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_latency");

    group.bench_function("nexus_ring/u64", |b| {
        let ring = Ring::<u64>::with_capacity(CAPACITY).unwrap();
        b.iter(|| {
            ring.try_push(black_box(42u64)).unwrap();
            black_box(ring.consumer().unwrap().try_pop().unwrap())
        });
    });

    group.bench_function("crossbeam_array/u64", |b| {
        let q = ArrayQueue::<u64>::new(CAPACITY);
        b.iter(|| {
            q.push(black_box(42u64)).unwrap();
            black_box(q.pop().unwrap())
        });
    });

    group.finish();
}

// ============================================================================
// Burst enqueue + burst dequeue at dataplane batch sizes
// ============================================================================

fn bench_burst(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_burst");

    for burst in [1usize, 8, 32] {
        group.throughput(Throughput::Elements(burst as u64));

        group.bench_with_input(BenchmarkId::new("nexus_ring", burst), &burst, |b, &burst| {
            let ring = Ring::<u64>::with_capacity(CAPACITY).unwrap();
            let mut batch = Vec::with_capacity(burst);
            let mut out = Vec::with_capacity(burst);
            b.iter(|| {
                batch.extend(0..burst as u64);
                black_box(ring.enqueue_burst(&mut batch));
                out.clear();
                black_box(ring.consumer().unwrap().dequeue_burst(&mut out, burst))
            });
        });

        group.bench_with_input(BenchmarkId::new("crossbeam_array", burst), &burst, |b, &burst| {
            let q = ArrayQueue::<u64>::new(CAPACITY);
            let mut out = Vec::with_capacity(burst);
            b.iter(|| {
                for i in 0..burst as u64 {
                    let _ = q.push(black_box(i));
                }
                out.clear();
                while out.len() < burst {
                    match q.pop() {
                        Some(v) => out.push(v),
                        None => break,
                    }
                }
                black_box(out.len())
            });
        });
    }

    group.finish();
}

// ============================================================================
// Contended producers with a draining consumer thread
// ============================================================================

fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_contention");
    group.throughput(Throughput::Elements(32));

    group.bench_function("nexus_ring/4_producers", |b| {
        let ring = Arc::new(Ring::<u64>::with_capacity(CAPACITY).unwrap());
        let done = Arc::new(AtomicBool::new(false));

        let producers: Vec<_> = (0..3)
            .map(|_| {
                let ring = Arc::clone(&ring);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut batch = Vec::with_capacity(32);
                    while !done.load(Ordering::Relaxed) {
                        batch.clear();
                        batch.extend(0..32u64);
                        ring.enqueue_burst(&mut batch);
                    }
                })
            })
            .collect();

        let consumer_ring = Arc::clone(&ring);
        let consumer_done = Arc::clone(&done);
        let consumer = thread::spawn(move || {
            let mut out = Vec::with_capacity(32);
            let mut consumer = consumer_ring.consumer().unwrap();
            while !consumer_done.load(Ordering::Relaxed) {
                out.clear();
                consumer.dequeue_burst(&mut out, 32);
            }
        });

        let mut batch = Vec::with_capacity(32);
        b.iter(|| {
            batch.clear();
            batch.extend(0..32u64);
            black_box(ring.enqueue_burst(&mut batch))
        });

        done.store(true, Ordering::Relaxed);
        for handle in producers {
            handle.join().unwrap();
        }
        consumer.join().unwrap();
    });

    group.finish();
}

criterion_group!(benches, bench_push_pop_latency, bench_burst, bench_contention);

criterion_main!(benches);
