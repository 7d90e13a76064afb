use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use tokio::runtime::Runtime;
use queued::protocol::Session;
use queued::{FifoQueue, QueueRegistry};

fn items(count: usize) -> Vec<Vec<u8>> {
    (0..count as u32).map(|i| i.to_be_bytes().to_vec()).collect()
}

/// Benchmark: Single-threaded enqueue operations, with and without duplicates allowed
fn bench_enqueue_single_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("enqueue_single_thread");
    let payloads = items(1000);

    for allow_duplicates in [false, true] {
        group.throughput(Throughput::Elements(1000));
        group.bench_with_input(
            BenchmarkId::from_parameter(allow_duplicates),
            &allow_duplicates,
            |b, &allow_duplicates| {
                b.iter(|| {
                    let queue = FifoQueue::new("bench", allow_duplicates);
                    for payload in &payloads {
                        let _ = queue.enqueue(black_box(payload.clone()));
                    }
                });
            },
        );
    }
    group.finish();
}

/// Benchmark: Fill then drain
fn bench_dequeue_single_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("dequeue_single_thread");
    let payloads = items(1000);

    group.throughput(Throughput::Elements(1000));
    group.bench_function("fill_and_drain", |b| {
        b.iter(|| {
            let queue = FifoQueue::new("bench", false);
            for payload in &payloads {
                let _ = queue.enqueue(payload.clone());
            }
            for _ in 0..1000 {
                let _ = black_box(queue.dequeue());
            }
        });
    });
    group.finish();
}

/// Benchmark: Concurrent producers on one named queue
fn bench_concurrent_producers(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("concurrent_producers");

    for num_producers in [2u64, 4, 8, 16].iter() {
        group.throughput(Throughput::Elements(*num_producers * 1000));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_producers),
            num_producers,
            |b, &num_producers| {
                b.iter(|| {
                    rt.block_on(async {
                        let registry = Arc::new(QueueRegistry::new(true));

                        let mut handles = vec![];
                        for p in 0..num_producers {
                            let registry = registry.clone();
                            handles.push(tokio::spawn(async move {
                                let queue = registry.get_or_create("bench");
                                for i in 0..1000u64 {
                                    let _ = queue.enqueue([p.to_be_bytes(), i.to_be_bytes()].concat());
                                }
                            }));
                        }

                        for handle in handles {
                            handle.await.unwrap();
                        }
                    });
                });
            },
        );
    }
    group.finish();
}

/// Benchmark: Independent queues do not contend
fn bench_independent_queues(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("independent_queues");
    group.throughput(Throughput::Elements(8 * 1000));

    group.bench_function("8_queues", |b| {
        b.iter(|| {
            rt.block_on(async {
                let registry = Arc::new(QueueRegistry::new(false));
                let mut handles = vec![];
                for q in 0..8 {
                    let registry = registry.clone();
                    handles.push(tokio::spawn(async move {
                        let queue = registry.get_or_create(&format!("queue-{q}"));
                        for i in 0..1000u32 {
                            let _ = queue.enqueue(i.to_be_bytes().to_vec());
                        }
                        while queue.dequeue().is_ok() {}
                    }));
                }
                for handle in handles {
                    handle.await.unwrap();
                }
            });
        });
    });
    group.finish();
}

/// Benchmark: Protocol line handling, decode to encoded reply
fn bench_session_lines(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_lines");
    group.throughput(Throughput::Elements(2));

    group.bench_function("enque_deque", |b| {
        let mut session = Session::new(Arc::new(QueueRegistry::new(true)));
        b.iter(|| {
            black_box(session.handle_line(b"ENQUE aGVsbG8=").encode());
            black_box(session.handle_line(b"DEQUE").encode());
        });
    });
    group.finish();
}

/// Benchmark: Item size impact (hashing dominates)
fn bench_item_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("item_sizes");

    for size in [100, 1000, 10000, 100000].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let queue = FifoQueue::new("bench", true);
            let payload = vec![b'x'; size];

            b.iter(|| {
                let _ = queue.enqueue(black_box(payload.clone()));
                let _ = queue.dequeue();
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_enqueue_single_thread,
    bench_dequeue_single_thread,
    bench_concurrent_producers,
    bench_independent_queues,
    bench_session_lines,
    bench_item_sizes,
);

criterion_main!(benches);
