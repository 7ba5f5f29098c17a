//! Dispatch Benchmarks
//!
//! Submission latency for both lanes and raw intake throughput.

use std::ptr::{self, NonNull};
use std::sync::Arc;
use std::sync::atomic::AtomicPtr;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use eff_clients::{ClientRegistry, RecordingHost};
use eff_core::{AudioObjectId, ClientId, ClientIo, PropertySelector, ShadowMaps};
use eff_taskqueue::{IntakeStack, Lane, Linked, Task, TaskQueue, TaskQueueConfig};

fn bench_queue() -> TaskQueue {
    let config = TaskQueueConfig {
        promote_realtime_worker: false,
        ..TaskQueueConfig::default()
    };
    TaskQueue::new(config, Arc::new(RecordingHost::new())).expect("task queue should start")
}

/// Sync round trip to each worker
fn bench_sync_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync_round_trip");
    let queue = bench_queue();

    let maps: Arc<dyn ShadowMaps> = ClientRegistry::new();
    group.bench_function("realtime_swap", |b| {
        b.iter(|| black_box(queue.queue_sync(Task::SwapClientShadowMaps(maps.clone()), Lane::RealTime)))
    });

    let clients: Arc<dyn ClientIo> = ClientRegistry::new();
    group.bench_function("non_realtime_stop_io", |b| {
        b.iter(|| {
            black_box(queue.queue_update_client_io_state(true, clients.clone(), ClientId(1), false))
        })
    });

    group.finish();
}

/// Async submissions followed by one sync barrier
fn bench_async_burst(c: &mut Criterion) {
    let mut group = c.benchmark_group("async_burst");
    let queue = bench_queue();
    let clients: Arc<dyn ClientIo> = ClientRegistry::new();

    // The last size overflows the default free list
    for &burst in &[16_usize, 256, 1024] {
        group.throughput(Throughput::Elements(burst as u64));

        group.bench_with_input(BenchmarkId::new("notifications", burst), &burst, |b, &burst| {
            b.iter(|| {
                for _ in 0..burst {
                    queue.queue_async_send_property_notification(
                        PropertySelector::DEVICE_IS_RUNNING,
                        AudioObjectId::DEVICE,
                    );
                }
                queue.queue_update_client_io_state(true, clients.clone(), ClientId(1), false)
            })
        });
    }

    group.finish();
}

struct Node {
    link: AtomicPtr<Node>,
}

unsafe impl Linked for Node {
    fn link(&self) -> &AtomicPtr<Self> {
        &self.link
    }
}

/// Push then drain, without any worker
fn bench_intake(c: &mut Criterion) {
    let mut group = c.benchmark_group("intake_stack");

    for &count in &[64_usize, 512] {
        let nodes: Vec<Node> = (0..count)
            .map(|_| Node {
                link: AtomicPtr::new(ptr::null_mut()),
            })
            .collect();
        let stack = IntakeStack::new();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("push_drain", count), &count, |b, _| {
            b.iter(|| {
                for node in &nodes {
                    unsafe { stack.push_atomic(NonNull::from(node)) };
                }
                black_box(stack.pop_all_reversed().count())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sync_round_trip, bench_async_burst, bench_intake);

criterion_main!(benches);
