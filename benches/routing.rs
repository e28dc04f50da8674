use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::time::Duration;
use tntpool::core::{ConnEvent, Connector, Mode};
use tntpool::pool::{ConnectionPool, PoolOptions, RoundRobin};
use tntpool::sim::SimCluster;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

fn addr(i: usize) -> String {
    format!("127.0.0.1:{}", 3301 + i)
}

/// Subpool over `size` simulated connections; every `dead_every`-th member has
/// its link cut.
fn build_subpool(
    rt: &Runtime,
    size: usize,
    dead_every: Option<usize>,
) -> (RoundRobin, SimCluster, mpsc::Receiver<ConnEvent>) {
    let cluster = SimCluster::new();
    let connector = cluster.connector();
    let (events, rx) = mpsc::channel(size * 4);

    let mut subpool = RoundRobin::with_capacity(size);
    for i in 0..size {
        let addr = addr(i);
        let node = cluster.add_node(&addr, true);
        let conn = rt.block_on(connector.connect(&addr, events.clone())).unwrap();
        if dead_every.map_or(false, |n| i % n == 0) {
            node.set_link(false);
        }
        subpool.add_conn(&addr, conn);
    }
    (subpool, cluster, rx)
}

/// Subpool selection benchmarks
fn bench_next_alive(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("next_alive");

    for size in [3, 16, 128].iter() {
        let (all_alive, _cluster, _events) = build_subpool(&rt, *size, None);
        group.bench_with_input(BenchmarkId::new("all_alive", size), size, |b, _| {
            b.iter(|| black_box(all_alive.next_alive()));
        });

        let (half_dead, _dead_cluster, _dead_events) = build_subpool(&rt, *size, Some(2));
        group.bench_with_input(BenchmarkId::new("half_dead", size), size, |b, _| {
            b.iter(|| black_box(half_dead.next_alive()));
        });
    }

    group.finish();
}

/// Pool-level routing and dispatch benchmarks
fn bench_pool_routing(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let cluster = SimCluster::new();
    let addrs: Vec<String> = (0..5).map(addr).collect();
    for (i, addr) in addrs.iter().enumerate() {
        cluster.add_node(addr, i % 2 == 1);
    }

    let opts = PoolOptions {
        check_interval: Duration::from_secs(60),
        ..PoolOptions::default()
    };
    let pool = rt
        .block_on(ConnectionPool::connect_with_opts(addrs, cluster.connector(), opts))
        .unwrap();

    let pool = &pool;
    let mut group = c.benchmark_group("pool_routing");
    for mode in [Mode::RW, Mode::PreferRW, Mode::PreferRO] {
        group.bench_with_input(BenchmarkId::new("resolve", mode), &mode, |b, &mode| {
            b.to_async(&rt).iter(|| async move { black_box(pool.resolve(mode).await.unwrap()) });
        });
        group.bench_with_input(BenchmarkId::new("ping", mode), &mode, |b, &mode| {
            b.to_async(&rt).iter(|| async move { black_box(pool.ping(&[mode]).await.unwrap()) });
        });
    }
    group.bench_function("call17_async", |b| {
        b.to_async(&rt).iter(|| async move {
            black_box(pool.call17_async("box.info", json!([]), &[]).await.unwrap())
        });
    });
    group.finish();

    rt.block_on(pool.close());
}

criterion_group!(benches, bench_next_alive, bench_pool_routing);
criterion_main!(benches);
