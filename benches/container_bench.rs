//! Benchmarks for resolution and scope churn

use criterion::{Criterion, criterion_group, criterion_main};
use plexus_di::{Container, Resolver, ScopedContainer, Tag};
use std::hint::black_box;
use tokio::runtime::Runtime;

fn bench_resolution(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("resolution");

    let tag: Tag<u64> = Tag::new("bench.value");
    let container = Container::new();
    container.register(&tag, |_ctx| async { Ok(42u64) }).unwrap();
    // Warm the cache so the benchmark measures the hit path
    rt.block_on(container.resolve(&tag)).unwrap();

    group.bench_function("cached_resolve", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(container.resolve(&tag).await.unwrap()) });
    });

    let dep: Tag<u64> = Tag::new("bench.dep");
    let derived: Tag<u64> = Tag::new("bench.derived");
    group.bench_function("cold_resolve_with_dependency", |b| {
        b.to_async(&rt).iter(|| async {
            let container = Container::new();
            container.register(&dep, |_ctx| async { Ok(1u64) }).unwrap();
            container
                .register(&derived, move |ctx| async move {
                    Ok(*ctx.resolve(&dep).await? * 2)
                })
                .unwrap();
            black_box(container.resolve(&derived).await.unwrap())
        });
    });

    group.finish();
}

fn bench_scopes(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("scopes");

    let tag: Tag<u64> = Tag::new("bench.app");
    let app = ScopedContainer::new("app");
    app.register(&tag, |_ctx| async { Ok(7u64) }).unwrap();
    rt.block_on(app.resolve(&tag)).unwrap();

    group.bench_function("child_create_and_resolve_parent", |b| {
        b.to_async(&rt).iter(|| async {
            let request = app.child("request").unwrap();
            black_box(request.resolve(&tag).await.unwrap())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_resolution, bench_scopes);
criterion_main!(benches);
