use canopy_di::{LifetimeScope, Registration};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

// ===== Micro Benchmarks =====

fn bench_singleton_hit(c: &mut Criterion) {
    let root = LifetimeScope::root(|r| {
        r.register(
            Registration::for_type::<u64>()
                .activate_with(|_| Ok(42))
                .single_instance()
                .build(),
        );
    });

    // Prime the share cache
    let _ = root.resolve_typed::<u64>().unwrap();

    c.bench_function("singleton_hit_u64", |b| {
        b.iter(|| {
            let v = root.resolve_typed::<u64>().unwrap();
            black_box(v);
        })
    });
}

fn bench_transient_vs_per_scope(c: &mut Criterion) {
    struct Payload {
        data: [u8; 64],
    }

    let mut group = c.benchmark_group("transient_vs_per_scope");

    let transient_root = LifetimeScope::root(|r| {
        r.register(
            Registration::for_type::<Payload>()
                .activate_with(|_| Ok(Payload { data: [0; 64] }))
                .build(),
        );
    });

    group.bench_function("transient", |b| {
        b.iter(|| {
            let v = transient_root.resolve_typed::<Payload>().unwrap();
            black_box(&v.data);
        })
    });

    let shared_root = LifetimeScope::root(|r| {
        r.register(
            Registration::for_type::<Payload>()
                .activate_with(|_| Ok(Payload { data: [0; 64] }))
                .instance_per_lifetime_scope()
                .build(),
        );
    });
    let scope = shared_root.begin_child().unwrap();

    group.bench_function("per_scope_hit", |b| {
        b.iter(|| {
            let v = scope.resolve_typed::<Payload>().unwrap();
            black_box(&v.data);
        })
    });

    group.finish();
}

fn bench_dependency_chain(c: &mut Criterion) {
    struct Level0;
    struct Level1 {
        _inner: Arc<Level0>,
    }
    struct Level2 {
        _inner: Arc<Level1>,
    }
    struct Level3 {
        _inner: Arc<Level2>,
    }

    let root = LifetimeScope::root(|r| {
        r.register(
            Registration::for_type::<Level0>()
                .activate_with(|_| Ok(Level0))
                .build(),
        );
        r.register(
            Registration::for_type::<Level1>()
                .activate_with(|ctx| Ok(Level1 { _inner: ctx.resolve::<Level0>()? }))
                .build(),
        );
        r.register(
            Registration::for_type::<Level2>()
                .activate_with(|ctx| Ok(Level2 { _inner: ctx.resolve::<Level1>()? }))
                .build(),
        );
        r.register(
            Registration::for_type::<Level3>()
                .activate_with(|ctx| Ok(Level3 { _inner: ctx.resolve::<Level2>()? }))
                .build(),
        );
    });

    c.bench_function("transient_chain_depth_4", |b| {
        b.iter(|| {
            let v = root.resolve_typed::<Level3>().unwrap();
            black_box(v);
        })
    });
}

fn bench_scope_creation(c: &mut Criterion) {
    let root = LifetimeScope::root(|_| {});

    c.bench_function("begin_child", |b| {
        b.iter(|| {
            let child = root.begin_child().unwrap();
            black_box(child);
        })
    });
}

criterion_group!(
    benches,
    bench_singleton_hit,
    bench_transient_vs_per_scope,
    bench_dependency_chain,
    bench_scope_creation
);
criterion_main!(benches);
