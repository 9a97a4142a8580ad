//! Benchmarks for predux
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use predux::{compose_memo, ActionCreator, Context, Selector, Signal, Store};
use std::rc::Rc;

fn counter(ctx: &Rc<Context>) -> (Store, ActionCreator<i64, i64>, Selector<i64>) {
    let mut counter = ctx.create_slice(0i64);
    let add = counter.create_action(|n: &Rc<i64>, step: &i64| Rc::new(**n + step));
    let value = counter.create_selector(|n: &i64| *n);
    let store = Store::builder(ctx).slice(&counter.build()).build().unwrap();
    (store, add, value)
}

// =============================================================================
// DISPATCH BENCHMARKS
// =============================================================================

fn bench_dispatch(c: &mut Criterion) {
    let ctx = Context::new();
    let (store, add, _) = counter(&ctx);

    c.bench_function("dispatch", |b| {
        b.iter(|| {
            store.dispatch(add.create(black_box(1))).unwrap();
            ctx.tick();
        })
    });
}

fn bench_dispatch_unchanged(c: &mut Criterion) {
    let ctx = Context::new();
    let mut counter = ctx.create_slice(0i64);
    let keep = counter.create_action(|n: &Rc<i64>, _: &()| n.clone());
    let store = Store::builder(&ctx).slice(&counter.build()).build().unwrap();

    c.bench_function("dispatch_unchanged", |b| {
        b.iter(|| store.dispatch(keep.create(())).unwrap())
    });
}

fn bench_dispatch_many_slices(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_many_slices");

    for slices in [1usize, 10, 100] {
        let ctx = Context::new();
        let mut builder = Store::builder(&ctx);
        let mut first = None;

        let built: Vec<_> = (0..slices)
            .map(|_| {
                let mut slice = ctx.create_slice(0i64);
                let add = slice.create_action(|n: &Rc<i64>, step: &i64| Rc::new(**n + step));
                first.get_or_insert(add);
                slice.build()
            })
            .collect();
        for slice in &built {
            builder = builder.slice(slice);
        }
        let store = builder.build().unwrap();
        let add = first.unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(slices), &slices, |b, _| {
            b.iter(|| {
                store.dispatch(add.create(black_box(1))).unwrap();
                ctx.tick();
            })
        });
    }

    group.finish();
}

// =============================================================================
// SELECTOR BENCHMARKS
// =============================================================================

fn bench_select_memo_hit(c: &mut Criterion) {
    let ctx = Context::new();
    let (store, _, value) = counter(&ctx);
    let doubled = compose_memo((value,), |n: i64| n * 2);

    c.bench_function("select_memo_hit", |b| b.iter(|| black_box(store.select(&doubled))));
}

fn bench_select_memo_miss(c: &mut Criterion) {
    let ctx = Context::new();
    let (store, add, value) = counter(&ctx);
    let doubled = compose_memo((value,), |n: i64| n * 2);

    c.bench_function("select_memo_miss", |b| {
        b.iter(|| {
            store.dispatch(add.create(1)).unwrap();
            black_box(store.select(&doubled))
        })
    });
}

// =============================================================================
// BATCH AND TRANSACTION BENCHMARKS
// =============================================================================

fn bench_batch_updates(c: &mut Criterion) {
    let ctx = Context::new();
    let (store, add, _) = counter(&ctx);
    store.state_changed().subscribe(|_| {});

    c.bench_function("batch_10_dispatches", |b| {
        b.iter(|| {
            ctx.batch(|| {
                for i in 0..10 {
                    store.dispatch(add.create(black_box(i))).unwrap();
                }
            })
        })
    });
}

fn bench_transaction_rollback(c: &mut Criterion) {
    let ctx = Context::new();
    let (store, add, _) = counter(&ctx);

    c.bench_function("transaction_rollback", |b| {
        b.iter(|| {
            ctx.transaction(|| {
                store.dispatch(add.create(black_box(1))).unwrap();
                false
            })
        })
    });
}

// =============================================================================
// SIGNAL BENCHMARKS
// =============================================================================

fn bench_signal_invoke(c: &mut Criterion) {
    let mut group = c.benchmark_group("signal_invoke");

    for listeners in [1usize, 10, 100] {
        let signal: Signal<u64> = Signal::new();
        for _ in 0..listeners {
            signal.subscribe(|event| {
                black_box(*event);
            });
        }

        group.bench_with_input(BenchmarkId::from_parameter(listeners), &listeners, |b, _| {
            b.iter(|| signal.invoke(&black_box(7)))
        });
    }

    group.finish();
}

criterion_group!(
    dispatch_benches,
    bench_dispatch,
    bench_dispatch_unchanged,
    bench_dispatch_many_slices,
);

criterion_group!(selector_benches, bench_select_memo_hit, bench_select_memo_miss);

criterion_group!(batch_benches, bench_batch_updates, bench_transaction_rollback);

criterion_group!(signal_benches, bench_signal_invoke);

criterion_main!(dispatch_benches, selector_benches, batch_benches, signal_benches);
