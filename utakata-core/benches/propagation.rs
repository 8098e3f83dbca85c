//! Propagation benchmarks: how long a write takes to reach its readers.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use utakata_core::{
    computed, effect, reactive, watch, EffectOptions, Runner, Runtime, Signal, Value,
    WatcherFlush, WatcherOptions,
};

// =============================================================================
// Effects
// =============================================================================

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");

    for readers in [1usize, 16, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(readers), &readers, |b, &readers| {
            let runtime = Runtime::new();
            let source = Signal::new(&runtime, 0u64);
            let _runners: Vec<Runner<u64>> = (0..readers)
                .map(|_| {
                    let source = source.clone();
                    effect(&runtime, move || source.get(), EffectOptions::default())
                })
                .collect();

            let mut next = 0u64;
            b.iter(|| {
                next += 1;
                source.set(black_box(next));
            });
        });
    }

    group.finish();
}

fn bench_observed_write(c: &mut Criterion) {
    let runtime = Runtime::new();
    let state = reactive(&runtime, Value::object([("count", 0)])).expect("object");
    let _runner = effect(
        &runtime,
        {
            let state = state.clone();
            move || state.get("count")
        },
        EffectOptions::default(),
    );

    let mut next = 0.0;
    c.bench_function("observed_write", |b| {
        b.iter(|| {
            next += 1.0;
            state.set("count", black_box(next));
        });
    });
}

// =============================================================================
// Computed chains
// =============================================================================

fn bench_computed_chain(c: &mut Criterion) {
    let runtime = Runtime::new();
    let source = Signal::new(&runtime, 0i64);

    let mut tail = {
        let source = source.clone();
        computed(&runtime, move || source.get())
    };
    for _ in 0..32 {
        let previous = tail.clone();
        tail = computed(&runtime, move || previous.get() + 1);
    }

    let mut next = 0;
    c.bench_function("computed_chain_32", |b| {
        b.iter(|| {
            next += 1;
            source.set(next);
            black_box(tail.get())
        });
    });
}

// =============================================================================
// Deep watchers
// =============================================================================

fn bench_deep_watch(c: &mut Criterion) {
    let runtime = Runtime::new();
    let rows: Vec<Value> = (0..64)
        .map(|i| Value::object([("id", Value::from(i)), ("done", Value::from(false))]))
        .collect();
    let table = reactive(&runtime, Value::array(rows)).expect("array");
    let last = table.child(63usize).expect("row");

    let _handle = watch(
        &runtime,
        {
            let table = table.clone();
            move || table.clone()
        },
        |_, _| {},
        WatcherOptions::new().flush(WatcherFlush::Sync).deep(true),
    );

    let mut done = false;
    c.bench_function("deep_watch_64_rows", |b| {
        b.iter(|| {
            done = !done;
            last.set("done", done);
        });
    });
}

criterion_group!(
    benches,
    bench_fan_out,
    bench_observed_write,
    bench_computed_chain,
    bench_deep_watch
);
criterion_main!(benches);
