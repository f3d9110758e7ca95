//! Performance benchmarks for the reactive state bridge.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rx_state_bridge::{
    http, AjaxBridge, BehaviorSubject, DebouncedAjaxBridge, ManualScheduler, Observable, SeedMode,
    StateBridge, StateBridgeConfig, Stream, Subject, SubscriptionBridge, DEBOUNCE,
};
use std::cell::Cell;
use std::rc::Rc;

/// Benchmark multicast delivery with varying subscriber counts
fn bench_subject_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("subject_fan_out");

    for subscribers in [1, 10, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::new("subscribers", subscribers),
            &subscribers,
            |b, &count| {
                let subject = Subject::new();
                let total = Rc::new(Cell::new(0u64));
                let _subs: Vec<_> = (0..count)
                    .map(|_| {
                        let t = Rc::clone(&total);
                        subject.subscribe_next(move |v: u64| t.set(t.get() + v)).unwrap()
                    })
                    .collect();

                b.iter(|| subject.next(black_box(1)));
            },
        );
    }

    group.finish();
}

/// Benchmark attaching a state bridge to a fresh stream in each seed mode
fn bench_state_attach(c: &mut Criterion) {
    let mut group = c.benchmark_group("state_attach");

    for mode in [SeedMode::SharedSubscription, SeedMode::ProbeThenSubscribe] {
        group.bench_with_input(BenchmarkId::new("mode", format!("{mode:?}")), &mode, |b, &mode| {
            b.iter(|| {
                let subject = BehaviorSubject::new(black_box(42u32));
                let mut bridge = StateBridge::with_config(StateBridgeConfig { seed_mode: mode });
                black_box(bridge.attach(&subject).unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark re-renders against an already bound stream
fn bench_rebind_same_stream(c: &mut Criterion) {
    let subject = Subject::<u32>::new();
    let mut bridge = SubscriptionBridge::new();
    let hits = Rc::new(Cell::new(0u32));

    c.bench_function("rebind_same_stream", |b| {
        b.iter(|| {
            let h = Rc::clone(&hits);
            bridge.bind(&subject, move |v| h.set(h.get() + v)).unwrap();
        });
    });
}

/// Benchmark a full request round trip through the status pipeline
fn bench_request_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_pipeline");

    group.bench_function("raw_pipeline", |b| {
        let requests = Subject::new();
        let envelopes = http(|n: u32| Observable::of(vec![n * 2])).apply(&requests);
        let settled = Rc::new(Cell::new(0u32));
        let s = Rc::clone(&settled);
        let _sub = envelopes
            .subscribe_next(move |e| {
                if e.is_settled() {
                    s.set(s.get() + 1);
                }
            })
            .unwrap();

        b.iter(|| requests.next(black_box(7)));
    });

    group.bench_function("ajax_bridge", |b| {
        let mut bridge = AjaxBridge::new(|n: u32| Observable::of(vec![n * 2]));
        let (_, dispatch) = bridge.attach().unwrap();
        b.iter(|| dispatch.push(black_box(7)));
    });

    group.bench_function("debounced_burst", |b| {
        let clock = ManualScheduler::new();
        let mut bridge = DebouncedAjaxBridge::new(|n: u32| Observable::of(vec![n]), clock.shared());
        let (_, dispatch) = bridge.attach().unwrap();
        b.iter(|| {
            for n in 0..10 {
                dispatch.push(black_box(n));
            }
            clock.advance_by(DEBOUNCE);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_subject_fan_out,
    bench_state_attach,
    bench_rebind_same_stream,
    bench_request_pipeline,
);
criterion_main!(benches);
