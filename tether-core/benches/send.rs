//! Send-loop throughput.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tether_core::prelude::*;

#[derive(Debug, Clone, Default, PartialEq)]
struct App {
    counter: Counter,
    log: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Counter {
    count: u64,
}

#[derive(Debug, Clone)]
enum AppAction {
    Counter(CounterAction),
    Log(u32),
}

#[derive(Debug, Clone)]
enum CounterAction {
    Increment,
}

fn counter(state: &mut Counter, action: CounterAction) -> Effect<CounterAction> {
    match action {
        CounterAction::Increment => state.count += 1,
    }
    Effect::none()
}

fn log(state: &mut App, action: AppAction) -> Effect<AppAction> {
    if let AppAction::Log(entry) = action {
        state.log.push(entry);
        state.log.truncate(64);
    }
    Effect::none()
}

fn bench_root_send(c: &mut Criterion) {
    let store = Store::new(Counter::default(), counter);
    c.bench_function("root_send", |b| {
        b.iter(|| {
            let _ = store.send(black_box(CounterAction::Increment));
        })
    });
}

fn bench_scoped_send(c: &mut Criterion) {
    let reducer = combine![counter.pullback(lens!(App => counter), case!(AppAction::Counter)), log];
    let store = Store::new(App::default(), reducer);
    let child = store.scope(lens!(App => counter), case!(AppAction::Counter));
    let _observer = store.observe(|state| {
        black_box(state.counter.count);
    });

    c.bench_function("scoped_send_observed", |b| {
        b.iter(|| {
            let _ = child.send(black_box(CounterAction::Increment));
        })
    });
}

fn bench_shared_write(c: &mut Criterion) {
    let app = Shared::new(App::default());
    let count = app.project(lens!(App => counter.count));
    let _subscription = count.subscribe(|count| {
        black_box(*count);
    });

    c.bench_function("shared_projected_update", |b| {
        b.iter(|| count.update(|count| *count += 1))
    });
}

criterion_group!(benches, bench_root_send, bench_scoped_send, bench_shared_write);
criterion_main!(benches);
