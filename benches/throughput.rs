use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fusebox_rs::{
    transition, BucketConfig, BucketProcess, CircuitBreaker, Event, LeakyBucket, State,
};

fn bench_bucket_failure_count(c: &mut Criterion) {
    let mut bucket = LeakyBucket::new();
    // Threshold high enough that the count never crosses it
    bucket.subscribe("bench", Some(u64::MAX)).unwrap();

    c.bench_function("bucket_increment_and_check", |b| {
        b.iter(|| {
            bucket.increment("bench").unwrap();
            black_box(bucket.is_above_threshold("bench").unwrap())
        });
    });
}

fn bench_bucket_tick(c: &mut Criterion) {
    let mut bucket = LeakyBucket::new();
    for i in 0..100 {
        let id = format!("subscription-{i}");
        bucket.subscribe(&id, Some(10)).unwrap();
        for _ in 0..5 {
            bucket.increment(&id).unwrap();
        }
    }

    c.bench_function("bucket_tick_100_subscriptions", |b| {
        b.iter(|| black_box(bucket.tick()));
    });
}

fn bench_transition_table(c: &mut Criterion) {
    let states = [State::Closed, State::Open, State::HalfOpen];
    let events = [
        Event::CallSucceeded,
        Event::CallFailed,
        Event::ThresholdViolated,
        Event::ThresholdRestored,
    ];

    c.bench_function("transition_table", |b| {
        b.iter(|| {
            for state in states {
                for event in events {
                    black_box(transition(state, event));
                }
            }
        });
    });
}

fn bench_breaker_success_path(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let _guard = rt.enter();

    let bucket = BucketProcess::spawn(BucketConfig::default());
    let breaker = CircuitBreaker::builder("bench")
        .threshold(u64::MAX)
        .build(&bucket)
        .unwrap();

    c.bench_function("breaker_closed_success", |b| {
        b.iter(|| black_box(breaker.handle_success()));
    });
}

criterion_group!(
    benches,
    bench_bucket_failure_count,
    bench_bucket_tick,
    bench_transition_table,
    bench_breaker_success_path
);
criterion_main!(benches);
