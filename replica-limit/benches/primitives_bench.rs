use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;

use replica_limit::RateLimitConfig;
use replica_limit::RateController;
use replica_limit::ScoreTracker;
use replica_limit::SendLimiter;

fn bench_send_limiter(c: &mut Criterion) {
    let limiter = Arc::new(SendLimiter::new(1_000.0, 200.0, Duration::from_millis(20)));
    c.bench_function("send_limiter_try_acquire", |b| {
        b.iter(|| {
            let _ = black_box(limiter.as_ref()).try_acquire();
        })
    });
}

fn bench_rate_controller_on_reply(c: &mut Criterion) {
    let config = RateLimitConfig::default();
    let controller = Arc::new(RateController::new(&config, 1.0));
    c.bench_function("rate_controller_on_reply", |b| {
        b.iter(|| {
            black_box(controller.as_ref()).on_reply();
        })
    });
}

fn bench_score_tracker(c: &mut Criterion) {
    let tracker = Arc::new(ScoreTracker::new(0.9));
    c.bench_function("score_tracker_update_and_score", |b| {
        b.iter(|| {
            let tracker = black_box(tracker.as_ref());
            tracker.update(3, 1.2, 4.5);
            let _ = tracker.score(8, 2);
        })
    });
}

criterion_group!(
    benches,
    bench_send_limiter,
    bench_rate_controller_on_reply,
    bench_score_tracker
);
criterion_main!(benches);
