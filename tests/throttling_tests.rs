use rategate::{
    ManualClock, RequestThrottler, Throttle, ThrottleError, UploadThrottler, WindowDefinitionSet,
    WindowKind,
};
use std::sync::Arc;
use std::thread;

/// Route engine logs through the test harness so rejection warnings show up
/// in failing test output. Safe to call from every test; only the first
/// registration wins.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rategate=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

fn burst_windows(capacity: f64) -> WindowDefinitionSet {
    let mut set = WindowDefinitionSet::new("test", "requests");
    set.add_definition(WindowKind::Burst, capacity).unwrap();
    set
}

#[test]
fn test_recovery_never_exceeds_capacity_and_tracks_elapsed_time() {
    init_tracing();
    let clock = Arc::new(ManualClock::new(0));
    let throttler =
        RequestThrottler::request("t", burst_windows(10.0), 0).with_clock(clock.clone());

    throttler.proceed("user").unwrap();
    let mut previous = throttler
        .get_stats("user", WindowKind::Burst)
        .unwrap()
        .remaining();

    // 1.8 s between calls recovers 1.2 units against a cost of 1, so the
    // allowance climbs by 0.2 per call until it clamps at capacity.
    let rate = 10.0 / 15.0;
    for i in 0..30 {
        clock.advance_millis(1_800);
        throttler.proceed("user").unwrap();
        let remaining = throttler
            .get_stats("user", WindowKind::Burst)
            .unwrap()
            .remaining();

        let expected = (previous + 1.8 * rate).min(10.0) - 1.0;
        assert!(
            (remaining - expected).abs() < 1e-9,
            "call {}: remaining {} != expected {}",
            i,
            remaining,
            expected
        );
        assert!(remaining <= 10.0);
        previous = remaining;
    }
}

#[test]
fn test_rejected_call_decrements_no_window() {
    init_tracing();
    let clock = Arc::new(ManualClock::new(0));
    let mut windows = WindowDefinitionSet::new("test", "requests");
    windows.add_definition(WindowKind::Burst, 5.0).unwrap();
    windows.add_definition(WindowKind::Hour, 1000.0).unwrap();
    windows.add_definition(WindowKind::Day, 10000.0).unwrap();
    let throttler = RequestThrottler::request("t", windows, 0).with_clock(clock);

    for _ in 0..5 {
        throttler.proceed("user").unwrap();
    }
    let hour_before = throttler.get_stats("user", WindowKind::Hour).unwrap();
    let day_before = throttler.get_stats("user", WindowKind::Day).unwrap();

    // Burst is exhausted; the whole call must fail without touching the
    // other windows (no time passes, so no recovery either).
    let err = throttler.proceed("user").unwrap_err();
    assert!(matches!(err, ThrottleError::RateExceeded { .. }));

    let hour_after = throttler.get_stats("user", WindowKind::Hour).unwrap();
    let day_after = throttler.get_stats("user", WindowKind::Day).unwrap();
    assert_eq!(hour_before.remaining(), hour_after.remaining());
    assert_eq!(day_before.remaining(), day_after.remaining());
}

#[test]
fn test_concurrent_distinct_identifiers_match_sequential_runs() {
    init_tracing();
    let clock = Arc::new(ManualClock::new(0));
    let throttler = Arc::new(
        RequestThrottler::request("t", burst_windows(1000.0), 0).with_clock(clock),
    );

    let calls_per_identifier = 50;
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let throttler = Arc::clone(&throttler);
            thread::spawn(move || {
                let identifier = format!("user-{}", i);
                for _ in 0..calls_per_identifier {
                    throttler.proceed(&identifier).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for i in 0..8 {
        let identifier = format!("user-{}", i);
        let remaining = throttler
            .get_stats(&identifier, WindowKind::Burst)
            .unwrap()
            .remaining();
        assert_eq!(remaining, 1000.0 - calls_per_identifier as f64);
    }
}

#[test]
fn test_concurrent_same_identifier_loses_no_updates() {
    init_tracing();
    let clock = Arc::new(ManualClock::new(0));
    let throttler = Arc::new(
        RequestThrottler::request("t", burst_windows(10_000.0), 0).with_clock(clock),
    );

    let threads = 8;
    let calls_per_thread = 100;
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let throttler = Arc::clone(&throttler);
            thread::spawn(move || {
                for _ in 0..calls_per_thread {
                    throttler.proceed("shared").unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // The clock never advances, so no recovery: the final allowance must be
    // exactly initial minus every admitted call, any interleaving.
    let remaining = throttler
        .get_stats("shared", WindowKind::Burst)
        .unwrap()
        .remaining();
    assert_eq!(remaining, 10_000.0 - (threads * calls_per_thread) as f64);
}

#[test]
fn test_oversized_single_item_lifecycle() {
    init_tracing();
    let clock = Arc::new(ManualClock::new(0));
    let mut windows = WindowDefinitionSet::new("uploads", "MB");
    windows.add_definition(WindowKind::Burst, 10.0).unwrap();
    let throttler = UploadThrottler::upload("u", windows).with_clock(clock.clone());

    // A 37 MB item through a 10 MB/15s window: admitted once from full.
    throttler.proceed_with_cost("lab", 37.0).unwrap();

    // Immediately afterwards nothing fits.
    assert!(throttler.proceed_with_cost("lab", 0.1).is_err());

    // Partial recovery is not enough for another oversized item.
    clock.advance_millis(7_500);
    assert!(throttler.proceed_with_cost("lab", 37.0).is_err());

    // After a full period the bucket is back at capacity: a capacity-sized
    // item fits, and so would another oversized one.
    clock.advance_millis(7_500);
    throttler.proceed_with_cost("lab", 10.0).unwrap();
}

#[test]
fn test_minimum_interval_gate() {
    init_tracing();
    let clock = Arc::new(ManualClock::new(0));
    let throttler =
        RequestThrottler::request("t", burst_windows(1000.0), 250).with_clock(clock.clone());

    // First call for a new identifier always passes the gate.
    throttler.proceed("user").unwrap();

    // Ample allowance, but too soon.
    clock.advance_millis(100);
    let err = throttler.proceed("user").unwrap_err();
    assert_eq!(
        err,
        ThrottleError::TooFrequent {
            min_interval_millis: 250,
            observed_millis: 100,
        }
    );

    clock.advance_millis(150);
    throttler.proceed("user").unwrap();
}

#[test]
fn test_paced_calls_stay_admitted_while_bursts_exhaust() {
    init_tracing();
    // Window of 10 requests per 15 s. 20 calls spaced 2 s apart average
    // 0.5 req/s, under the 0.667 req/s recovery rate: all succeed.
    let clock = Arc::new(ManualClock::new(0));
    let throttler =
        RequestThrottler::request("t", burst_windows(10.0), 0).with_clock(clock.clone());

    for i in 0..20 {
        if i > 0 {
            clock.advance_millis(2_000);
        }
        assert!(throttler.proceed("paced").is_ok(), "paced call {} rejected", i);
    }

    // The same 20 calls back to back exhaust the window on the 11th call.
    let clock = Arc::new(ManualClock::new(0));
    let throttler =
        RequestThrottler::request("t", burst_windows(10.0), 0).with_clock(clock.clone());

    let mut first_failure = None;
    let mut wait_millis = 0;
    for i in 0..20 {
        match throttler.proceed("burst") {
            Ok(()) => {}
            Err(err) => {
                first_failure = Some(i);
                wait_millis = err.wait_millis().unwrap();
                break;
            }
        }
    }
    assert_eq!(first_failure, Some(10));

    // Waiting exactly the reported time makes the next call succeed.
    clock.advance_millis(wait_millis);
    throttler.proceed("burst").unwrap();
}

#[test]
fn test_get_stats_is_pure() {
    init_tracing();
    let clock = Arc::new(ManualClock::new(0));
    let throttler =
        RequestThrottler::request("t", burst_windows(10.0), 0).with_clock(clock.clone());

    throttler.proceed("user").unwrap();
    clock.advance_millis(5_000);

    let first = throttler.get_stats("user", WindowKind::Burst).unwrap();
    let second = throttler.get_stats("user", WindowKind::Burst).unwrap();
    assert_eq!(first, second);

    // Stats report stored allowance: the elapsed 5 s only materialize as
    // recovery on the next admission attempt.
    assert_eq!(first.remaining(), 9.0);
    throttler.proceed("user").unwrap();
    let after = throttler.get_stats("user", WindowKind::Burst).unwrap();
    assert!(after.remaining() > first.remaining() - 1.0);
}
