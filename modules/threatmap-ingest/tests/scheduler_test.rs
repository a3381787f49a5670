//! Scheduler timing under paused tokio time.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use threatmap_common::ThreatMapError;
use threatmap_ingest::{CycleStats, IngestionScheduler, ScheduledJob};

/// Records the offset (in seconds from `origin`) of every run.
struct TimedJob {
    name: &'static str,
    origin: Instant,
    busy_for: Duration,
    fail_first: bool,
    runs: Mutex<Vec<u64>>,
}

impl TimedJob {
    fn new(name: &'static str, origin: Instant) -> Self {
        Self {
            name,
            origin,
            busy_for: Duration::ZERO,
            fail_first: false,
            runs: Mutex::new(Vec::new()),
        }
    }

    fn busy_for(mut self, d: Duration) -> Self {
        self.busy_for = d;
        self
    }

    fn panicking_first(mut self) -> Self {
        self.fail_first = true;
        self
    }

    fn runs(&self) -> Vec<u64> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScheduledJob for TimedJob {
    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self) -> Result<CycleStats, ThreatMapError> {
        let first = {
            let mut runs = self.runs.lock().unwrap();
            runs.push(self.origin.elapsed().as_secs());
            runs.len() == 1
        };
        if first && self.fail_first {
            panic!("boom");
        }
        if !self.busy_for.is_zero() {
            tokio::time::sleep(self.busy_for).await;
        }
        Ok(CycleStats::default())
    }
}

/// Advance paused time to `secs` after `origin` and let due tasks run.
async fn run_until(origin: Instant, secs: u64) {
    tokio::time::sleep_until(origin + Duration::from_secs(secs)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn feeds_fire_on_their_own_staggered_schedules() {
    let origin = Instant::now();
    let global = Arc::new(TimedJob::new("global", origin));
    let local = Arc::new(TimedJob::new("local", origin));

    let handle = IngestionScheduler::new()
        .add(global.clone(), Duration::from_secs(900), Duration::ZERO)
        .add(local.clone(), Duration::from_secs(540), Duration::from_secs(60))
        .start();

    run_until(origin, 1900).await;
    handle.shutdown();

    assert_eq!(global.runs(), vec![0, 900, 1800]);
    assert_eq!(local.runs(), vec![60, 600, 1140, 1680]);
}

#[tokio::test(start_paused = true)]
async fn overlapping_tick_is_skipped() {
    let origin = Instant::now();
    let slow = Arc::new(TimedJob::new("slow", origin).busy_for(Duration::from_secs(25)));

    let handle = IngestionScheduler::new()
        .add(slow.clone(), Duration::from_secs(10), Duration::ZERO)
        .start();

    run_until(origin, 65).await;

    // Runs at 0 and 30 and 60; ticks at 10, 20, 40, 50 land while busy.
    assert_eq!(slow.runs(), vec![0, 30, 60]);
    assert_eq!(handle.skipped("slow"), 4);
    handle.shutdown();
}

#[tokio::test(start_paused = true)]
async fn slow_feed_does_not_delay_another() {
    let origin = Instant::now();
    let slow = Arc::new(TimedJob::new("slow", origin).busy_for(Duration::from_secs(500)));
    let fast = Arc::new(TimedJob::new("fast", origin));

    let handle = IngestionScheduler::new()
        .add(slow.clone(), Duration::from_secs(900), Duration::ZERO)
        .add(fast.clone(), Duration::from_secs(100), Duration::from_secs(50))
        .start();

    run_until(origin, 360).await;
    handle.shutdown();

    assert_eq!(slow.runs(), vec![0]);
    assert_eq!(fast.runs(), vec![50, 150, 250, 350]);
}

#[tokio::test(start_paused = true)]
async fn panicking_run_does_not_stop_the_schedule() {
    let origin = Instant::now();
    let job = Arc::new(TimedJob::new("flaky", origin).panicking_first());

    let handle = IngestionScheduler::new()
        .add(job.clone(), Duration::from_secs(60), Duration::ZERO)
        .start();

    run_until(origin, 130).await;
    handle.shutdown();

    assert_eq!(job.runs(), vec![0, 60, 120]);
}
