//! Independent fixed-interval triggers, one per job.
//!
//! Each job gets its own ticker task. A tick that arrives while the same job
//! is still running is skipped; different jobs never wait on each other.
//! A job failure, panic included, is logged and the next tick proceeds.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use threatmap_common::ThreatMapError;

use crate::pipeline::CycleStats;

#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> Result<CycleStats, ThreatMapError>;
}

struct ScheduleEntry {
    job: Arc<dyn ScheduledJob>,
    interval: Duration,
    start_delay: Duration,
}

#[derive(Default)]
pub struct IngestionScheduler {
    entries: Vec<ScheduleEntry>,
}

impl IngestionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` at `start_delay` after start, then every `interval`.
    pub fn add(mut self, job: Arc<dyn ScheduledJob>, interval: Duration, start_delay: Duration) -> Self {
        self.entries.push(ScheduleEntry {
            job,
            interval,
            start_delay,
        });
        self
    }

    pub fn job_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.job.name().to_string()).collect()
    }

    pub fn start(self) -> SchedulerHandle {
        let now = Instant::now();
        let mut tasks = Vec::with_capacity(self.entries.len());
        let mut skipped = Vec::with_capacity(self.entries.len());

        for entry in self.entries {
            let skips = Arc::new(AtomicU64::new(0));
            skipped.push((entry.job.name().to_string(), skips.clone()));
            info!(
                job = entry.job.name(),
                interval_secs = entry.interval.as_secs(),
                start_delay_secs = entry.start_delay.as_secs(),
                "Scheduling job"
            );
            tasks.push(tokio::spawn(drive(entry, now, skips)));
        }

        SchedulerHandle { tasks, skipped }
    }
}

async fn drive(entry: ScheduleEntry, start: Instant, skips: Arc<AtomicU64>) {
    let running = Arc::new(AtomicBool::new(false));
    // interval_at panics on a zero period.
    let period = entry.interval.max(Duration::from_millis(1));
    let mut ticker = interval_at(start + entry.start_delay, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let name = entry.job.name().to_string();

        if running.swap(true, Ordering::AcqRel) {
            skips.fetch_add(1, Ordering::Relaxed);
            info!(job = name.as_str(), "Previous run still in progress, skipping tick");
            continue;
        }

        let job = entry.job.clone();
        let running = running.clone();
        tokio::spawn(async move {
            // Inner task so a panic surfaces as a JoinError instead of
            // leaving the running flag set.
            let outcome = tokio::spawn(async move { job.run().await }).await;
            match outcome {
                Ok(Ok(stats)) => info!(job = name.as_str(), %stats, "Ingestion cycle complete"),
                Ok(Err(e)) => error!(job = name.as_str(), error = %e, "Ingestion cycle failed"),
                Err(e) if e.is_panic() => error!(job = name.as_str(), "Ingestion cycle panicked"),
                Err(e) => warn!(job = name.as_str(), error = %e, "Ingestion cycle cancelled"),
            }
            running.store(false, Ordering::Release);
        });
    }
}

/// Owns the ticker tasks. Dropping the handle leaves them running.
pub struct SchedulerHandle {
    tasks: Vec<JoinHandle<()>>,
    skipped: Vec<(String, Arc<AtomicU64>)>,
}

impl SchedulerHandle {
    /// Ticks skipped so far because the job was still running.
    pub fn skipped(&self, job: &str) -> u64 {
        self.skipped
            .iter()
            .find(|(name, _)| name == job)
            .map_or(0, |(_, count)| count.load(Ordering::Relaxed))
    }

    /// Stop triggering. Runs already in flight finish on their own.
    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
        info!("Scheduler stopped");
    }
}
