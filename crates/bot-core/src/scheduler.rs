//! Per-job timing loops.
//!
//! Every job gets its own tokio task that visits each configured target in
//! order, sleeps for the job's interval and starts over. The tasks are never
//! joined; they end only when a banned target is reached or the shutdown
//! signal flips.

use core::{any::Any, fmt, panic::AssertUnwindSafe, time::Duration};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures_util::FutureExt as _;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{Instrument as _, error, info, info_span, warn};

use crate::ids::BanList;

#[async_trait]
pub trait JobAction: Send + Sync {
    async fn run(&self, target: i64) -> Result<()>;
}

#[derive(Clone)]
pub struct TimingJob {
    pub name: String,
    pub interval: Duration,
    /// Read on every target visit; banning any target stops the whole job.
    pub ban_targets: BanList,
    pub action: Arc<dyn JobAction>,
}

impl fmt::Debug for TimingJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimingJob")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl TimingJob {
    pub fn new(name: impl Into<String>, interval: Duration, action: Arc<dyn JobAction>) -> Self {
        Self {
            name: name.into(),
            interval,
            ban_targets: BanList::new(),
            action,
        }
    }

    #[must_use]
    pub fn with_bans(mut self, bans: BanList) -> Self {
        self.ban_targets = bans;
        self
    }
}

/// Why a job loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobExit {
    Banned { target: i64, run_count: u64 },
    Shutdown { run_count: u64 },
}

/// Lifecycle callbacks for job loops. Defaults only log.
pub trait JobObserver: Send + Sync {
    fn cycle_start(&self, _job: &str, _run_count: u64) {}

    fn target_done(&self, _job: &str, _run_count: u64, _target: i64) {}

    fn target_failed(&self, job: &str, run_count: u64, target: i64, err: &anyhow::Error) {
        error!(job = %job, target, run_count, error = ?err, "Timing job failed for target");
    }

    fn cycle_end(&self, job: &str, run_count: u64) {
        info!(job = %job, run_count, "Timing job cycle finished");
    }

    fn halted(&self, job: &str, run_count: u64, target: i64) {
        warn!(job = %job, target, run_count, "Timing job reached a banned target and stopped for good");
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl JobObserver for LogObserver {}

pub struct TimingScheduler {
    jobs: Vec<TimingJob>,
    targets: Arc<[i64]>,
    observer: Arc<dyn JobObserver>,
    shutdown: watch::Receiver<bool>,
}

impl fmt::Debug for TimingScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimingScheduler")
            .field("jobs", &self.jobs)
            .field("targets", &self.targets)
            .finish_non_exhaustive()
    }
}

impl TimingScheduler {
    #[must_use]
    pub fn new(jobs: Vec<TimingJob>, targets: Vec<i64>, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            jobs,
            targets: targets.into(),
            observer: Arc::new(LogObserver),
            shutdown,
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn JobObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Spawns one task per job and returns immediately.
    ///
    /// The handles may be dropped; the tasks keep running detached and do not
    /// hold the process open once the runtime shuts down.
    pub fn start(self) -> Vec<JoinHandle<JobExit>> {
        if self.targets.is_empty() && !self.jobs.is_empty() {
            warn!(jobs = self.jobs.len(), "No timing targets configured; timing jobs not started");
            return Vec::new();
        }
        let handles: Vec<_> = self
            .jobs
            .into_iter()
            .map(|job| {
                let span = info_span!("timing_job", job = %job.name);
                tokio::spawn(
                    run_job(
                        job,
                        Arc::clone(&self.targets),
                        Arc::clone(&self.observer),
                        self.shutdown.clone(),
                    )
                    .instrument(span),
                )
            })
            .collect();
        info!(jobs = handles.len(), targets = self.targets.len(), "Timing jobs started");
        handles
    }
}

async fn run_job(
    job: TimingJob,
    targets: Arc<[i64]>,
    observer: Arc<dyn JobObserver>,
    mut shutdown: watch::Receiver<bool>,
) -> JobExit {
    let mut run_count: u64 = 0;
    loop {
        observer.cycle_start(&job.name, run_count);
        for &target in targets.iter() {
            if *shutdown.borrow() {
                return JobExit::Shutdown { run_count };
            }
            if job.ban_targets.contains(target).await {
                observer.halted(&job.name, run_count, target);
                return JobExit::Banned { target, run_count };
            }
            run_count += 1;
            match AssertUnwindSafe(job.action.run(target)).catch_unwind().await {
                Ok(Ok(())) => observer.target_done(&job.name, run_count, target),
                Ok(Err(err)) => observer.target_failed(&job.name, run_count, target, &err),
                Err(panic) => {
                    let err = anyhow!("job action panicked: {}", panic_message(panic.as_ref()));
                    observer.target_failed(&job.name, run_count, target, &err);
                }
            }
        }
        observer.cycle_end(&job.name, run_count);

        if job.interval.is_zero() {
            tokio::task::yield_now().await;
        }
        tokio::select! {
            () = tokio::time::sleep(job.interval) => {}
            () = stop_requested(&mut shutdown) => return JobExit::Shutdown { run_count },
        }
    }
}

/// Resolves once shutdown is signalled. Never resolves if the sender is gone.
pub async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        core::future::pending::<()>().await;
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "<non-string panic>".to_owned())
}
