//! Inventory scanner — one sweep over the current instance snapshot.
//!
//! `run_sweep` lists the inventory once, judges every instance in its own
//! task, and returns only after all judgments finished. The task set lives
//! on the stack of a single call, so concurrent sweeps never share
//! in-flight bookkeeping.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use fleet_inventory::Inventory;

use crate::config::ReaperConfig;
use crate::context::SweepContext;
use crate::error::{ReaperError, ReaperResult};
use crate::judge::{LivenessJudge, Verdict};
use crate::probe::Probe;

/// Default cap on judgments running at once within a sweep.
pub const DEFAULT_MAX_CONCURRENCY: usize = 64;

/// Tally of one completed sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Instances in the inventory snapshot.
    pub listed: usize,
    pub alive: usize,
    pub converging: usize,
    pub retiring: usize,
    pub within_grace: usize,
    pub reclaimed: usize,
    pub update_failed: usize,
    pub cancelled: usize,
    /// Judgment tasks that panicked.
    pub failed: usize,
    pub elapsed_ms: u64,
}

impl SweepReport {
    fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Alive => self.alive += 1,
            Verdict::Converging => self.converging += 1,
            Verdict::Retiring => self.retiring += 1,
            Verdict::WithinGrace => self.within_grace += 1,
            Verdict::Reclaimed => self.reclaimed += 1,
            Verdict::UpdateFailed => self.update_failed += 1,
            Verdict::Cancelled => self.cancelled += 1,
        }
    }

    /// Number of judgments that reached a verdict or failed.
    pub fn judged(&self) -> usize {
        self.alive
            + self.converging
            + self.retiring
            + self.within_grace
            + self.reclaimed
            + self.update_failed
            + self.cancelled
            + self.failed
    }
}

/// Periodically sweeps the inventory for zombie instances.
pub struct Reaper {
    inventory: Arc<dyn Inventory>,
    judge: Arc<LivenessJudge>,
    max_concurrency: usize,
}

impl Reaper {
    /// Create a reaper with the given grace period and default concurrency.
    pub fn new(inventory: Arc<dyn Inventory>, probe: Arc<dyn Probe>, min_age: Duration) -> Self {
        let judge = LivenessJudge::new(inventory.clone(), probe, min_age);
        Self {
            inventory,
            judge: Arc::new(judge),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Create a reaper from a validated configuration.
    pub fn from_config(
        inventory: Arc<dyn Inventory>,
        probe: Arc<dyn Probe>,
        config: &ReaperConfig,
    ) -> ReaperResult<Self> {
        config.validate()?;
        Ok(Self::new(inventory, probe, config.min_age()?)
            .with_max_concurrency(config.max_concurrency))
    }

    /// Cap the number of judgments running at once. Zero is treated as one,
    /// and values above [`Semaphore::MAX_PERMITS`] are clamped to it.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.clamp(1, Semaphore::MAX_PERMITS);
        self
    }

    /// Run one sweep and wait for every judgment to finish.
    ///
    /// Fails only if the inventory cannot be listed (or the context is
    /// cancelled before it is). Per-instance failures are counted in the
    /// report.
    pub async fn run_sweep(&self, ctx: &SweepContext) -> ReaperResult<SweepReport> {
        let started = Instant::now();
        debug!("zombie sweep started");

        let instances = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(ReaperError::Cancelled),
            listed = self.inventory.list() => listed?,
        };

        debug!(count = instances.len(), "zombie sweep instance count");

        let mut report = SweepReport {
            listed: instances.len(),
            ..Default::default()
        };

        let limiter = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for instance in instances {
            let judge = Arc::clone(&self.judge);
            let limiter = Arc::clone(&limiter);
            let ctx = ctx.clone();

            tasks.spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    _ = ctx.cancelled() => return Verdict::Cancelled,
                    permit = limiter.acquire_owned() => match permit {
                        Ok(p) => p,
                        // The semaphore is never closed while the sweep runs.
                        Err(_) => return Verdict::Cancelled,
                    },
                };
                judge.judge(&ctx, instance).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(verdict) => report.record(verdict),
                Err(e) => {
                    error!(error = %e, "judgment task failed");
                    report.failed += 1;
                }
            }
        }

        report.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            listed = report.listed,
            alive = report.alive,
            reclaimed = report.reclaimed,
            within_grace = report.within_grace,
            update_failed = report.update_failed,
            cancelled = report.cancelled,
            elapsed_ms = report.elapsed_ms,
            "zombie sweep finished"
        );

        Ok(report)
    }

    /// Start a sweep in the background and return a handle that resolves
    /// when every judgment has finished.
    pub fn spawn_sweep(self: Arc<Self>, ctx: SweepContext) -> JoinHandle<ReaperResult<SweepReport>> {
        tokio::spawn(async move { self.run_sweep(&ctx).await })
    }

    /// Run sweeps every `interval` until `shutdown` fires.
    ///
    /// Each sweep is awaited before the next tick, so sweeps never overlap.
    /// `sweep_timeout` bounds a single sweep.
    pub async fn run(
        &self,
        interval: Duration,
        sweep_timeout: Option<Duration>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(
            interval_secs = interval.as_secs(),
            min_age_secs = self.judge.min_age().as_secs(),
            "zombie reaper started"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let sweep_signal = shutdown.clone();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let mut ctx = SweepContext::with_cancel(sweep_signal.clone());
                    if let Some(timeout) = sweep_timeout {
                        ctx = ctx.with_timeout(timeout);
                    }
                    match self.run_sweep(&ctx).await {
                        Ok(report) if report.cancelled > 0 => {
                            warn!(cancelled = report.cancelled, "zombie sweep cut short");
                        }
                        Ok(_) => {}
                        Err(ReaperError::Cancelled) => {
                            debug!("zombie sweep cancelled before listing");
                        }
                        Err(e) => {
                            error!(error = %e, "zombie sweep failed");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("zombie reaper shutting down");
                    break;
                }
            }
        }
    }
}
