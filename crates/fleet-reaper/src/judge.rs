//! Liveness judge — decides the fate of a single instance.
//!
//! Steps run strictly in order:
//!
//! 1. Probe the management endpoint. Reachable means alive, nothing to do.
//! 2. `Pending` / `Creating` instances are still converging and are left
//!    alone regardless of age.
//! 3. Instances already shutting down are left alone, which makes repeated
//!    sweeps idempotent.
//! 4. Instances younger than `min_age` are inside their grace period.
//! 5. Everything else is a zombie: flip it to `ShutdownRequested` and write
//!    it back. A failed write is logged and retried by the next sweep.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, error, info, warn};

use fleet_inventory::{Instance, Inventory, LifecycleState};

use crate::context::SweepContext;
use crate::probe::Probe;

/// Outcome of judging one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Probe succeeded.
    Alive,
    /// Unreachable but still pending or creating.
    Converging,
    /// Unreachable and already scheduled for teardown.
    Retiring,
    /// Unreachable but younger than the grace period.
    WithinGrace,
    /// Flagged `ShutdownRequested` and written back.
    Reclaimed,
    /// Judged a zombie but the inventory rejected the write.
    UpdateFailed,
    /// The sweep context was cancelled before a decision was committed.
    Cancelled,
}

pub struct LivenessJudge {
    inventory: Arc<dyn Inventory>,
    probe: Arc<dyn Probe>,
    min_age: Duration,
}

impl LivenessJudge {
    pub fn new(inventory: Arc<dyn Inventory>, probe: Arc<dyn Probe>, min_age: Duration) -> Self {
        Self {
            inventory,
            probe,
            min_age,
        }
    }

    pub fn min_age(&self) -> Duration {
        self.min_age
    }

    /// Judge an instance against the current wall clock.
    pub async fn judge(&self, ctx: &SweepContext, instance: Instance) -> Verdict {
        self.judge_at(ctx, instance, epoch_secs()).await
    }

    /// Judge an instance as if the current time were `now` (unix seconds).
    pub async fn judge_at(&self, ctx: &SweepContext, mut instance: Instance, now: u64) -> Verdict {
        let probed = tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                debug!(name = %instance.name, address = %instance.address, "probe cancelled");
                return Verdict::Cancelled;
            }
            result = self.probe.probe(&instance) => result,
        };

        match probed {
            Ok(()) => {
                debug!(name = %instance.name, address = %instance.address, "instance alive");
                return Verdict::Alive;
            }
            Err(e) => {
                debug!(
                    name = %instance.name,
                    address = %instance.address,
                    error = %e,
                    "instance unreachable"
                );
            }
        }

        // No trustworthy `created` yet, so age cannot be asserted.
        if instance.state.is_converging() {
            debug!(
                name = %instance.name,
                state = %instance.state,
                "instance still converging, not eligible for zombie check"
            );
            return Verdict::Converging;
        }

        if !instance.state.is_reclaimable() {
            debug!(
                name = %instance.name,
                state = %instance.state,
                "instance already retiring"
            );
            return Verdict::Retiring;
        }

        let deadline = grace_deadline(instance.created, self.min_age);
        if now < deadline {
            debug!(
                name = %instance.name,
                remaining_secs = deadline - now,
                "instance unreachable but within grace period"
            );
            return Verdict::WithinGrace;
        }

        let previous = instance.state;
        instance.state = LifecycleState::ShutdownRequested;
        instance.updated = now;

        let written = tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                debug!(name = %instance.name, "update cancelled");
                return Verdict::Cancelled;
            }
            result = self.inventory.update(&instance) => result,
        };

        match written {
            Ok(()) => {
                info!(
                    name = %instance.name,
                    address = %instance.address,
                    from = %previous,
                    age_secs = now.saturating_sub(instance.created),
                    "zombie detected, shutdown requested"
                );
                Verdict::Reclaimed
            }
            Err(e) if e.is_not_found() => {
                warn!(
                    name = %instance.name,
                    address = %instance.address,
                    "instance removed before shutdown could be requested"
                );
                Verdict::UpdateFailed
            }
            Err(e) => {
                error!(
                    name = %instance.name,
                    address = %instance.address,
                    state = %LifecycleState::ShutdownRequested,
                    error = %e,
                    "cannot update instance state"
                );
                Verdict::UpdateFailed
            }
        }
    }
}

/// First second at which an unreachable instance counts as a zombie.
///
/// Timestamps are whole seconds, so a fractional `min_age` rounds up.
fn grace_deadline(created: u64, min_age: Duration) -> u64 {
    let secs = min_age.as_secs() + u64::from(min_age.subsec_nanos() > 0);
    created.saturating_add(secs)
}

pub(crate) fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
