//! fleet-reaper — zombie instance detection for autoscaled fleets.
//!
//! Finds instances that are recorded in the inventory but no longer
//! reachable, and flags them `ShutdownRequested` so the provider teardown
//! pass deletes them. The reaper never destroys instances itself.
//!
//! # Architecture
//!
//! ```text
//! Reaper::run_sweep(ctx)
//!   ├── Inventory::list() → snapshot
//!   └── JoinSet, one task per instance (bounded by a semaphore)
//!       └── LivenessJudge::judge(ctx, instance) → Verdict
//!           ├── Probe::probe()          alive → done
//!           ├── Pending / Creating      → done (converging)
//!           ├── Shutdown / Stopping     → done (retiring)
//!           ├── now < created + min_age → done (grace period)
//!           └── state = ShutdownRequested, Inventory::update()
//! ```
//!
//! Every judgment is joined before `run_sweep` returns a [`SweepReport`].
//! Only a listing failure surfaces as an error; per-instance failures are
//! logged and counted.
//!
//! # Cancellation
//!
//! A [`SweepContext`] carries the daemon's shutdown signal and an optional
//! deadline. Probes and inventory writes race against it, so a cancelled
//! sweep stops promptly. Writes that already committed stay committed.

pub mod config;
pub mod context;
pub mod error;
pub mod judge;
pub mod probe;
pub mod sweep;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ProbeConfig, ProbeKind, ReaperConfig};
pub use context::SweepContext;
pub use error::{ReaperError, ReaperResult};
pub use judge::{LivenessJudge, Verdict};
pub use probe::{FnProbe, HttpProbe, Probe, ProbeError, TcpProbe, probe_fn};
pub use sweep::{Reaper, SweepReport};
