//! Domain types for the fleet inventory.
//!
//! An [`Instance`] is a compute resource (VM or agent host) created by an
//! autoscaler provider. Its record is owned by the inventory; other
//! subsystems read snapshots and write back individual records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of an instance.
pub type InstanceName = String;

// ── Instance ──────────────────────────────────────────────────────

/// A fleet-managed compute instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instance {
    pub name: InstanceName,
    /// Provider that created the instance ("amazon", "digitalocean", ...).
    pub provider: String,
    /// Network endpoint used for liveness probes (ip or ip:port).
    pub address: String,
    pub image: String,
    pub region: String,
    pub size: String,
    /// Number of concurrent workloads the instance accepts.
    pub capacity: u32,
    pub state: LifecycleState,
    /// Last provider error, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Unix timestamp (seconds) when the instance was provisioned.
    pub created: u64,
    /// Unix timestamp (seconds) of the last record change.
    pub updated: u64,
}

impl Instance {
    /// Build the key for the instances table.
    pub fn table_key(&self) -> &str {
        &self.name
    }
}

// ── Lifecycle ─────────────────────────────────────────────────────

/// Lifecycle state of an instance as recorded in the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Pending,
    Creating,
    Created,
    Staging,
    Running,
    /// Scheduled for deletion by the provider teardown pass.
    #[serde(rename = "shutdown")]
    ShutdownRequested,
    Stopping,
    Stopped,
    Error,
}

impl LifecycleState {
    /// Still converging toward liveness; no trustworthy age signal yet.
    pub fn is_converging(self) -> bool {
        matches!(self, Self::Pending | Self::Creating)
    }

    /// Already on its way out of the fleet.
    pub fn is_retiring(self) -> bool {
        matches!(self, Self::ShutdownRequested | Self::Stopping | Self::Stopped)
    }

    /// Eligible to be flagged for shutdown when found unreachable.
    pub fn is_reclaimable(self) -> bool {
        !self.is_converging() && !self.is_retiring()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Creating => "creating",
            Self::Created => "created",
            Self::Staging => "staging",
            Self::Running => "running",
            Self::ShutdownRequested => "shutdown",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
