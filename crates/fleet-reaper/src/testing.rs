//! Test doubles shared by the judge and sweep tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use fleet_inventory::{Instance, Inventory, InventoryError, InventoryResult, LifecycleState};

use crate::probe::{Probe, ProbeError};

pub fn instance_at(name: &str, address: &str, state: LifecycleState, created: u64) -> Instance {
    Instance {
        name: name.to_string(),
        provider: "amazon".to_string(),
        address: address.to_string(),
        image: "ubuntu-22.04".to_string(),
        region: "us-east-1".to_string(),
        size: "t3.medium".to_string(),
        capacity: 2,
        state,
        error: None,
        created,
        updated: created,
    }
}

pub fn instance(name: &str, state: LifecycleState, created: u64) -> Instance {
    instance_at(name, "10.0.0.1", state, created)
}

/// In-memory inventory that records every update call.
#[derive(Default)]
pub struct MockInventory {
    pub instances: Mutex<Vec<Instance>>,
    pub updates: Mutex<Vec<Instance>>,
    pub list_calls: AtomicUsize,
    /// Make `list` fail.
    pub fail_list: bool,
    /// Instance names whose `update` fails.
    pub fail_update_for: HashSet<String>,
    /// Hold every `update` this long before touching the records.
    pub update_delay: Option<Duration>,
}

impl MockInventory {
    pub fn with(instances: Vec<Instance>) -> Self {
        Self {
            instances: Mutex::new(instances),
            ..Default::default()
        }
    }

    pub fn failing_list() -> Self {
        Self {
            fail_list: true,
            ..Default::default()
        }
    }

    pub fn fail_update_for(mut self, name: &str) -> Self {
        self.fail_update_for.insert(name.to_string());
        self
    }

    pub fn slow_updates(mut self, delay: Duration) -> Self {
        self.update_delay = Some(delay);
        self
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn state_of(&self, name: &str) -> Option<LifecycleState> {
        self.instances
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.name == name)
            .map(|i| i.state)
    }
}

#[async_trait]
impl Inventory for MockInventory {
    async fn list(&self) -> InventoryResult<Vec<Instance>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list {
            return Err(InventoryError::Unavailable("listing refused".to_string()));
        }
        Ok(self.instances.lock().unwrap().clone())
    }

    async fn update(&self, instance: &Instance) -> InventoryResult<()> {
        self.updates.lock().unwrap().push(instance.clone());
        if let Some(delay) = self.update_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_update_for.contains(&instance.name) {
            return Err(InventoryError::Unavailable("write rejected".to_string()));
        }
        let mut instances = self.instances.lock().unwrap();
        match instances.iter_mut().find(|i| i.name == instance.name) {
            Some(stored) => {
                *stored = instance.clone();
                Ok(())
            }
            None => Err(InventoryError::NotFound(instance.name.clone())),
        }
    }
}

/// Probe that answers from a fixed set of live instance names.
#[derive(Default)]
pub struct ScriptedProbe {
    alive: HashSet<String>,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl ScriptedProbe {
    /// Every instance is unreachable.
    pub fn dead() -> Self {
        Self::default()
    }

    pub fn alive(names: &[&str]) -> Self {
        Self {
            alive: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Delay every answer, to exercise cancellation.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn probe(&self, instance: &Instance) -> Result<(), ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.alive.contains(&instance.name) {
            Ok(())
        } else {
            Err(ProbeError::Check(format!("{} unreachable", instance.name)))
        }
    }
}
