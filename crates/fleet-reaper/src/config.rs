//! reaper.toml configuration.
//!
//! Durations are strings like `"10m"`, `"45s"`, `"500ms"`, `"1h"`, or a bare
//! number of seconds.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::error::{ReaperError, ReaperResult};
use crate::probe::{DEFAULT_HTTP_PATH, DEFAULT_HTTP_PORT, DEFAULT_TCP_PORT, HttpProbe, Probe, TcpProbe};
use crate::sweep::DEFAULT_MAX_CONCURRENCY;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperConfig {
    /// Grace period before an unreachable instance may be reclaimed.
    pub min_age: String,
    /// Time between sweeps.
    pub interval: String,
    /// Upper bound on a single sweep.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep_timeout: Option<String>,
    pub max_concurrency: usize,
    pub probe: ProbeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub kind: ProbeKind,
    /// Management port; defaults depend on `kind`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub timeout: String,
    /// Request path for the HTTP probe.
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    /// Plain TCP dial.
    #[default]
    Tcp,
    /// HTTP ping against the container runtime API.
    Http,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            min_age: "10m".to_string(),
            interval: "1m".to_string(),
            sweep_timeout: None,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            probe: ProbeConfig::default(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            kind: ProbeKind::Tcp,
            port: None,
            timeout: "10s".to_string(),
            path: DEFAULT_HTTP_PATH.to_string(),
        }
    }
}

impl ReaperConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: ReaperConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn min_age(&self) -> ReaperResult<Duration> {
        parse_field("min_age", &self.min_age)
    }

    pub fn interval(&self) -> ReaperResult<Duration> {
        parse_field("interval", &self.interval)
    }

    pub fn sweep_timeout(&self) -> ReaperResult<Option<Duration>> {
        self.sweep_timeout
            .as_deref()
            .map(|s| parse_field("sweep_timeout", s))
            .transpose()
    }

    /// Check every field parses and is usable.
    pub fn validate(&self) -> ReaperResult<()> {
        self.min_age()?;
        if self.interval()?.is_zero() {
            return Err(ReaperError::Config("interval must be non-zero".to_string()));
        }
        if let Some(timeout) = self.sweep_timeout()?
            && timeout.is_zero()
        {
            return Err(ReaperError::Config("sweep_timeout must be non-zero".to_string()));
        }
        if self.max_concurrency == 0 {
            return Err(ReaperError::Config("max_concurrency must be at least 1".to_string()));
        }
        if self.max_concurrency > Semaphore::MAX_PERMITS {
            return Err(ReaperError::Config(format!(
                "max_concurrency must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.probe.timeout()?.is_zero() {
            return Err(ReaperError::Config("probe.timeout must be non-zero".to_string()));
        }
        if self.probe.kind == ProbeKind::Http && !self.probe.path.starts_with('/') {
            return Err(ReaperError::Config(format!(
                "probe.path must start with '/': {}",
                self.probe.path
            )));
        }
        Ok(())
    }

    /// Build the liveness probe described by `[probe]`.
    pub fn build_probe(&self) -> ReaperResult<Arc<dyn Probe>> {
        let timeout = self.probe.timeout()?;
        let port = self.probe.port();
        Ok(match self.probe.kind {
            ProbeKind::Tcp => Arc::new(TcpProbe::new(port, timeout)),
            ProbeKind::Http => Arc::new(HttpProbe::new(port, self.probe.path.clone(), timeout)),
        })
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> ReaperResult<Duration> {
        parse_field("probe.timeout", &self.timeout)
    }

    /// Configured port, or the default for the probe kind.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(match self.kind {
            ProbeKind::Tcp => DEFAULT_TCP_PORT,
            ProbeKind::Http => DEFAULT_HTTP_PORT,
        })
    }
}

fn parse_field(field: &str, value: &str) -> ReaperResult<Duration> {
    parse_duration(value)
        .ok_or_else(|| ReaperError::Config(format!("{field}: invalid duration {value:?}")))
}

/// Parse a duration string like "5s", "500ms", "10m", "1h".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else if let Some(hours) = s.strip_suffix('h') {
        hours
            .trim()
            .parse::<u64>()
            .ok()
            .and_then(|h| h.checked_mul(3600))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
