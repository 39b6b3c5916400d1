//! Liveness probes.
//!
//! A probe answers one question: can the instance's management endpoint
//! be reached right now? `Ok(())` means alive, any error means
//! unreachable. The judge never looks at the error beyond logging it, so
//! probe strategies can be swapped without touching the decision policy.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use fleet_inventory::Instance;

/// Docker daemon TLS port, the default management endpoint of an agent.
pub const DEFAULT_TCP_PORT: u16 = 2376;

/// Docker daemon plaintext port, used by the HTTP ping probe.
pub const DEFAULT_HTTP_PORT: u16 = 2375;

/// Docker engine API liveness endpoint.
pub const DEFAULT_HTTP_PATH: &str = "/_ping";

/// Why an instance was judged unreachable.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("connect to {target} failed: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("probe of {target} timed out after {after:?}")]
    Timeout { target: String, after: Duration },

    #[error("handshake with {target} failed: {reason}")]
    Handshake { target: String, reason: String },

    #[error("{target} answered with status {status}")]
    Status { target: String, status: u16 },

    #[error("reachability check failed: {0}")]
    Check(String),
}

/// Reachability check for a single instance.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, instance: &Instance) -> Result<(), ProbeError>;
}

// ── TCP dial ──────────────────────────────────────────────────────

/// Bounded-timeout TCP dial to the instance's management port.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(DEFAULT_TCP_PORT, Duration::from_secs(10))
    }
}

#[async_trait]
impl Probe for TcpProbe {
    async fn probe(&self, instance: &Instance) -> Result<(), ProbeError> {
        let target = dial_target(&instance.address, self.port);
        match tokio::time::timeout(self.timeout, tokio::net::TcpStream::connect(&target)).await {
            // The stream is dropped here; reachability is all we need.
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(source)) => Err(ProbeError::Connect { target, source }),
            Err(_) => Err(ProbeError::Timeout {
                target,
                after: self.timeout,
            }),
        }
    }
}

// ── HTTP ping ─────────────────────────────────────────────────────

/// HTTP/1.1 `GET` against the container runtime's ping endpoint.
///
/// Alive only if the endpoint answers 2xx within the timeout.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    port: u16,
    path: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(port: u16, path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            port,
            path: path.into(),
            timeout,
        }
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new(DEFAULT_HTTP_PORT, DEFAULT_HTTP_PATH, Duration::from_secs(10))
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, instance: &Instance) -> Result<(), ProbeError> {
        let target = dial_target(&instance.address, self.port);
        match tokio::time::timeout(self.timeout, http_ping(&target, &self.path)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout {
                target,
                after: self.timeout,
            }),
        }
    }
}

async fn http_ping(target: &str, path: &str) -> Result<(), ProbeError> {
    let uri = format!("http://{target}{path}");
    let handshake_err = |reason: String| ProbeError::Handshake {
        target: target.to_string(),
        reason,
    };

    let stream = tokio::net::TcpStream::connect(target)
        .await
        .map_err(|source| ProbeError::Connect {
            target: target.to_string(),
            source,
        })?;

    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| handshake_err(e.to_string()))?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let req = http::Request::builder()
        .method("GET")
        .uri(&uri)
        .header("host", target)
        .header("user-agent", "fleet-reaper/0.1")
        .body(http_body_util::Empty::<bytes::Bytes>::new())
        .map_err(|e| handshake_err(e.to_string()))?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| handshake_err(e.to_string()))?;

    if resp.status().is_success() {
        Ok(())
    } else {
        debug!(status = %resp.status(), %uri, "ping probe non-2xx");
        Err(ProbeError::Status {
            target: target.to_string(),
            status: resp.status().as_u16(),
        })
    }
}

// ── Injected check ────────────────────────────────────────────────

/// Adapter for a reachability check supplied by the surrounding system,
/// e.g. a container-runtime client call.
pub struct FnProbe<F> {
    check: F,
}

/// Wrap an async closure as a [`Probe`].
pub fn probe_fn<F, Fut>(check: F) -> FnProbe<F>
where
    F: Fn(Instance) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ProbeError>> + Send + 'static,
{
    FnProbe { check }
}

#[async_trait]
impl<F, Fut> Probe for FnProbe<F>
where
    F: Fn(Instance) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ProbeError>> + Send + 'static,
{
    async fn probe(&self, instance: &Instance) -> Result<(), ProbeError> {
        (self.check)(instance.clone()).await
    }
}

/// Resolve the socket address to dial for an instance address.
///
/// Addresses that already name a port are used as-is; bare IPs and host
/// names get `port` appended.
fn dial_target(address: &str, port: u16) -> String {
    let address = address.trim();
    if address.parse::<SocketAddr>().is_ok() {
        return address.to_string();
    }
    match address.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port).to_string(),
        Err(_) if address.contains(':') => address.to_string(),
        Err(_) => format!("{address}:{port}"),
    }
}
