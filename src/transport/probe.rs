//! Connectivity probe.
//!
//! Answers "is the link to the companion server usable right now" before a
//! fetch is dispatched, so a dead link costs a connect timeout rather than a
//! full request timeout.

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;

/// Reports whether the transport link is currently usable.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_connected(&self) -> bool;
}

/// Probes by opening (and immediately dropping) a TCP connection to the
/// server's host and port.
#[derive(Debug, Clone)]
pub struct TcpConnectivityProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpConnectivityProbe {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Derive host and port from a base URL such as `http://10.0.0.2:29863`.
    ///
    /// Returns `None` if the URL has no host or no known default port.
    pub fn for_base_url(base_url: &str, timeout: Duration) -> Option<Self> {
        let parsed = url::Url::parse(base_url).ok()?;
        let host = parsed.host_str()?.trim_matches(['[', ']']).to_owned();
        let port = parsed.port_or_known_default()?;
        Some(Self::new(host, port, timeout))
    }
}

#[async_trait]
impl ConnectivityProbe for TcpConnectivityProbe {
    async fn is_connected(&self) -> bool {
        let target = (self.host.as_str(), self.port);
        match tokio::time::timeout(self.timeout, TcpStream::connect(target)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                tracing::debug!(host = %self.host, port = self.port, error = %e, "link probe refused");
                false
            }
            Err(_) => {
                tracing::debug!(host = %self.host, port = self.port, "link probe timed out");
                false
            }
        }
    }
}
