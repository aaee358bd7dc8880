//! HTTP client for the info endpoint.

use crate::config::ServerConfig;
use crate::error::{FetchError, Result};
use async_trait::async_trait;

/// A completed request/response exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl InfoResponse {
    /// Whether the server sent anything worth storing.
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.body.iter().any(|b| !b.is_ascii_whitespace())
    }
}

/// Performs a single `GET` exchange.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// Fetch `url`. Timeouts, transport failures and non-success statuses
    /// are all [`FetchError::Transport`].
    async fn get(&self, url: &str) -> Result<InfoResponse>;
}

/// Build the info URL, appending the extended query only when requested.
#[must_use]
pub fn info_url(server: &ServerConfig, extended: bool) -> String {
    let base = server.base_url.trim_end_matches('/');
    let path = server.info_path.trim_start_matches('/');
    let mut url = format!("{base}/{path}");
    if extended && !server.extended_query.is_empty() {
        url.push('?');
        url.push_str(server.extended_query.trim_start_matches('?'));
    }
    url
}

/// `reqwest`-backed [`NetworkClient`].
pub struct HttpInfoClient {
    client: reqwest::Client,
}

impl HttpInfoClient {
    /// Create a client whose requests give up after `server.request_timeout()`.
    pub fn new(server: &ServerConfig) -> Self {
        let timeout = server.request_timeout();
        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    timeout_secs = timeout.as_secs(),
                    "cannot build HTTP client, falling back to defaults without a request timeout"
                );
                reqwest::Client::default()
            }
        };
        Self { client }
    }
}

#[async_trait]
impl NetworkClient for HttpInfoClient {
    async fn get(&self, url: &str) -> Result<InfoResponse> {
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Transport(classify_reqwest_error(&e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Transport(format!(
                "info endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(format!("cannot read response body: {e}")))?;

        Ok(InfoResponse {
            status: status.as_u16(),
            body: body.to_vec(),
        })
    }
}

fn classify_reqwest_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        format!("request failed: {e}")
    }
}
