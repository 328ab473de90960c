// CT log API client
//
// Typed wrapper over the shared HTTP transport, bound to one log. The
// client performs no retries; the follower owns pacing, so rate limits
// surface as typed errors.

use crate::error::CertStreamError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// User agent presented to CT logs and the catalog server
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Total-request ceiling shared by every outbound call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One shared transport for the whole process; its connection pool is
/// reused across every log host.
pub fn build_transport() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()?)
}

/// CT v1 API client for a single log
pub struct CtClient {
    http: reqwest::Client,
    log_url: String,
}

impl CtClient {
    pub fn new(http: reqwest::Client, log_url: impl Into<String>) -> Self {
        Self {
            http,
            log_url: log_url.into(),
        }
    }

    pub fn log_url(&self) -> &str {
        &self.log_url
    }

    /// Current Signed Tree Head.
    pub async fn get_sth(&self) -> Result<SignedTreeHead> {
        let url = format!("{}/ct/v1/get-sth", self.log_url.trim_end_matches('/'));
        self.get_json(&url).await
    }

    /// Raw leaf entries for the inclusive range `[start, end]`. Logs may
    /// return fewer entries than requested.
    pub async fn get_entries(&self, start: u64, end: u64) -> Result<Vec<LeafEntry>> {
        let url = format!(
            "{}/ct/v1/get-entries?start={}&end={}",
            self.log_url.trim_end_matches('/'),
            start,
            end
        );
        let response: EntriesResponse = self.get_json(&url).await?;
        Ok(response.entries)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(CertStreamError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.json().await?)
    }
}

/// Signed Tree Head response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignedTreeHead {
    pub tree_size: u64,
    pub timestamp: u64,
    pub sha256_root_hash: String,
    pub tree_head_signature: String,
}

/// One opaque leaf from get-entries
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LeafEntry {
    pub leaf_input: String,
    pub extra_data: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct EntriesResponse {
    entries: Vec<LeafEntry>,
}
