// Per-log follower
//
// Tracks the append-only tree of one CT log: polls the STH, fetches new
// entries in batches, adapts its pace to rate limits, and publishes every
// parsed X.509 leaf to the broadcaster. One follower task per log; state
// is confined to the task.

use crate::broadcast::Broadcaster;
use crate::ct::client::CtClient;
use crate::ct::leaf::{self, ParsedLeaf};
use crate::ct::log_list::EligibleLog;
use crate::message::CertMessage;
use crate::Result;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use x509_parser::prelude::*;

/// Interval between poll passes once connected
const POLL_INTERVAL: Duration = Duration::from_secs(10);
/// Maximum entries requested per get-entries call
const BATCH_SIZE: u64 = 1000;
/// Backoff added for every rate-limited response
const BACKOFF_STEP: Duration = Duration::from_millis(50);
/// Backoff recovered for every processed entry
const BACKOFF_RECOVERY: Duration = Duration::from_millis(1);
/// Ceiling for the adaptive backoff
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub struct LogFollower {
    log: EligibleLog,
    client: CtClient,
    broadcaster: Arc<Broadcaster>,
    /// Next tree index to fetch; never decreases
    cursor: u64,
    /// Adaptive pacing delay, held within [0, MAX_BACKOFF]
    backoff: Duration,
}

impl LogFollower {
    pub fn new(log: EligibleLog, http: reqwest::Client, broadcaster: Arc<Broadcaster>) -> Self {
        let client = CtClient::new(http, log.url.clone());
        Self {
            log,
            client,
            broadcaster,
            cursor: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Follow the log until cancelled. The cursor starts at the tree size
    /// observed on connect, so only entries appended afterwards stream out.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        // Smear initial load across the pool
        let jitter = Duration::from_secs(rand::thread_rng().gen_range(1..=10));
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = sleep(jitter) => {}
        }

        let sth = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            sth = self.client.get_sth() => sth?,
        };
        self.cursor = sth.tree_size;
        info!(url = %self.log.url, current_index = self.cursor, "connected to ct log");

        let mut ticker = interval_at(Instant::now() + POLL_INTERVAL, POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => {
                    if let Err(err) = self.process(&cancel).await {
                        warn!(url = %self.log.url, error = %err, "poll pass failed");
                    }
                }
            }
        }
    }

    /// One poll pass: stream every entry between the cursor and the
    /// current tree size. Rate limits are absorbed here by retrying the
    /// same batch after an adapted pause; other errors bubble up to the
    /// tick loop.
    async fn process(&mut self, cancel: &CancellationToken) -> Result<()> {
        let sth = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            sth = self.client.get_sth() => sth?,
        };
        if sth.tree_size <= self.cursor {
            return Ok(());
        }

        while self.cursor < sth.tree_size {
            let end = (self.cursor + BATCH_SIZE).min(sth.tree_size) - 1;
            let entries = loop {
                let result = tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    result = self.client.get_entries(self.cursor, end) => result,
                };
                match result {
                    Ok(entries) => break entries,
                    Err(err) if err.is_rate_limited() => {
                        self.backoff = (self.backoff + BACKOFF_STEP).min(MAX_BACKOFF);
                        info!(
                            url = %self.log.url,
                            backoff_ms = self.backoff.as_millis() as u64,
                            "rate limited, pacing adapted"
                        );
                        if !self.pause(cancel).await {
                            return Ok(());
                        }
                    }
                    Err(err) => return Err(err),
                }
            };

            for entry in &entries {
                self.backoff = self.backoff.saturating_sub(BACKOFF_RECOVERY);
                self.process_entry(self.cursor, &entry.leaf_input);
                self.cursor += 1;
            }

            if self.backoff > Duration::ZERO && !self.pause(cancel).await {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Sleep the current backoff; false when cancelled mid-sleep.
    async fn pause(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = sleep(self.backoff) => true,
        }
    }

    /// Publish one leaf when it parses as a standard X.509 certificate.
    /// Precerts and malformed entries advance the cursor without a message.
    fn process_entry(&self, index: u64, leaf_input: &str) {
        let der = match leaf::decode_leaf(leaf_input) {
            Ok(ParsedLeaf::X509(der)) => der,
            Ok(ParsedLeaf::Precert) | Err(_) => return,
        };
        let cert = match X509Certificate::from_der(&der) {
            Ok((_, cert)) => cert,
            Err(_) => return,
        };
        let msg = CertMessage::from_x509(&self.log.url, &self.log.name, index, &der, &cert);
        self.broadcaster.submit(&msg);
    }
}
