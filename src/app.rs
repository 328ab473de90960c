// Application orchestration
//
// Wires the broadcaster, the WebSocket server, and one follower per
// eligible catalog log under a single cancellation source, then joins
// everything on shutdown.

use crate::broadcast::Broadcaster;
use crate::config::Config;
use crate::ct::client;
use crate::ct::log_list::{self, EligibleLog};
use crate::follower::LogFollower;
use crate::server::WebSocketServer;
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Grace window for in-flight subscriber writes after cancellation
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub struct CertStream {
    config: Config,
    broadcaster: Arc<Broadcaster>,
}

impl CertStream {
    pub fn new(config: Config) -> Self {
        let broadcaster = Arc::new(Broadcaster::new(config.subscriber_buffer));
        Self {
            config,
            broadcaster,
        }
    }

    /// Handle for publishing or subscribing outside the follower pool.
    pub fn broadcaster(&self) -> Arc<Broadcaster> {
        Arc::clone(&self.broadcaster)
    }

    /// Run until the cancellation token trips. Catalog and bind failures
    /// are fatal; follower errors stay contained to their own task.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let http = client::build_transport()?;
        let list = log_list::fetch_log_list(&http, &self.config.log_list_url).await?;
        let eligible = list.eligible_logs(Utc::now());
        info!(count = eligible.len(), "following eligible ct logs");

        let server = WebSocketServer::bind(
            &self.config.listen_addr(),
            self.broadcaster(),
            self.config.ping_interval,
            cancel.clone(),
        )
        .await?;
        let server_task = tokio::spawn(server.run());

        let mut followers = Vec::with_capacity(eligible.len());
        for log in eligible {
            followers.push(self.spawn_follower(log, http.clone(), cancel.clone()));
        }

        cancel.cancelled().await;
        info!(cause = "cancellation", "shutdown signalled, draining tasks");

        for handle in followers {
            if let Err(err) = handle.await {
                error!(error = %err, "follower task panicked");
            }
        }

        match tokio::time::timeout(SHUTDOWN_GRACE, server_task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(err))) => warn!(error = %err, "websocket server exited with error"),
            Ok(Err(err)) => error!(error = %err, "websocket server task panicked"),
            Err(_) => warn!("websocket server did not stop within the grace window"),
        }
        Ok(())
    }

    fn spawn_follower(
        &self,
        log: EligibleLog,
        http: reqwest::Client,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let url = log.url.clone();
        let follower = LogFollower::new(log, http, self.broadcaster());
        tokio::spawn(async move {
            if let Err(err) = follower.run(cancel).await {
                error!(url = %url, error = %err, "follower terminated");
            }
        })
    }
}
