// WebSocket distribution server
//
// Upgrades any request on `/` with a permissive origin policy and bridges
// each connection to one broadcaster subscription. Per connection the
// lifecycle is Upgrading -> Active -> Closing -> Closed: any write error,
// reader death, end-of-stream, or shutdown signal moves to Closing, and
// releasing the subscription closes the connection.

use crate::broadcast::Broadcaster;
use crate::Result;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

struct WsState {
    broadcaster: Arc<Broadcaster>,
    cancel: CancellationToken,
    ping_interval: Duration,
}

/// Fan-out endpoint for subscribers
pub struct WebSocketServer {
    listener: TcpListener,
    state: Arc<WsState>,
}

impl WebSocketServer {
    /// Bind the listen address. Accepting starts in [`run`](Self::run).
    pub async fn bind(
        addr: &str,
        broadcaster: Arc<Broadcaster>,
        ping_interval: Duration,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            state: Arc::new(WsState {
                broadcaster,
                cancel,
                ping_interval,
            }),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until the cancellation token trips, then stop accepting and
    /// let in-flight connections wind down.
    pub async fn run(self) -> Result<()> {
        let addr = self.listener.local_addr()?;
        let cancel = self.state.cancel.clone();
        let app = Router::new()
            .route("/", get(upgrade_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state);

        info!(addr = %addr, "websocket server listening");
        let shutdown = async move { cancel.cancelled().await };
        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("websocket server stopped");
        Ok(())
    }
}

async fn upgrade_handler(ws: WebSocketUpgrade, State(state): State<Arc<WsState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<WsState>) {
    info!("client connected");
    let (mut sender, mut receiver) = socket.split();
    let mut subscription = state.broadcaster.join();

    // Incoming frames are drained and discarded; a read error or EOF
    // marks the connection dead
    let mut reader = tokio::spawn(async move {
        while let Some(frame) = receiver.next().await {
            if frame.is_err() {
                break;
            }
        }
    });

    let mut ping = tokio::time::interval_at(
        tokio::time::Instant::now() + state.ping_interval,
        state.ping_interval,
    );

    loop {
        tokio::select! {
            payload = subscription.recv() => {
                let Some(payload) = payload else { break };
                let Ok(text) = String::from_utf8(payload.to_vec()) else { break };
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            _ = ping.tick() => {
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
            _ = state.cancel.cancelled() => break,
            _ = &mut reader => break,
        }
    }

    state.broadcaster.leave(&subscription);
    reader.abort();
    let _ = sender.send(Message::Close(None)).await;
    debug!("client disconnected");
}
