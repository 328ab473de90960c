// certstream - Real-time Certificate Transparency firehose over WebSocket

use anyhow::Result;
use certstream::{CertStream, Config};
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging - respect RUST_LOG environment variable
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    let config = Config::from_env();
    let cancel = CancellationToken::new();
    tokio::spawn(trip_on_signal(cancel.clone()));

    CertStream::new(config).run(cancel).await?;
    info!("certstream terminated");
    Ok(())
}

/// Trip the cancellation token on SIGINT or SIGTERM.
async fn trip_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install ctrl+c handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install sigterm handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl+c, starting graceful shutdown"),
        () = terminate => info!("received sigterm, starting graceful shutdown"),
    }
    cancel.cancel();
}
