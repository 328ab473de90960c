// Integration tests for the WebSocket distribution server

use certstream::{Broadcaster, CertMessage};
use certstream::server::WebSocketServer;
use futures::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

async fn start_server(
    broadcaster: Arc<Broadcaster>,
    ping_interval: Duration,
    cancel: CancellationToken,
) -> (SocketAddr, JoinHandle<certstream::Result<()>>) {
    let server = WebSocketServer::bind("127.0.0.1:0", broadcaster, ping_interval, cancel)
        .await
        .expect("server binds an ephemeral port");
    let addr = server.local_addr().expect("bound address is known");
    let task = tokio::spawn(server.run());
    (addr, task)
}

/// The upgrade callback registers the subscription asynchronously; wait
/// for it before submitting.
async fn wait_for_subscribers(broadcaster: &Broadcaster, count: usize) {
    for _ in 0..100 {
        if broadcaster.subscriber_count() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("subscribers never registered");
}

fn test_message(index: u64) -> CertMessage {
    let mut msg = CertMessage::default();
    msg.message_type = "certificate_update".to_string();
    msg.data.update_type = "X509Certificate".to_string();
    msg.data.cert_index = index;
    msg
}

#[tokio::test]
async fn test_messages_arrive_as_text_frames() {
    let broadcaster = Arc::new(Broadcaster::new(16));
    let cancel = CancellationToken::new();
    let (addr, _task) =
        start_server(Arc::clone(&broadcaster), Duration::from_secs(10), cancel.clone()).await;

    let (mut ws, _) = connect_async(format!("ws://{}/", addr))
        .await
        .expect("client connects");
    wait_for_subscribers(&broadcaster, 1).await;

    broadcaster.submit(&test_message(7));

    let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("frame arrives in time")
        .expect("stream is open")
        .expect("frame reads cleanly");
    match frame {
        Message::Text(text) => {
            let msg: CertMessage = serde_json::from_str(&text).expect("payload is the envelope");
            assert_eq!(msg.message_type, "certificate_update");
            assert_eq!(msg.data.cert_index, 7);
        }
        other => panic!("expected text frame, got {:?}", other),
    }

    cancel.cancel();
}

#[tokio::test]
async fn test_each_subscriber_gets_every_message() {
    let broadcaster = Arc::new(Broadcaster::new(16));
    let cancel = CancellationToken::new();
    let (addr, _task) =
        start_server(Arc::clone(&broadcaster), Duration::from_secs(10), cancel.clone()).await;

    let (mut first, _) = connect_async(format!("ws://{}/", addr))
        .await
        .expect("first client connects");
    let (mut second, _) = connect_async(format!("ws://{}/", addr))
        .await
        .expect("second client connects");
    wait_for_subscribers(&broadcaster, 2).await;

    broadcaster.submit(&test_message(1));

    for ws in [&mut first, &mut second] {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("frame arrives in time")
            .expect("stream is open")
            .expect("frame reads cleanly");
        assert!(matches!(frame, Message::Text(_)));
    }

    cancel.cancel();
}

#[tokio::test]
async fn test_idle_connection_receives_pings() {
    let broadcaster = Arc::new(Broadcaster::new(16));
    let cancel = CancellationToken::new();
    // Shortened cadence, same mechanism as the production 10s interval
    let (addr, _task) =
        start_server(Arc::clone(&broadcaster), Duration::from_millis(200), cancel.clone()).await;

    let (mut ws, _) = connect_async(format!("ws://{}/", addr))
        .await
        .expect("client connects");

    // Nothing is submitted; two pings must still arrive
    let mut pings = 0;
    while pings < 2 {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("frame arrives in time")
            .expect("stream is open")
            .expect("frame reads cleanly");
        if matches!(frame, Message::Ping(_)) {
            pings += 1;
        }
    }

    cancel.cancel();
}

#[tokio::test]
async fn test_shutdown_closes_connections_promptly() {
    let broadcaster = Arc::new(Broadcaster::new(16));
    let cancel = CancellationToken::new();
    let (addr, task) =
        start_server(Arc::clone(&broadcaster), Duration::from_secs(10), cancel.clone()).await;

    let (mut ws, _) = connect_async(format!("ws://{}/", addr))
        .await
        .expect("client connects");
    wait_for_subscribers(&broadcaster, 1).await;

    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("server stops within the grace window")
        .expect("server task does not panic");
    assert!(result.is_ok());
    assert_eq!(broadcaster.subscriber_count(), 0);

    // The client observes the close handshake or EOF shortly after
    let observed_close = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(frame) = ws.next().await {
            match frame {
                Ok(Message::Close(_)) | Err(_) => return true,
                _ => {}
            }
        }
        true
    })
    .await
    .expect("close observed in time");
    assert!(observed_close);

    // New connections are refused once the listener is gone
    assert!(connect_async(format!("ws://{}/", addr)).await.is_err());
}
